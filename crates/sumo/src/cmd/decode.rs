use bytes::Bytes;
use serde::Serialize;
use sumo_frame::{decode_frame, kind, split_datagram, DeviceReport, Frame, RawFrame};

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_json, print_pretty, print_table, OutputFormat};

#[derive(Serialize)]
struct FrameOutput {
    offset: usize,
    #[serde(rename = "type")]
    frame_type: &'static str,
    ext: u8,
    seqno: u8,
    size: u16,
    summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<String>,
}

#[derive(Serialize)]
struct DecodeOutput {
    len: usize,
    frames: Vec<FrameOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let datagram = parse_hex(&args.hex)?;
    let len = datagram.len();

    let mut frames = Vec::new();
    let mut offset = 0;
    let mut failure = None;
    for item in split_datagram(datagram) {
        let raw = match item {
            Ok(raw) => raw,
            Err(err) => {
                failure = Some(frame_error(&format!("frame at offset {offset}"), err));
                break;
            }
        };
        let size = raw.header.size as usize;
        match describe(offset, &raw) {
            Ok(frame) => frames.push(frame),
            Err(err) => {
                failure = Some(err);
                break;
            }
        }
        offset += size;
    }

    let out = DecodeOutput {
        len,
        frames,
        error: failure.as_ref().map(|err| err.message.clone()),
    };
    print_output(&out, format);

    match failure {
        Some(err) => Err(err),
        None => Ok(SUCCESS),
    }
}

fn describe(offset: usize, raw: &RawFrame) -> CliResult<FrameOutput> {
    let frame = decode_frame(&raw.bytes)
        .map_err(|err| frame_error(&format!("frame at offset {offset}"), err))?;
    let report = match &frame {
        Frame::Ioctl(io) => match DeviceReport::from_ioctl(io) {
            DeviceReport::Unknown { .. } => None,
            known => Some(format!("{known:?}")),
        },
        _ => None,
    };
    Ok(FrameOutput {
        offset,
        frame_type: kind::type_name(raw.header.frame_type),
        ext: raw.header.ext,
        seqno: raw.header.seqno,
        size: raw.header.size,
        summary: frame.to_string(),
        report,
    })
}

fn print_output(out: &DecodeOutput, format: OutputFormat) {
    let rows: Vec<(String, String)> = out
        .frames
        .iter()
        .map(|f| {
            let detail = match &f.report {
                Some(report) => format!("{}  [{report}]", f.summary),
                None => f.summary.clone(),
            };
            (f.offset.to_string(), detail)
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => print_table(["OFFSET", "FRAME"], &rows),
        OutputFormat::Pretty => print_pretty(&format!("{} bytes", out.len), &rows),
    }
}

/// Parse hex digits, ignoring whitespace, `:` separators and a `0x` prefix.
fn parse_hex(input: &str) -> CliResult<Bytes> {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    let digits: Vec<u8> = trimmed
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':')
        .collect();
    if digits.is_empty() {
        return Err(CliError::new(USAGE, "datagram is empty"));
    }
    if digits.len() % 2 != 0 {
        return Err(CliError::new(USAGE, "odd number of hex digits"));
    }

    digits
        .chunks(2)
        .map(|pair| Ok((nibble(pair[0])? << 4) | nibble(pair[1])?))
        .collect::<CliResult<Vec<u8>>>()
        .map(Bytes::from)
}

fn nibble(digit: u8) -> CliResult<u8> {
    match digit {
        b'0'..=b'9' => Ok(digit - b'0'),
        b'a'..=b'f' => Ok(digit - b'a' + 10),
        b'A'..=b'F' => Ok(digit - b'A' + 10),
        other => Err(CliError::new(
            USAGE,
            format!("invalid hex digit {:?}", other as char),
        )),
    }
}
