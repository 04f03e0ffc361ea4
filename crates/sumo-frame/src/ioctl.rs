//! Ioctl frames: `(subtype, func)`-addressed commands and device reports.
//!
//! Body layout:
//! ```text
//! ┌───────┬─────────┬──────┬──────────┬──────────────────────┐
//! │ flags │ subtype │ func │ reserved │ payload (0..n bytes) │
//! └───────┴─────────┴──────┴──────────┴──────────────────────┘
//! ```
//! The payload shape is implied by `(subtype, func)`; see [`codes`].

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{require, Header};
use crate::error::Result;
use crate::kind::IOCTL_EXT;

const IOCTL_PREFIX: usize = 4;

/// Known `(subtype, func)` pairs.
pub mod codes {
    /// Flip / posture change, u32 [`Flip`](crate::Flip).
    pub const FLIP: (u8, u8) = (0, 1);
    /// Ask the device to report its identity, no payload.
    pub const REQUEST_INFO: (u8, u8) = (2, 0);
    /// Jump, u32 [`Jump`](crate::Jump).
    pub const JUMP: (u8, u8) = (2, 3);
    /// Scripted maneuver, u32 [`Special`](crate::Special).
    pub const SPECIAL: (u8, u8) = (2, 4);
    /// Device: all identity reports sent, no payload.
    pub const INFO_COMPLETE: (u8, u8) = (3, 0);
    /// Quick turn, f32 radians.
    pub const QUICK_TURN: (u8, u8) = (3, 1);
    /// Device: product name, C string.
    pub const NAME: (u8, u8) = (3, 2);
    /// Device: software and hardware version, two C strings.
    pub const VERSIONS: (u8, u8) = (3, 3);
    /// Device: product id, C string.
    pub const PRODUCT_ID: (u8, u8) = (3, 4);
    /// Device: serial number, C string.
    pub const SERIAL: (u8, u8) = (3, 5);
    /// Device: language, C string.
    pub const LANGUAGE: (u8, u8) = (3, 6);
    /// Device: unidentified byte reported with the identity.
    pub const INFO_FLAG: (u8, u8) = (3, 7);
    /// Start streaming, no payload.
    pub const ENABLE_STREAM: (u8, u8) = (4, 0);
    /// Set date, C string `YYYY-MM-DD`.
    pub const SET_DATE: (u8, u8) = (4, 1);
    /// Set time, C string `Thhmmss±zzzz`.
    pub const SET_TIME: (u8, u8) = (4, 2);
    /// Device: battery level in percent, u8.
    pub const BATTERY: (u8, u8) = (5, 1);
    /// Device: date confirmation, C string.
    pub const DATE_CONFIRM: (u8, u8) = (5, 4);
    /// Device: time confirmation, C string.
    pub const TIME_CONFIRM: (u8, u8) = (5, 5);
    /// Enable flag B, u8.
    pub const ENABLE_B: (u8, u8) = (8, 0);
    /// Enable flag A, u8.
    pub const ENABLE_A: (u8, u8) = (18, 0);
}

/// Flags carried by maneuver ioctls.
pub const MANEUVER_FLAGS: u8 = 0x03;

/// Flags carried by the quick-turn ioctl.
pub const QUICK_TURN_FLAGS: u8 = 0x83;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Empty,
    U8,
    U32,
    F32,
    Text,
    TextPair,
    Raw,
}

fn shape_of(code: (u8, u8)) -> Shape {
    match code {
        codes::REQUEST_INFO | codes::INFO_COMPLETE | codes::ENABLE_STREAM => Shape::Empty,
        codes::BATTERY | codes::INFO_FLAG | codes::ENABLE_A | codes::ENABLE_B => Shape::U8,
        codes::FLIP | codes::JUMP | codes::SPECIAL => Shape::U32,
        codes::QUICK_TURN => Shape::F32,
        codes::NAME
        | codes::PRODUCT_ID
        | codes::SERIAL
        | codes::LANGUAGE
        | codes::SET_DATE
        | codes::SET_TIME
        | codes::DATE_CONFIRM
        | codes::TIME_CONFIRM => Shape::Text,
        codes::VERSIONS => Shape::TextPair,
        _ => Shape::Raw,
    }
}

/// Payload of an ioctl, in one of the shapes the protocol uses.
#[derive(Debug, Clone, PartialEq)]
pub enum IoctlPayload {
    Empty,
    U8(u8),
    U32(u32),
    F32(f32),
    /// NUL-terminated string.
    Text(String),
    /// Two consecutive NUL-terminated strings.
    TextPair(String, String),
    /// Unknown `(subtype, func)` or a body that does not fit the expected shape.
    Raw(Bytes),
}

impl IoctlPayload {
    fn len(&self) -> usize {
        match self {
            IoctlPayload::Empty => 0,
            IoctlPayload::U8(_) => 1,
            IoctlPayload::U32(_) | IoctlPayload::F32(_) => 4,
            IoctlPayload::Text(s) => s.len() + 1,
            IoctlPayload::TextPair(a, b) => a.len() + b.len() + 2,
            IoctlPayload::Raw(b) => b.len(),
        }
    }

    fn put(&self, dst: &mut BytesMut) {
        match self {
            IoctlPayload::Empty => {}
            IoctlPayload::U8(v) => dst.put_u8(*v),
            IoctlPayload::U32(v) => dst.put_u32_le(*v),
            IoctlPayload::F32(v) => dst.put_f32_le(*v),
            IoctlPayload::Text(s) => put_cstr(dst, s),
            IoctlPayload::TextPair(a, b) => {
                put_cstr(dst, a);
                put_cstr(dst, b);
            }
            IoctlPayload::Raw(b) => dst.put_slice(b),
        }
    }

    fn decode(code: (u8, u8), body: &[u8]) -> Self {
        let raw = || IoctlPayload::Raw(Bytes::copy_from_slice(body));
        match shape_of(code) {
            Shape::Empty if body.is_empty() => IoctlPayload::Empty,
            Shape::U8 if body.len() == 1 => IoctlPayload::U8(body[0]),
            Shape::U32 if body.len() == 4 => {
                IoctlPayload::U32(u32::from_le_bytes([body[0], body[1], body[2], body[3]]))
            }
            Shape::F32 if body.len() == 4 => {
                IoctlPayload::F32(f32::from_le_bytes([body[0], body[1], body[2], body[3]]))
            }
            Shape::Text => match split_cstr(body) {
                Some((text, _)) => IoctlPayload::Text(text),
                None => raw(),
            },
            Shape::TextPair => match split_cstr(body)
                .and_then(|(first, rest)| split_cstr(rest).map(|(second, _)| (first, second)))
            {
                Some((first, second)) => IoctlPayload::TextPair(first, second),
                None => raw(),
            },
            _ => raw(),
        }
    }
}

fn put_cstr(dst: &mut BytesMut, s: &str) {
    dst.put_slice(s.as_bytes());
    dst.put_u8(0);
}

fn split_cstr(src: &[u8]) -> Option<(String, &[u8])> {
    let end = src.iter().position(|&b| b == 0)?;
    let text = String::from_utf8_lossy(&src[..end]).into_owned();
    Some((text, &src[end + 1..]))
}

/// An ioctl frame.
#[derive(Debug, Clone, PartialEq)]
pub struct IoctlFrame {
    /// Always [`IOCTL_EXT`] for frames built by the controller.
    pub ext: u8,
    pub seqno: u8,
    pub flags: u8,
    pub subtype: u8,
    pub func: u8,
    pub payload: IoctlPayload,
}

impl IoctlFrame {
    /// An outgoing ioctl.
    pub fn new(seqno: u8, code: (u8, u8), flags: u8, payload: IoctlPayload) -> Self {
        Self {
            ext: IOCTL_EXT,
            seqno,
            flags,
            subtype: code.0,
            func: code.1,
            payload,
        }
    }

    /// Set the device date (`YYYY-MM-DD`).
    pub fn set_date(seqno: u8, date: &str) -> Self {
        Self::new(seqno, codes::SET_DATE, 0, IoctlPayload::Text(date.to_string()))
    }

    /// Set the device time (`Thhmmss±zzzz`).
    pub fn set_time(seqno: u8, time: &str) -> Self {
        Self::new(seqno, codes::SET_TIME, 0, IoctlPayload::Text(time.to_string()))
    }

    /// Ask the device for its identity reports.
    pub fn request_info(seqno: u8) -> Self {
        Self::new(seqno, codes::REQUEST_INFO, 0, IoctlPayload::Empty)
    }

    /// Start the device's streams.
    pub fn enable_stream(seqno: u8) -> Self {
        Self::new(seqno, codes::ENABLE_STREAM, 0, IoctlPayload::Empty)
    }

    /// The `(subtype, func)` pair.
    pub fn code(&self) -> (u8, u8) {
        (self.subtype, self.func)
    }

    pub(crate) fn body_len(&self) -> usize {
        IOCTL_PREFIX + self.payload.len()
    }

    pub(crate) fn put_body(&self, dst: &mut BytesMut) {
        dst.put_u8(self.flags);
        dst.put_u8(self.subtype);
        dst.put_u8(self.func);
        dst.put_u8(0);
        self.payload.put(dst);
    }

    pub(crate) fn decode_body(header: Header, body: &[u8]) -> Result<Self> {
        require(body, IOCTL_PREFIX, "ioctl")?;
        let code = (body[1], body[2]);
        Ok(Self {
            ext: header.ext,
            seqno: header.seqno,
            flags: body[0],
            subtype: code.0,
            func: code.1,
            payload: IoctlPayload::decode(code, &body[IOCTL_PREFIX..]),
        })
    }
}

impl fmt::Display for IoctlFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ioctl flags={:#04x} subtype={} func={} ",
            self.flags, self.subtype, self.func
        )?;
        match &self.payload {
            IoctlPayload::Empty => write!(f, "(no payload)"),
            IoctlPayload::U8(v) => write!(f, "u8 {v}"),
            IoctlPayload::U32(v) => write!(f, "u32 {v:#x}"),
            IoctlPayload::F32(v) => write!(f, "f32 {v} ({:.1} deg)", v.to_degrees()),
            IoctlPayload::Text(s) => write!(f, "{s:?}"),
            IoctlPayload::TextPair(a, b) => write!(f, "{a:?} {b:?}"),
            IoctlPayload::Raw(b) => write!(f, "raw {} bytes", b.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_frame, Frame, HEADER_SIZE};

    fn encode(frame: IoctlFrame) -> Bytes {
        Frame::Ioctl(frame).to_bytes().unwrap()
    }

    #[test]
    fn date_payload_is_eleven_bytes() {
        let bytes = encode(IoctlFrame::set_date(1, "2014-08-02"));
        assert_eq!(bytes.len(), HEADER_SIZE + 4 + 11);
        assert_eq!(&bytes[7..11], &[0, 4, 1, 0]);
        assert_eq!(&bytes[11..], b"2014-08-02\0");
    }

    #[test]
    fn time_payload_is_thirteen_bytes() {
        let bytes = encode(IoctlFrame::set_time(2, "T101500+0100"));
        assert_eq!(bytes.len(), HEADER_SIZE + 4 + 13);
        assert_eq!(bytes[1], IOCTL_EXT);
    }

    #[test]
    fn request_info_has_no_payload() {
        let bytes = encode(IoctlFrame::request_info(3));
        assert_eq!(bytes.as_ref(), &[4, 11, 3, 11, 0, 0, 0, 0, 2, 0, 0]);
    }

    #[test]
    fn unknown_code_decodes_as_raw() {
        let wire = [4, 0, 9, 14, 0, 0, 0, 0, 9, 1, 0, 0xDE, 0xAD, 0xBE];
        let Frame::Ioctl(io) = decode_frame(&wire).unwrap() else {
            panic!("expected ioctl");
        };
        assert_eq!(io.code(), (9, 1));
        assert_eq!(io.payload, IoctlPayload::Raw(Bytes::from_static(&[0xDE, 0xAD, 0xBE])));
    }

    #[test]
    fn known_code_with_wrong_length_decodes_as_raw() {
        let wire = [4, 0, 9, 13, 0, 0, 0, 0, 5, 1, 0, 80, 1];
        let Frame::Ioctl(io) = decode_frame(&wire).unwrap() else {
            panic!("expected ioctl");
        };
        assert!(matches!(io.payload, IoctlPayload::Raw(_)));
    }

    #[test]
    fn text_pair_decodes_both_strings() {
        let mut wire = vec![4, 0, 9, 0, 0, 0, 0, 0, 3, 3, 0];
        wire.extend_from_slice(b"1.99.0\0HW_01\0");
        wire[3] = wire.len() as u8;
        let Frame::Ioctl(io) = decode_frame(&wire).unwrap() else {
            panic!("expected ioctl");
        };
        assert_eq!(
            io.payload,
            IoctlPayload::TextPair("1.99.0".to_string(), "HW_01".to_string())
        );
    }

    #[test]
    fn text_without_terminator_is_raw() {
        let mut wire = vec![4, 0, 9, 0, 0, 0, 0, 0, 5, 4, 0];
        wire.extend_from_slice(b"2014");
        wire[3] = wire.len() as u8;
        let Frame::Ioctl(io) = decode_frame(&wire).unwrap() else {
            panic!("expected ioctl");
        };
        assert!(matches!(io.payload, IoctlPayload::Raw(_)));
    }

    #[test]
    fn short_ioctl_prefix_is_malformed() {
        let wire = [4, 0, 9, 9, 0, 0, 0, 0, 5];
        assert!(decode_frame(&wire).unwrap_err().is_malformed());
    }
}
