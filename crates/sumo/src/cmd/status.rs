use serde::Serialize;
use sumo_session::{DeviceIdentity, Session};

use crate::cmd::StatusArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct InitOutput {
    complete: bool,
    date_confirmed: Option<String>,
    time_confirmed: Option<String>,
    info_complete: bool,
    unacknowledged: usize,
}

#[derive(Serialize)]
struct StatusOutput {
    device: String,
    c2d_port: Option<u16>,
    handshake_status: Option<i64>,
    battery: u8,
    identity: DeviceIdentity,
    init: Option<InitOutput>,
}

pub fn run(args: StatusArgs, format: OutputFormat) -> CliResult<i32> {
    let session = args.connect.open()?;
    let out = collect(&session);
    session.close();

    print_record("status", &out, &rows(&out), format);
    Ok(SUCCESS)
}

fn collect(session: &Session) -> StatusOutput {
    let handshake = session.handshake();
    StatusOutput {
        device: session.config().handshake.device_addr.to_string(),
        c2d_port: handshake.map(|h| h.c2d_port),
        handshake_status: handshake
            .and_then(|h| h.response.as_ref())
            .and_then(|r| r.status),
        battery: session.battery_level(),
        identity: session.identity(),
        init: session.init_report().map(|report| InitOutput {
            complete: report.is_complete(),
            date_confirmed: report.date_confirmed.clone(),
            time_confirmed: report.time_confirmed.clone(),
            info_complete: report.info_complete,
            unacknowledged: report.unacknowledged,
        }),
    }
}

fn rows(out: &StatusOutput) -> Vec<(String, String)> {
    fn or_dash(value: Option<&String>) -> String {
        value.cloned().unwrap_or_else(|| "-".to_string())
    }

    let mut rows = vec![
        ("device".to_string(), out.device.clone()),
        (
            "c2d_port".to_string(),
            out.c2d_port.map_or_else(|| "-".to_string(), |p| p.to_string()),
        ),
        ("battery".to_string(), format!("{}%", out.battery)),
        ("name".to_string(), or_dash(out.identity.name.as_ref())),
        (
            "software".to_string(),
            or_dash(out.identity.software_version.as_ref()),
        ),
        (
            "hardware".to_string(),
            or_dash(out.identity.hardware_version.as_ref()),
        ),
        ("product_id".to_string(), or_dash(out.identity.product_id.as_ref())),
        ("serial".to_string(), or_dash(out.identity.serial.as_ref())),
        ("language".to_string(), or_dash(out.identity.language.as_ref())),
    ];
    if let Some(init) = &out.init {
        rows.push(("init_complete".to_string(), init.complete.to_string()));
        rows.push((
            "unacknowledged".to_string(),
            init.unacknowledged.to_string(),
        ));
    }
    rows
}
