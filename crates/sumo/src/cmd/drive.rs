use serde::Serialize;
use tracing::info;

use crate::cmd::{install_ctrlc_handler, parse_duration, wait_while_running, DriveArgs};
use crate::exit::{CliResult, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct DriveOutput {
    speed: i8,
    turn: i8,
    duration_ms: u128,
    interrupted: bool,
    battery: u8,
}

pub fn run(args: DriveArgs, format: OutputFormat) -> CliResult<i32> {
    let duration = parse_duration(&args.duration)?;
    let running = install_ctrlc_handler()?;
    let session = args.connect.open()?;

    info!(speed = args.speed, turn = args.turn, ?duration, "driving");
    session.drive(args.speed, args.turn);
    let completed = wait_while_running(&session, &running, Some(duration));
    session.drive(0, 0);

    let lost = !session.is_open();
    let out = DriveOutput {
        speed: args.speed,
        turn: args.turn,
        duration_ms: duration.as_millis(),
        interrupted: !completed,
        battery: session.battery_level(),
    };
    session.close();

    let rows = vec![
        ("speed".to_string(), out.speed.to_string()),
        ("turn".to_string(), out.turn.to_string()),
        ("duration".to_string(), format!("{} ms", out.duration_ms)),
        ("interrupted".to_string(), out.interrupted.to_string()),
        ("battery".to_string(), format!("{}%", out.battery)),
    ];
    print_record("drive", &out, &rows, format);

    Ok(if lost { TRANSPORT_ERROR } else { SUCCESS })
}
