use std::f32::consts::PI;

use sumo_frame::Maneuver;

use crate::cmd::maneuver::AckOutput;
use crate::cmd::TurnArgs;
use crate::exit::{session_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::OutputFormat;

pub fn run(args: TurnArgs, format: OutputFormat) -> CliResult<i32> {
    validate_angle(args.angle)?;
    let session = args.connect.open()?;

    let result = session.quick_turn(args.angle);
    session.close();
    let check = result.map_err(|err| session_error("turn failed", err))?;

    AckOutput::new(Maneuver::QuickTurn(args.angle).to_string(), &check).print(format);
    Ok(SUCCESS)
}

fn validate_angle(angle: f32) -> CliResult<()> {
    if !angle.is_finite() || !(-PI..=PI).contains(&angle) {
        return Err(CliError::new(
            USAGE,
            format!("angle must be within [-pi, pi], got {angle}"),
        ));
    }
    Ok(())
}
