use serde::Serialize;
use sumo_session::AckCheck;

use crate::cmd::ManeuverArgs;
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
pub(crate) struct AckOutput {
    pub command: String,
    pub seqno: u8,
    pub acked: bool,
    pub matched: bool,
}

impl AckOutput {
    pub(crate) fn new(command: String, check: &AckCheck) -> Self {
        Self {
            command,
            seqno: check.seqno,
            acked: check.ack.is_some(),
            matched: check.is_match(),
        }
    }

    pub(crate) fn print(&self, format: OutputFormat) {
        let rows = vec![
            ("command".to_string(), self.command.clone()),
            ("seqno".to_string(), self.seqno.to_string()),
            ("acked".to_string(), self.acked.to_string()),
            ("matched".to_string(), self.matched.to_string()),
        ];
        print_record("command", self, &rows, format);
    }
}

pub fn run(args: ManeuverArgs, format: OutputFormat) -> CliResult<i32> {
    let maneuver = args.name.maneuver();
    let session = args.connect.open()?;

    let result = session.maneuver(maneuver);
    session.close();
    let check = result.map_err(|err| session_error("maneuver failed", err))?;

    AckOutput::new(maneuver.to_string(), &check).print(format);
    Ok(SUCCESS)
}
