use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Args, Subcommand, ValueEnum};
use sumo_frame::{Flip, Jump, Maneuver, Special};
use sumo_session::{
    ImageSink, NullSink, Session, SessionConfig, DEFAULT_CONTROL_PORT, DEFAULT_DATA_PORT,
    DEFAULT_DEVICE_ADDR,
};

use crate::exit::{session_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod drive;
pub mod maneuver;
pub mod status;
pub mod turn;
pub mod version;
pub mod video;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Drive with fixed setpoints for a while.
    Drive(DriveArgs),
    /// Perform a jump, flip or scripted trick.
    Maneuver(ManeuverArgs),
    /// Turn on the spot.
    Turn(TurnArgs),
    /// Record or play the video stream.
    Video(VideoArgs),
    /// Show battery level and device identity.
    Status(StatusArgs),
    /// Split and describe one captured datagram given as hex.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Drive(args) => drive::run(args, format),
        Command::Maneuver(args) => maneuver::run(args, format),
        Command::Turn(args) => turn::run(args, format),
        Command::Video(args) => video::run(args, format),
        Command::Status(args) => status::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// How to reach the device.
#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    /// Device address.
    #[arg(long, default_value_t = IpAddr::V4(DEFAULT_DEVICE_ADDR), env = "SUMO_DEVICE")]
    pub device: IpAddr,
    /// Device TCP control port.
    #[arg(long, default_value_t = DEFAULT_CONTROL_PORT)]
    pub control_port: u16,
    /// Local UDP port the device sends to.
    #[arg(long, default_value_t = DEFAULT_DATA_PORT)]
    pub d2c_port: u16,
    /// Control-port connect timeout (e.g. 2s, 500ms).
    #[arg(long, default_value = "2s")]
    pub connect_timeout: String,
    /// Wait for each command ack (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub ack_timeout: String,
    /// Also send our own keepalive frames.
    #[arg(long)]
    pub keepalive: bool,
}

impl ConnectArgs {
    pub fn session_config(&self) -> CliResult<SessionConfig> {
        let mut config = SessionConfig {
            ack_timeout: parse_duration(&self.ack_timeout)?,
            keepalive_out: self.keepalive,
            ..SessionConfig::default()
        };
        config.handshake.device_addr = self.device;
        config.handshake.control_port = self.control_port;
        config.handshake.d2c_port = self.d2c_port;
        config.handshake.connect_timeout = parse_duration(&self.connect_timeout)?;
        Ok(config)
    }

    pub fn open(&self) -> CliResult<Session> {
        self.open_with_sink(Box::new(NullSink))
    }

    pub fn open_with_sink(&self, sink: Box<dyn ImageSink>) -> CliResult<Session> {
        let config = self.session_config()?;
        Session::open_with_config(config, sink).map_err(|err| session_error("open failed", err))
    }
}

#[derive(Args, Debug)]
pub struct DriveArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Forward speed, -127..=127.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub speed: i8,
    /// Turn rate, -64..=64.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub turn: i8,
    /// How long to drive (e.g. 2s, 1500ms).
    #[arg(long, default_value = "1s")]
    pub duration: String,
}

/// Maneuvers by command-line name.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ManeuverName {
    HighJump,
    LongJump,
    FlipUpsideDown,
    FlipDownsideUp,
    HandstandBalance,
    QuickTurnRight,
    LookLeftAndRight,
    Tap,
    Swing,
    QuickTurnRightLeft,
    TurnAndJump,
    TurnToBalance,
    Slalom,
    GrowingCircles,
}

impl ManeuverName {
    pub fn maneuver(self) -> Maneuver {
        match self {
            ManeuverName::HighJump => Maneuver::Jump(Jump::High),
            ManeuverName::LongJump => Maneuver::Jump(Jump::Long),
            ManeuverName::FlipUpsideDown => Maneuver::Flip(Flip::UpsideDown),
            ManeuverName::FlipDownsideUp => Maneuver::Flip(Flip::DownsideUp),
            ManeuverName::HandstandBalance => Maneuver::Flip(Flip::Balance),
            ManeuverName::QuickTurnRight => Maneuver::Special(Special::QuickTurnRight),
            ManeuverName::LookLeftAndRight => Maneuver::Special(Special::LookLeftAndRight),
            ManeuverName::Tap => Maneuver::Special(Special::Tap),
            ManeuverName::Swing => Maneuver::Special(Special::Swing),
            ManeuverName::QuickTurnRightLeft => Maneuver::Special(Special::QuickTurnRightLeft),
            ManeuverName::TurnAndJump => Maneuver::Special(Special::TurnAndJump),
            ManeuverName::TurnToBalance => Maneuver::Special(Special::TurnToBalance),
            ManeuverName::Slalom => Maneuver::Special(Special::Slalom),
            ManeuverName::GrowingCircles => Maneuver::Special(Special::GrowingCircles),
        }
    }
}

#[derive(Args, Debug)]
pub struct ManeuverArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Maneuver to perform.
    #[arg(value_enum)]
    pub name: ManeuverName,
}

#[derive(Args, Debug)]
pub struct TurnArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Angle in radians, within [-pi, pi]. Positive turns right.
    #[arg(long, allow_negative_numbers = true)]
    pub angle: f32,
}

#[derive(Args, Debug)]
pub struct VideoArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Write each frame as a numbered JPEG into this directory.
    #[arg(long, value_name = "DIR", conflicts_with = "player")]
    pub out: Option<PathBuf>,
    /// Pipe the MJPEG stream into this command. Default: mplayer.
    #[arg(long, value_name = "CMD", conflicts_with = "out")]
    pub player: Option<String>,
    /// Stop after this long (e.g. 30s). Default: until Ctrl-C.
    #[arg(long)]
    pub duration: Option<String>,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Datagram bytes as hex; whitespace and ':' separators are ignored.
    pub hex: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `5s`, `500ms` or a bare number of seconds. Zero is rejected.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

/// Install a Ctrl-C handler clearing the returned flag.
pub fn install_ctrlc_handler() -> CliResult<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        flag.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;
    Ok(running)
}

/// Sleep until `limit` elapses, Ctrl-C clears `running`, or the session dies.
///
/// Returns `false` if interrupted.
pub fn wait_while_running(
    session: &Session,
    running: &AtomicBool,
    limit: Option<Duration>,
) -> bool {
    let started = Instant::now();
    while running.load(Ordering::SeqCst) && session.is_open() {
        if limit.is_some_and(|limit| started.elapsed() >= limit) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}
