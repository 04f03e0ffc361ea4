use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Modules that trace every datagram and frame crossing the wire.
const WIRE_TARGETS: [&str; 3] = [
    "sumo_transport::udp",
    "sumo_session::sender",
    "sumo_session::router",
];

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Per-target filter: `level` everywhere, except that per-frame traces from
/// the wire modules need `wire`.
pub fn filter(level: LogLevel, wire: bool) -> Targets {
    let wire_level = match (wire, level) {
        (true, _) => LevelFilter::TRACE,
        (false, LogLevel::Trace) => LevelFilter::DEBUG,
        (false, other) => other.as_filter(),
    };
    Targets::new()
        .with_default(level.as_filter())
        .with_targets(WIRE_TARGETS.map(|target| (target, wire_level)))
}

/// Install the stderr subscriber. Stdout carries command output only.
///
/// Each record carries the worker thread name (`sumo-router`,
/// `sumo-keepalive-out`, ...) and its module target.
pub fn init_logging(format: LogFormat, level: LogLevel, wire: bool) {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_thread_names(true)
        .with_target(true);
    let registry = tracing_subscriber::registry().with(filter(level, wire));

    match format {
        LogFormat::Text => {
            let _ = registry.with(layer).try_init();
        }
        LogFormat::Json => {
            let _ = registry.with(layer.json()).try_init();
        }
    }
}
