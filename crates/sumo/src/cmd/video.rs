use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use sumo_session::{FileSink, ImageSink, PipeSink, DEFAULT_PLAYER};
use tracing::info;

use crate::cmd::{install_ctrlc_handler, parse_duration, wait_while_running, VideoArgs};
use crate::exit::{io_error, CliResult, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_record, OutputFormat};

/// Counts frames on their way to the real sink.
struct Counted<S> {
    inner: S,
    frames: Arc<AtomicU64>,
}

impl<S: ImageSink> ImageSink for Counted<S> {
    fn on_image_frame(&mut self, frame_number: u16, jpeg: &[u8]) -> io::Result<()> {
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.inner.on_image_frame(frame_number, jpeg)
    }

    fn finish(&mut self) -> io::Result<()> {
        self.inner.finish()
    }
}

fn counted<S: ImageSink + 'static>(inner: S, frames: &Arc<AtomicU64>) -> Box<dyn ImageSink> {
    Box::new(Counted {
        inner,
        frames: Arc::clone(frames),
    })
}

#[derive(Serialize)]
struct VideoOutput {
    destination: String,
    frames: u64,
    interrupted: bool,
}

pub fn run(args: VideoArgs, format: OutputFormat) -> CliResult<i32> {
    let limit = args.duration.as_deref().map(parse_duration).transpose()?;
    let frames = Arc::new(AtomicU64::new(0));

    let (destination, sink): (String, Box<dyn ImageSink>) = match &args.out {
        Some(dir) => {
            let sink = FileSink::create(dir)
                .map_err(|err| io_error(&format!("cannot create {}", dir.display()), err))?;
            (dir.display().to_string(), counted(sink, &frames))
        }
        None => {
            let command_line = args.player.as_deref().unwrap_or(DEFAULT_PLAYER);
            let sink = PipeSink::spawn(command_line)
                .map_err(|err| io_error(&format!("cannot start `{command_line}`"), err))?;
            (command_line.to_string(), counted(sink, &frames))
        }
    };

    let running = install_ctrlc_handler()?;
    let session = args.connect.open_with_sink(sink)?;
    info!(%destination, "relaying video, Ctrl-C to stop");

    let completed = wait_while_running(&session, &running, limit);
    let lost = !session.is_open();
    session.close();

    let out = VideoOutput {
        destination,
        frames: frames.load(Ordering::Relaxed),
        interrupted: !completed,
    };
    let rows = vec![
        ("destination".to_string(), out.destination.clone()),
        ("frames".to_string(), out.frames.to_string()),
        ("interrupted".to_string(), out.interrupted.to_string()),
    ];
    print_record("video", &out, &rows, format);

    Ok(if lost { TRANSPORT_ERROR } else { SUCCESS })
}
