//! Video relay: image frames are handed to an [`ImageSink`] in arrival order.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use sumo_frame::{decode_frame, Frame};
use tracing::{debug, info, trace, warn};

use crate::queue::ByteQueue;
use crate::worker::{QueueConsumer, StopFlag, Worker};

/// Player fed with the MJPEG stream by [`PipeSink::spawn_default`].
pub const DEFAULT_PLAYER: &str = "mplayer -cache 32 -demuxer lavf -lavfdopts format=mjpeg -";

/// Destination of the video stream.
pub trait ImageSink: Send {
    /// Receive one JPEG.
    fn on_image_frame(&mut self, frame_number: u16, jpeg: &[u8]) -> io::Result<()>;

    /// Called once after the last frame.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Discards every frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ImageSink for NullSink {
    fn on_image_frame(&mut self, _frame_number: u16, _jpeg: &[u8]) -> io::Result<()> {
        Ok(())
    }
}

/// Keeps every frame in memory. Clones share the buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    frames: Arc<Mutex<Vec<(u16, Bytes)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<(u16, Bytes)> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ImageSink for MemorySink {
    fn on_image_frame(&mut self, frame_number: u16, jpeg: &[u8]) -> io::Result<()> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((frame_number, Bytes::copy_from_slice(jpeg)));
        Ok(())
    }
}

/// Writes each frame to `<dir>/frame-NNNNNN.jpg`, numbered in arrival order.
#[derive(Debug)]
pub struct FileSink {
    dir: PathBuf,
    written: u64,
}

impl FileSink {
    /// Create `dir` if needed.
    pub fn create(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, written: 0 })
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    fn path_for(&self, index: u64) -> PathBuf {
        self.dir.join(format!("frame-{index:06}.jpg"))
    }
}

impl ImageSink for FileSink {
    fn on_image_frame(&mut self, frame_number: u16, jpeg: &[u8]) -> io::Result<()> {
        let path = self.path_for(self.written);
        fs::write(&path, jpeg)?;
        trace!(frame_number, path = %path.display(), "frame written");
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        info!(dir = %self.dir.display(), frames = self.written, "video saved");
        Ok(())
    }
}

/// Streams the JPEGs into the stdin of a child process, e.g. a video player.
#[derive(Debug)]
pub struct PipeSink {
    child: Child,
    stdin: Option<ChildStdin>,
}

impl PipeSink {
    /// Spawn `command_line`, split on whitespace. The child's output is discarded.
    pub fn spawn(command_line: &str) -> io::Result<Self> {
        let mut parts = command_line.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty player command"))?;
        let mut command = Command::new(program);
        command
            .args(parts)
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        Self::from_command(command)
    }

    pub fn spawn_default() -> io::Result<Self> {
        Self::spawn(DEFAULT_PLAYER)
    }

    /// Spawn a prepared command with its stdin piped.
    pub fn from_command(mut command: Command) -> io::Result<Self> {
        let mut child = command.stdin(Stdio::piped()).spawn()?;
        let stdin = child.stdin.take();
        debug!(pid = child.id(), "player started");
        Ok(Self { child, stdin })
    }
}

impl ImageSink for PipeSink {
    fn on_image_frame(&mut self, _frame_number: u16, jpeg: &[u8]) -> io::Result<()> {
        match self.stdin.as_mut() {
            Some(stdin) => stdin.write_all(jpeg),
            None => Err(io::Error::from(io::ErrorKind::BrokenPipe)),
        }
    }

    fn finish(&mut self) -> io::Result<()> {
        drop(self.stdin.take());
        let status = self.child.wait()?;
        debug!(%status, "player exited");
        Ok(())
    }
}

impl Drop for PipeSink {
    fn drop(&mut self) {
        if self.stdin.take().is_some() {
            let _ = self.child.wait();
        }
    }
}

/// Worker forwarding image payloads to the sink.
pub struct ImageChannel {
    queue: Arc<ByteQueue>,
    sink: Box<dyn ImageSink>,
    stop: StopFlag,
    failing: bool,
}

impl ImageChannel {
    pub fn new(queue: Arc<ByteQueue>, sink: Box<dyn ImageSink>, stop: StopFlag) -> Self {
        Self {
            queue,
            sink,
            stop,
            failing: false,
        }
    }

    fn forward(&mut self, item: &[u8]) {
        let image = match decode_frame(item) {
            Ok(Frame::Image(image)) => image,
            Ok(other) => {
                warn!(frame = %other, "unexpected frame on image channel");
                return;
            }
            Err(err) => {
                warn!(error = %err, "malformed image frame dropped");
                return;
            }
        };

        match self.sink.on_image_frame(image.frame_number, &image.jpeg) {
            Ok(()) => self.failing = false,
            // Logged once per run of consecutive failures.
            Err(err) if !self.failing => {
                warn!(error = %err, frame_number = image.frame_number, "image sink failed");
                self.failing = true;
            }
            Err(_) => {}
        }
    }
}

impl QueueConsumer for ImageChannel {
    fn queue(&self) -> &ByteQueue {
        &self.queue
    }
}

impl Worker for ImageChannel {
    fn name(&self) -> &'static str {
        "image"
    }

    fn stop_flag(&self) -> &StopFlag {
        &self.stop
    }

    fn run(&mut self) {
        while let Some(item) = self.next_item(&self.stop) {
            self.forward(&item);
        }
        if let Err(err) = self.sink.finish() {
            warn!(error = %err, "image sink did not finish cleanly");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use sumo_frame::ImageFrame;

    use super::*;
    use crate::worker::spawn;

    fn image(frame_number: u16, jpeg: &'static [u8]) -> Bytes {
        Frame::Image(ImageFrame {
            ext: 0,
            seqno: frame_number as u8,
            frame_number,
            jpeg: Bytes::from_static(jpeg),
        })
        .to_bytes()
        .expect("encodes")
    }

    fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "sumo-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ))
    }

    #[test]
    fn channel_forwards_payloads_in_arrival_order() {
        let sink = MemorySink::new();
        let queue = Arc::new(ByteQueue::new());
        let handle = spawn(ImageChannel::new(
            Arc::clone(&queue),
            Box::new(sink.clone()),
            StopFlag::new(),
        ))
        .expect("worker should spawn");

        queue.push(image(9, b"\xff\xd8first\xff\xd9"));
        queue.push(image(3, b"\xff\xd8second\xff\xd9"));

        let deadline = Instant::now() + Duration::from_secs(1);
        while sink.len() < 2 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        handle.shutdown(&[&queue]);

        let frames = sink.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].0, 9);
        assert_eq!(frames[0].1.as_ref(), b"\xff\xd8first\xff\xd9");
        assert_eq!(frames[1].0, 3);
    }

    #[test]
    fn file_sink_numbers_frames() {
        let dir = temp_dir("frames");
        let mut sink = FileSink::create(&dir).expect("dir should be creatable");

        sink.on_image_frame(100, b"a").expect("write");
        sink.on_image_frame(100, b"b").expect("write");
        sink.finish().expect("finish");

        assert_eq!(sink.written(), 2);
        assert_eq!(fs::read(dir.join("frame-000000.jpg")).expect("read"), b"a");
        assert_eq!(fs::read(dir.join("frame-000001.jpg")).expect("read"), b"b");
        let _ = fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[test]
    fn pipe_sink_feeds_child_stdin() {
        let dir = temp_dir("pipe");
        fs::create_dir_all(&dir).expect("dir should be creatable");
        let out = dir.join("stream.mjpeg");

        let mut command = Command::new("sh");
        command.arg("-c").arg(format!("cat > '{}'", out.display()));
        let mut sink = PipeSink::from_command(command).expect("sh should spawn");

        sink.on_image_frame(1, b"one").expect("write");
        sink.on_image_frame(2, b"two").expect("write");
        sink.finish().expect("finish");

        assert_eq!(fs::read(&out).expect("read"), b"onetwo");
        assert!(sink.on_image_frame(3, b"x").is_err());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn empty_player_command_is_rejected() {
        let err = PipeSink::spawn("  ").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
