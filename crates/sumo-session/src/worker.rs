//! Cooperative worker substrate.
//!
//! A long-running loop is a [`Worker`]; one that is fed by a [`ByteQueue`] is
//! also a [`QueueConsumer`]. Stopping is cooperative: the [`StopFlag`] is
//! checked at the top of every iteration, and a consumer blocked on its queue
//! must be woken with a sentinel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::Result;
use crate::queue::ByteQueue;

const SLEEP_SLICE: Duration = Duration::from_millis(10);

/// Shared stop request.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Clear a previous stop request before (re)starting a loop.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Sleep for `duration`, waking early if a stop is requested.
    ///
    /// Returns `true` if the stop flag was observed.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_stop_requested() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}

/// A loop run on its own thread.
pub trait Worker: Send + 'static {
    /// Thread name suffix, also used in log fields.
    fn name(&self) -> &'static str;

    fn stop_flag(&self) -> &StopFlag;

    /// Run until stopped. Must check the stop flag at the top of each iteration.
    fn run(&mut self);
}

/// A component fed through a [`ByteQueue`].
pub trait QueueConsumer {
    fn queue(&self) -> &ByteQueue;

    /// Block for the next item.
    ///
    /// Returns `None` when `stop` is set or the shutdown sentinel was dequeued.
    fn next_item(&self, stop: &StopFlag) -> Option<Bytes> {
        if stop.is_stop_requested() {
            return None;
        }
        match self.queue().pop(None) {
            Some(item) if !item.is_empty() => Some(item),
            _ => None,
        }
    }
}

/// Handle to a spawned worker thread.
#[derive(Debug)]
pub struct WorkerHandle {
    name: &'static str,
    stop: StopFlag,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Request a stop, push one sentinel into each of `wake`, then join.
    pub fn shutdown(self, wake: &[&ByteQueue]) {
        self.stop.request_stop();
        for queue in wake {
            queue.push_sentinel();
        }
        self.join();
    }

    /// Wait for the thread to exit. Returns `false` if it panicked.
    pub fn join(mut self) -> bool {
        match self.thread.take() {
            Some(thread) => match thread.join() {
                Ok(()) => {
                    debug!(worker = self.name, "worker joined");
                    true
                }
                Err(_) => {
                    warn!(worker = self.name, "worker panicked");
                    false
                }
            },
            None => true,
        }
    }
}

/// Reset the worker's stop flag and run it on a named thread.
pub fn spawn<W: Worker>(mut worker: W) -> Result<WorkerHandle> {
    let name = worker.name();
    let stop = worker.stop_flag().clone();
    stop.reset();

    let thread = thread::Builder::new()
        .name(format!("sumo-{name}"))
        .spawn(move || {
            debug!(worker = name, "worker started");
            worker.run();
            debug!(worker = name, "worker exiting");
        })?;

    Ok(WorkerHandle {
        name,
        stop,
        thread: Some(thread),
    })
}
