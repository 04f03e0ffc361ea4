use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;

/// Thread-safe FIFO of owned byte buffers.
///
/// An empty buffer is the shutdown sentinel: consumers that pop one must stop,
/// not treat it as a frame.
#[derive(Debug, Default)]
pub struct ByteQueue {
    items: Mutex<VecDeque<Bytes>>,
    ready: Condvar,
}

impl ByteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue `item` and wake one waiter.
    pub fn push(&self, item: Bytes) {
        self.lock().push_back(item);
        self.ready.notify_one();
    }

    /// Enqueue the wake-and-exit sentinel.
    pub fn push_sentinel(&self) {
        self.push(Bytes::new());
    }

    /// Dequeue the oldest item.
    ///
    /// With `None` blocks until an item arrives. With `Some(timeout)` returns
    /// `None` once the timeout elapses with the queue still empty.
    pub fn pop(&self, timeout: Option<Duration>) -> Option<Bytes> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut items = self.lock();
        loop {
            if let Some(item) = items.pop_front() {
                return Some(item);
            }
            items = match deadline {
                None => self
                    .ready
                    .wait(items)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    self.ready
                        .wait_timeout(items, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop everything still queued.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Bytes>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
