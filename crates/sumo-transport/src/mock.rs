//! In-memory transport for testing the layers above without a device.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{Result, TransportError};
use crate::traits::DatagramTransport;

/// Mock datagram transport.
///
/// Datagrams injected with [`inject`](MockTransport::inject) are handed out by
/// `recv` in order; everything passed to `send` is recorded. Clones share the
/// same state, so a test can keep one handle while the code under test owns
/// another.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<MockState>,
    changed: Condvar,
}

#[derive(Default)]
struct MockState {
    inbound: VecDeque<Vec<u8>>,
    sent: Vec<Vec<u8>>,
    fail_sends: bool,
    closed: bool,
}

impl MockTransport {
    /// Create an empty mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one datagram for the reader.
    pub fn inject(&self, datagram: &[u8]) {
        let mut state = self.lock();
        state.inbound.push_back(datagram.to_vec());
        self.inner.changed.notify_all();
    }

    /// All datagrams sent so far, oldest first.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.lock().sent.clone()
    }

    /// Forget every recorded datagram.
    pub fn clear_sent(&self) {
        self.lock().sent.clear();
    }

    /// Block until at least `count` datagrams were sent or `timeout` elapses.
    ///
    /// Returns the datagrams sent so far either way.
    pub fn wait_for_sent(&self, count: usize, timeout: Duration) -> Vec<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        while state.sent.len() < count {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            state = self
                .inner
                .changed
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        state.sent.clone()
    }

    /// Make every subsequent `send` fail with an I/O error.
    pub fn fail_sends(&self, fail: bool) {
        self.lock().fail_sends = fail;
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl DatagramTransport for MockTransport {
    fn send(&self, datagram: &[u8]) -> Result<usize> {
        let mut state = self.lock();
        if state.closed {
            return Err(TransportError::Closed);
        }
        if state.fail_sends {
            return Err(TransportError::Io(std::io::Error::other("mock send failure")));
        }
        state.sent.push(datagram.to_vec());
        self.inner.changed.notify_all();
        Ok(datagram.len())
    }

    fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.lock();
        loop {
            if let Some(datagram) = state.inbound.pop_front() {
                let len = datagram.len().min(buf.len());
                buf[..len].copy_from_slice(&datagram[..len]);
                return Ok(len);
            }
            if state.closed {
                return Err(TransportError::Closed);
            }
            state = self
                .inner
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        self.inner.changed.notify_all();
    }

    fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MockTransport")
            .field("pending", &state.inbound.len())
            .field("sent", &state.sent.len())
            .field("closed", &state.closed)
            .finish()
    }
}
