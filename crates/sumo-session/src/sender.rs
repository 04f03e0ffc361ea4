use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::BytesMut;
use sumo_frame::{encode_frame, Frame};
use sumo_transport::{DatagramTransport, TransportError};
use tracing::{trace, warn};

use crate::error::Result;

/// Per-channel sequence counter: starts at 1, wraps at 256.
///
/// Each counter is owned by exactly one component, so it is not synchronized.
#[derive(Debug, Clone)]
pub struct SeqCounter(u8);

impl SeqCounter {
    pub fn new() -> Self {
        Self(1)
    }

    /// The value the next frame will carry.
    pub fn peek(&self) -> u8 {
        self.0
    }

    /// Take the current value and advance.
    pub fn next(&mut self) -> u8 {
        let seqno = self.0;
        self.0 = self.0.wrapping_add(1);
        seqno
    }
}

impl Default for SeqCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializes frames onto the transport, one datagram per frame.
///
/// Shared by every component that sends; the internal lock keeps concurrent
/// writers from interleaving on the wire.
pub struct FrameSender {
    transport: Arc<dyn DatagramTransport>,
    buf: Mutex<BytesMut>,
}

impl FrameSender {
    pub fn new(transport: Arc<dyn DatagramTransport>) -> Self {
        Self {
            transport,
            buf: Mutex::new(BytesMut::with_capacity(256)),
        }
    }

    /// Encode `frame` and write it as one datagram.
    ///
    /// Failures and partial writes are logged and returned; nothing is retried.
    pub fn send(&self, frame: &Frame) -> Result<()> {
        let mut buf = self.buf.lock().unwrap_or_else(PoisonError::into_inner);
        buf.clear();
        encode_frame(frame, &mut buf)?;

        match self.transport.send(&buf) {
            Ok(written) if written == buf.len() => {
                trace!(%frame, "sent");
                Ok(())
            }
            Ok(written) => {
                warn!(written, expected = buf.len(), "frame partially sent");
                Err(TransportError::PartialWrite {
                    written,
                    expected: buf.len(),
                }
                .into())
            }
            Err(err) => {
                if !err.is_closed() {
                    warn!(error = %err, "send failed");
                }
                Err(err.into())
            }
        }
    }

    pub fn transport(&self) -> &Arc<dyn DatagramTransport> {
        &self.transport
    }
}

impl fmt::Debug for FrameSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameSender")
            .field("closed", &self.transport.is_closed())
            .finish()
    }
}
