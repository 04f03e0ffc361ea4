//! The outgoing command channel: one ioctl in flight, answered by one ack.

use std::sync::Arc;
use std::time::Duration;

use sumo_frame::{decode_frame, kind, AckFrame, Frame, Header, IoctlFrame};
use tracing::{debug, warn};

use crate::error::{Result, SessionError};
use crate::queue::ByteQueue;
use crate::sender::{FrameSender, SeqCounter};

/// How the item received after a command compares to what was expected.
///
/// A mismatch is logged, never raised: the device is known to answer in ways
/// that are not fully understood.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckCheck {
    /// Seqno of the command.
    pub seqno: u8,
    /// The reply, when it decoded as an ack.
    pub ack: Option<AckFrame>,
    pub type_matches: bool,
    pub seqno_matches: bool,
    pub ext_matches: bool,
}

impl AckCheck {
    /// Compare `reply` against a command sent with `sent_ext` / `sent_seqno`.
    pub fn evaluate(sent_ext: u8, sent_seqno: u8, reply: &[u8]) -> Self {
        let expected_ext = kind::ack_ext(sent_ext);
        match decode_frame(reply) {
            Ok(Frame::Ack(ack)) => Self {
                seqno: sent_seqno,
                ack: Some(ack),
                type_matches: true,
                seqno_matches: ack.acked == sent_seqno,
                ext_matches: ack.ext == expected_ext,
            },
            _ => Self {
                seqno: sent_seqno,
                ack: None,
                type_matches: false,
                seqno_matches: false,
                ext_matches: Header::decode(reply).is_ok_and(|h| h.ext == expected_ext),
            },
        }
    }

    pub fn is_match(&self) -> bool {
        self.type_matches && self.seqno_matches && self.ext_matches
    }

    fn log_mismatch(&self) {
        if !self.type_matches {
            warn!(seqno = self.seqno, "reply to command is not an ack");
        }
        if let Some(ack) = self.ack.filter(|_| !self.seqno_matches) {
            warn!(
                seqno = self.seqno,
                acked = ack.acked,
                "ack is for another command"
            );
        }
        if self.type_matches && !self.ext_matches {
            warn!(seqno = self.seqno, "unexpected ext on ack");
        }
    }
}

/// Sends commands with the session's sequence counter and waits for each ack.
#[derive(Debug)]
pub struct CommandChannel {
    seq: SeqCounter,
    sender: Arc<FrameSender>,
    acks: Arc<ByteQueue>,
    ack_timeout: Duration,
}

impl CommandChannel {
    pub fn new(sender: Arc<FrameSender>, acks: Arc<ByteQueue>, ack_timeout: Duration) -> Self {
        Self {
            seq: SeqCounter::new(),
            sender,
            acks,
            ack_timeout,
        }
    }

    /// Seqno the next command will carry.
    pub fn next_seqno(&self) -> u8 {
        self.seq.peek()
    }

    /// Build a command with the next seqno, send it, and wait for one reply.
    ///
    /// Fails with [`SessionError::Timeout`] if nothing arrives within the ack
    /// timeout and with [`SessionError::Closed`] once the router has exited.
    pub fn issue(&mut self, build: impl FnOnce(u8) -> IoctlFrame) -> Result<AckCheck> {
        self.discard_stale()?;

        let frame = build(self.seq.next());
        let (ext, seqno) = (frame.ext, frame.seqno);
        debug!(
            subtype = frame.subtype,
            func = frame.func,
            seqno,
            "sending command"
        );
        self.sender.send(&Frame::Ioctl(frame))?;

        match self.acks.pop(Some(self.ack_timeout)) {
            None => {
                warn!(seqno, timeout = ?self.ack_timeout, "command not acknowledged");
                Err(SessionError::Timeout(self.ack_timeout))
            }
            Some(reply) if reply.is_empty() => {
                self.acks.push_sentinel();
                Err(SessionError::Closed)
            }
            Some(reply) => {
                let check = AckCheck::evaluate(ext, seqno, &reply);
                if !check.is_match() {
                    check.log_mismatch();
                }
                Ok(check)
            }
        }
    }

    /// Drop acks left over from a command that timed out.
    fn discard_stale(&self) -> Result<()> {
        while let Some(stale) = self.acks.pop(Some(Duration::ZERO)) {
            if stale.is_empty() {
                self.acks.push_sentinel();
                return Err(SessionError::Closed);
            }
            debug!(len = stale.len(), "discarding late ack");
        }
        Ok(())
    }
}
