/// Errors that can occur during frame encoding/decoding.
///
/// Every variant except [`FrameError::FrameTooLarge`] describes a malformed
/// frame on the wire; see [`FrameError::is_malformed`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// Fewer bytes than a frame header.
    #[error("short frame header ({len} bytes, need 7)")]
    ShortHeader { len: usize },

    /// The reserved header field is not zero.
    #[error("reserved header field is {0:#06x}, expected 0")]
    ReservedNotZero(u16),

    /// The declared size cannot even hold the header.
    #[error("declared frame size {0} is shorter than the header")]
    SizeBelowHeader(u16),

    /// The declared size runs past the end of the buffer.
    #[error("frame declares {declared} bytes but only {available} remain")]
    Truncated { declared: usize, available: usize },

    /// The frame body is too short for its variant.
    #[error("{kind} frame body too short ({available} bytes, need {needed})")]
    ShortPayload {
        kind: &'static str,
        needed: usize,
        available: usize,
    },

    /// A move frame does not start with the 0x03 marker byte.
    #[error("move frame marker is {0:#04x}, expected 0x03")]
    InvalidMoveMarker(u8),

    /// A sync timestamp's nanosecond field is not below one billion.
    #[error("sync nanoseconds {0} out of range")]
    InvalidNanoseconds(u32),

    /// The encoded frame would not fit the 16-bit size field.
    #[error("frame too large ({size} bytes, max 65535)")]
    FrameTooLarge { size: usize },
}

impl FrameError {
    /// True when the error describes bad bytes received from the wire.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, FrameError::FrameTooLarge { .. })
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
