//! Frame type and extension codes.
//!
//! `type` selects the consumer of a frame; `ext` refines it. The device uses
//! separate sequence counters per direction and per channel, so neither field
//! says anything about ordering.

/// Acknowledgement of a received ioctl.
pub const ACK: u8 = 1;

/// Clock synchronization and motion setpoints.
pub const SYNC: u8 = 2;

/// Video stream (one JPEG per frame).
pub const IMAGE: u8 = 3;

/// Commands and device reports.
pub const IOCTL: u8 = 4;

/// SYNC sent by the device that must be echoed back.
pub const SYNC_EXT_REQUEST: u8 = 0;

/// SYNC echo: the answer to a keepalive.
pub const SYNC_EXT_ECHO: u8 = 1;

/// SYNC carrying motion setpoints.
pub const MOVE_EXT: u8 = 10;

/// `ext` of every ioctl sent by the controller.
pub const IOCTL_EXT: u8 = 11;

/// Bit set in an ACK's `ext` on top of the acknowledged frame's `ext`.
pub const ACK_FLAG: u8 = 0x80;

/// Returns a human-readable name for a frame type.
pub fn type_name(frame_type: u8) -> &'static str {
    match frame_type {
        ACK => "ACK",
        SYNC => "SYNC",
        IMAGE => "IMAGE",
        IOCTL => "IOCTL",
        _ => "UNKNOWN",
    }
}

/// The `ext` an acknowledgement of a frame with `ext` must carry.
pub fn ack_ext(ext: u8) -> u8 {
    ext | ACK_FLAG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(type_name(ACK), "ACK");
        assert_eq!(type_name(IOCTL), "IOCTL");
        assert_eq!(type_name(9), "UNKNOWN");
    }

    #[test]
    fn ack_ext_sets_high_bit() {
        assert_eq!(ack_ext(IOCTL_EXT), 0x8b);
        assert_eq!(ack_ext(0x8b), 0x8b);
    }
}
