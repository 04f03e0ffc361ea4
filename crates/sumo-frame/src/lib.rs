//! Wire format of the Jumping Sumo protocol.
//!
//! Every datagram exchanged with the device carries one or more frames, each
//! starting with a fixed 7-byte header:
//! - `type` (1 byte): ACK, SYNC, IMAGE or IOCTL
//! - `ext` (1 byte): sub-kind, meaning depends on `type`
//! - `seqno` (1 byte): per-channel sequence number
//! - `size` (2 bytes, little-endian): total frame length including the header
//! - reserved (2 bytes, always zero)
//!
//! Pure encode/decode, no I/O.

pub mod codec;
pub mod command;
pub mod error;
pub mod ioctl;
pub mod kind;
pub mod report;
pub mod split;

pub use codec::{
    decode_frame, encode_frame, AckFrame, Frame, Header, ImageFrame, MoveFrame, OpaqueFrame,
    SyncFrame, HEADER_SIZE, MAX_FRAME_SIZE,
};
pub use command::{EnableFlag, Flip, Jump, Maneuver, Special};
pub use error::{FrameError, Result};
pub use ioctl::{codes, IoctlFrame, IoctlPayload};
pub use kind::{ACK, ACK_FLAG, IMAGE, IOCTL, IOCTL_EXT, MOVE_EXT, SYNC, SYNC_EXT_ECHO, SYNC_EXT_REQUEST};
pub use report::{DeviceReport, Versions};
pub use split::{split_datagram, DatagramFrames, RawFrame};
