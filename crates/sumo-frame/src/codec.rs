use std::fmt;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::ioctl::IoctlFrame;
use crate::kind::{self, ACK, IMAGE, IOCTL, MOVE_EXT, SYNC, SYNC_EXT_ECHO, SYNC_EXT_REQUEST};

/// Frame header: type (1) + ext (1) + seqno (1) + size (2) + reserved (2) = 7 bytes.
pub const HEADER_SIZE: usize = 7;

/// Largest frame the 16-bit size field can describe.
pub const MAX_FRAME_SIZE: usize = u16::MAX as usize;

const SYNC_BODY: usize = 8;
const NANOS_PER_SEC: u32 = 1_000_000_000;
const MOVE_BODY: usize = 7;
const MOVE_MARKER: u8 = 0x03;
const ACK_BODY: usize = 1;
const IMAGE_PREFIX: usize = 5;

/// The fixed header in front of every frame.
///
/// Wire format:
/// ```text
/// ┌──────┬─────┬───────┬───────────┬───────────────┐
/// │ type │ ext │ seqno │ size      │ reserved      │
/// │ (1B) │(1B) │ (1B)  │ (2B LE)   │ (2B LE, = 0)  │
/// └──────┴─────┴───────┴───────────┴───────────────┘
/// ```
/// `size` counts the whole frame, header included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub frame_type: u8,
    pub ext: u8,
    pub seqno: u8,
    pub size: u16,
}

impl Header {
    /// Decode and validate the header at the start of `src`.
    ///
    /// Fails when `src` is shorter than a header, the reserved field is not
    /// zero, or the declared size is below the header size or beyond `src`.
    pub fn decode(src: &[u8]) -> Result<Self> {
        if src.len() < HEADER_SIZE {
            return Err(FrameError::ShortHeader { len: src.len() });
        }

        let size = u16::from_le_bytes([src[3], src[4]]);
        let reserved = u16::from_le_bytes([src[5], src[6]]);

        if reserved != 0 {
            return Err(FrameError::ReservedNotZero(reserved));
        }
        if (size as usize) < HEADER_SIZE {
            return Err(FrameError::SizeBelowHeader(size));
        }
        if size as usize > src.len() {
            return Err(FrameError::Truncated {
                declared: size as usize,
                available: src.len(),
            });
        }

        Ok(Self {
            frame_type: src[0],
            ext: src[1],
            seqno: src[2],
            size,
        })
    }

    /// Number of bytes following the header.
    pub fn body_len(&self) -> usize {
        self.size as usize - HEADER_SIZE
    }

    fn put(&self, dst: &mut BytesMut) {
        dst.put_u8(self.frame_type);
        dst.put_u8(self.ext);
        dst.put_u8(self.seqno);
        dst.put_u16_le(self.size);
        dst.put_u16_le(0);
    }
}

/// Clock synchronization frame.
///
/// `ext == 0` asks the other side to echo it; `ext == 1` is the echo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncFrame {
    pub ext: u8,
    pub seqno: u8,
    pub seconds: u32,
    /// Always below one billion.
    pub nanoseconds: u32,
}

impl SyncFrame {
    /// A keepalive request stamped with `elapsed` on the local clock.
    pub fn request(seqno: u8, elapsed: Duration) -> Self {
        Self {
            ext: SYNC_EXT_REQUEST,
            seqno,
            seconds: u32::try_from(elapsed.as_secs()).unwrap_or(u32::MAX),
            nanoseconds: elapsed.subsec_nanos(),
        }
    }

    /// The echo of this frame: same seqno and timestamp, `ext` flipped to 1.
    pub fn echo(&self) -> Self {
        Self {
            ext: SYNC_EXT_ECHO,
            ..*self
        }
    }

    pub fn is_echo(&self) -> bool {
        self.ext == SYNC_EXT_ECHO
    }
}

/// Motion setpoints, sent as a SYNC frame with `ext == 10`.
///
/// Body: 4 bytes starting with the 0x03 marker, then `active`, `speed`, `turn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveFrame {
    pub seqno: u8,
    /// Set iff speed or turn is non-zero.
    pub active: bool,
    /// -127..=127
    pub speed: i8,
    /// -64..=64
    pub turn: i8,
}

impl MoveFrame {
    pub const MAX_SPEED: i8 = 127;
    pub const MAX_TURN: i8 = 64;

    /// Build a move frame, clamping the setpoints into the device's ranges.
    pub fn new(seqno: u8, speed: i8, turn: i8) -> Self {
        let speed = speed.clamp(-Self::MAX_SPEED, Self::MAX_SPEED);
        let turn = turn.clamp(-Self::MAX_TURN, Self::MAX_TURN);
        Self {
            seqno,
            active: speed != 0 || turn != 0,
            speed,
            turn,
        }
    }
}

/// Acknowledgement of an ioctl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckFrame {
    /// `ext` of the acknowledged frame with [`ACK_FLAG`](crate::ACK_FLAG) set.
    pub ext: u8,
    pub seqno: u8,
    /// Seqno of the frame being acknowledged.
    pub acked: u8,
}

impl AckFrame {
    /// Acknowledge a frame that arrived with `acked_ext` / `acked_seqno`.
    pub fn for_frame(seqno: u8, acked_ext: u8, acked_seqno: u8) -> Self {
        Self {
            ext: kind::ack_ext(acked_ext),
            seqno,
            acked: acked_seqno,
        }
    }
}

/// One JPEG of the video stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFrame {
    pub ext: u8,
    pub seqno: u8,
    pub frame_number: u16,
    pub jpeg: Bytes,
}

/// A frame whose type this codec does not know, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpaqueFrame {
    pub frame_type: u8,
    pub ext: u8,
    pub seqno: u8,
    pub body: Bytes,
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Sync(SyncFrame),
    Move(MoveFrame),
    Ack(AckFrame),
    Ioctl(IoctlFrame),
    Image(ImageFrame),
    Opaque(OpaqueFrame),
}

impl Frame {
    /// The header this frame is encoded with. `size` always matches
    /// [`wire_size`](Frame::wire_size), saturated at 65535.
    pub fn header(&self) -> Header {
        let (frame_type, ext, seqno) = match self {
            Frame::Sync(f) => (SYNC, f.ext, f.seqno),
            Frame::Move(f) => (SYNC, MOVE_EXT, f.seqno),
            Frame::Ack(f) => (ACK, f.ext, f.seqno),
            Frame::Ioctl(f) => (IOCTL, f.ext, f.seqno),
            Frame::Image(f) => (IMAGE, f.ext, f.seqno),
            Frame::Opaque(f) => (f.frame_type, f.ext, f.seqno),
        };
        Header {
            frame_type,
            ext,
            seqno,
            size: self.wire_size().min(MAX_FRAME_SIZE) as u16,
        }
    }

    /// Total encoded length, header included.
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE
            + match self {
                Frame::Sync(_) => SYNC_BODY,
                Frame::Move(_) => MOVE_BODY,
                Frame::Ack(_) => ACK_BODY,
                Frame::Ioctl(f) => f.body_len(),
                Frame::Image(f) => IMAGE_PREFIX + f.jpeg.len(),
                Frame::Opaque(f) => f.body.len(),
            }
    }

    pub fn seqno(&self) -> u8 {
        self.header().seqno
    }

    /// Encode into a freshly allocated buffer.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(self.wire_size());
        encode_frame(self, &mut dst)?;
        Ok(dst.freeze())
    }
}

impl From<IoctlFrame> for Frame {
    fn from(frame: IoctlFrame) -> Self {
        Frame::Ioctl(frame)
    }
}

/// Append the wire encoding of `frame` to `dst`.
///
/// The header's size field is derived from the variant; callers never supply it.
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    let size = frame.wire_size();
    if size > MAX_FRAME_SIZE {
        return Err(FrameError::FrameTooLarge { size });
    }

    dst.reserve(size);
    frame.header().put(dst);

    match frame {
        Frame::Sync(f) => {
            dst.put_u32_le(f.seconds);
            dst.put_u32_le(f.nanoseconds);
        }
        Frame::Move(f) => {
            dst.put_slice(&[MOVE_MARKER, 0, 0, 0]);
            dst.put_u8(f.active as u8);
            dst.put_i8(f.speed);
            dst.put_i8(f.turn);
        }
        Frame::Ack(f) => dst.put_u8(f.acked),
        Frame::Ioctl(f) => f.put_body(dst),
        Frame::Image(f) => {
            dst.put_u16_le(f.frame_number);
            dst.put_u16_le(0);
            dst.put_u8(0);
            dst.put_slice(&f.jpeg);
        }
        Frame::Opaque(f) => dst.put_slice(&f.body),
    }
    Ok(())
}

/// Decode the frame at the start of `src`.
///
/// Exactly `header.size` bytes are consumed; anything after them is ignored.
/// Unknown frame types decode to [`Frame::Opaque`] and unknown ioctl codes to
/// a raw ioctl payload rather than failing.
pub fn decode_frame(src: &[u8]) -> Result<Frame> {
    let header = Header::decode(src)?;
    let body = &src[HEADER_SIZE..header.size as usize];

    let frame = match header.frame_type {
        SYNC if header.ext == MOVE_EXT => {
            require(body, MOVE_BODY, "move")?;
            if body[0] != MOVE_MARKER {
                return Err(FrameError::InvalidMoveMarker(body[0]));
            }
            Frame::Move(MoveFrame {
                seqno: header.seqno,
                active: body[4] != 0,
                speed: body[5] as i8,
                turn: body[6] as i8,
            })
        }
        SYNC => {
            require(body, SYNC_BODY, "sync")?;
            let nanoseconds = u32::from_le_bytes([body[4], body[5], body[6], body[7]]);
            if nanoseconds >= NANOS_PER_SEC {
                return Err(FrameError::InvalidNanoseconds(nanoseconds));
            }
            Frame::Sync(SyncFrame {
                ext: header.ext,
                seqno: header.seqno,
                seconds: u32::from_le_bytes([body[0], body[1], body[2], body[3]]),
                nanoseconds,
            })
        }
        ACK => {
            require(body, ACK_BODY, "ack")?;
            Frame::Ack(AckFrame {
                ext: header.ext,
                seqno: header.seqno,
                acked: body[0],
            })
        }
        IOCTL => Frame::Ioctl(IoctlFrame::decode_body(header, body)?),
        IMAGE => {
            require(body, IMAGE_PREFIX, "image")?;
            Frame::Image(ImageFrame {
                ext: header.ext,
                seqno: header.seqno,
                frame_number: u16::from_le_bytes([body[0], body[1]]),
                jpeg: Bytes::copy_from_slice(&body[IMAGE_PREFIX..]),
            })
        }
        other => Frame::Opaque(OpaqueFrame {
            frame_type: other,
            ext: header.ext,
            seqno: header.seqno,
            body: Bytes::copy_from_slice(body),
        }),
    };

    Ok(frame)
}

pub(crate) fn require(body: &[u8], needed: usize, kind: &'static str) -> Result<()> {
    if body.len() < needed {
        return Err(FrameError::ShortPayload {
            kind,
            needed,
            available: body.len(),
        });
    }
    Ok(())
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = self.header();
        write!(
            f,
            "{:<5} ext={:<3} seq={:<3} size={:<5} ",
            kind::type_name(head.frame_type),
            head.ext,
            head.seqno,
            self.wire_size()
        )?;
        match self {
            Frame::Sync(s) => write!(
                f,
                "{} {}.{:09}s",
                if s.is_echo() { "RECV" } else { "SEND" },
                s.seconds,
                s.nanoseconds
            ),
            Frame::Move(m) => write!(
                f,
                "move speed={} turn={} active={}",
                m.speed, m.turn, m.active as u8
            ),
            Frame::Ack(a) => write!(f, "ack for seqno {}", a.acked),
            Frame::Ioctl(io) => write!(f, "{io}"),
            Frame::Image(i) => write!(f, "jpeg frame={} ({} bytes)", i.frame_number, i.jpeg.len()),
            Frame::Opaque(o) => write!(f, "unhandled type {} ({} bytes)", o.frame_type, o.body.len()),
        }
    }
}
