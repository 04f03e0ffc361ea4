//! The maneuver catalogue.

use std::fmt;

use crate::ioctl::{codes, IoctlFrame, IoctlPayload, MANEUVER_FLAGS, QUICK_TURN_FLAGS};

/// Kind of jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Jump {
    Long = 0,
    High = 1,
}

/// Scripted tricks, with the values the device expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Special {
    QuickTurnRight = 1,
    Tap = 2,
    LookLeftAndRight = 3,
    QuickTurnRightLeft = 4,
    Swing = 5,
    TurnAndJump = 6,
    TurnToBalance = 7,
    GrowingCircles = 8,
    Slalom = 9,
}

impl Special {
    pub const ALL: [Special; 9] = [
        Special::QuickTurnRight,
        Special::LookLeftAndRight,
        Special::Tap,
        Special::Swing,
        Special::QuickTurnRightLeft,
        Special::TurnAndJump,
        Special::TurnToBalance,
        Special::Slalom,
        Special::GrowingCircles,
    ];
}

/// Posture changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Flip {
    /// Stand on the wheel axis (handstand).
    Balance = 0,
    UpsideDown = 1,
    DownsideUp = 2,
}

/// The two flags switched on at the end of session initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnableFlag {
    A,
    B,
}

impl EnableFlag {
    pub fn to_ioctl(self, seqno: u8) -> IoctlFrame {
        let code = match self {
            EnableFlag::A => codes::ENABLE_A,
            EnableFlag::B => codes::ENABLE_B,
        };
        IoctlFrame::new(seqno, code, 0, IoctlPayload::U8(1))
    }
}

/// A discrete command acknowledged by the device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Maneuver {
    /// Turn on the spot by the given angle in radians, within [-π, π].
    QuickTurn(f32),
    Jump(Jump),
    Special(Special),
    Flip(Flip),
}

impl Maneuver {
    /// Build the ioctl carrying this maneuver.
    pub fn to_ioctl(self, seqno: u8) -> IoctlFrame {
        match self {
            Maneuver::QuickTurn(angle) => IoctlFrame::new(
                seqno,
                codes::QUICK_TURN,
                QUICK_TURN_FLAGS,
                IoctlPayload::F32(angle),
            ),
            Maneuver::Jump(kind) => IoctlFrame::new(
                seqno,
                codes::JUMP,
                MANEUVER_FLAGS,
                IoctlPayload::U32(kind as u32),
            ),
            Maneuver::Special(kind) => IoctlFrame::new(
                seqno,
                codes::SPECIAL,
                MANEUVER_FLAGS,
                IoctlPayload::U32(kind as u32),
            ),
            Maneuver::Flip(kind) => IoctlFrame::new(
                seqno,
                codes::FLIP,
                MANEUVER_FLAGS,
                IoctlPayload::U32(kind as u32),
            ),
        }
    }
}

impl fmt::Display for Maneuver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Maneuver::QuickTurn(angle) => write!(f, "quick turn {angle:.4} rad"),
            Maneuver::Jump(kind) => write!(f, "{kind:?} jump"),
            Maneuver::Special(kind) => write!(f, "special {kind:?}"),
            Maneuver::Flip(kind) => write!(f, "flip {kind:?}"),
        }
    }
}
