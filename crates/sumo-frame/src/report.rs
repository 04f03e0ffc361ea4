//! Reports the device sends as ioctls.

use crate::ioctl::{codes, IoctlFrame, IoctlPayload};

/// Software and hardware version strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Versions {
    pub software: String,
    pub hardware: String,
}

/// The meaning of an inbound ioctl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceReport {
    /// Battery level in percent.
    Battery(u8),
    DateConfirmed(String),
    TimeConfirmed(String),
    /// Last report in answer to a request-info ioctl.
    InfoComplete,
    Name(String),
    Versions(Versions),
    ProductId(String),
    Serial(String),
    Language(String),
    /// Anything else; acknowledged but otherwise ignored.
    Unknown { subtype: u8, func: u8 },
}

impl DeviceReport {
    /// Interpret an inbound ioctl.
    pub fn from_ioctl(frame: &IoctlFrame) -> Self {
        match (frame.code(), &frame.payload) {
            (codes::BATTERY, IoctlPayload::U8(level)) => DeviceReport::Battery(*level),
            (codes::DATE_CONFIRM, IoctlPayload::Text(s)) => DeviceReport::DateConfirmed(s.clone()),
            (codes::TIME_CONFIRM, IoctlPayload::Text(s)) => DeviceReport::TimeConfirmed(s.clone()),
            (codes::INFO_COMPLETE, _) => DeviceReport::InfoComplete,
            (codes::NAME, IoctlPayload::Text(s)) => DeviceReport::Name(s.clone()),
            (codes::VERSIONS, IoctlPayload::TextPair(software, hardware)) => {
                DeviceReport::Versions(Versions {
                    software: software.clone(),
                    hardware: hardware.clone(),
                })
            }
            (codes::PRODUCT_ID, IoctlPayload::Text(s)) => DeviceReport::ProductId(s.clone()),
            (codes::SERIAL, IoctlPayload::Text(s)) => DeviceReport::Serial(s.clone()),
            (codes::LANGUAGE, IoctlPayload::Text(s)) => DeviceReport::Language(s.clone()),
            ((subtype, func), _) => DeviceReport::Unknown { subtype, func },
        }
    }
}
