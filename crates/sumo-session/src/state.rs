use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use sumo_frame::DeviceReport;

use crate::confirm::Confirmation;

/// What the device told us about itself in answer to a request-info ioctl.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceIdentity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub software_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hardware_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Device-reported state, written by the inbound processor and read by the
/// session.
#[derive(Debug, Default)]
pub struct DeviceState {
    pub date: Confirmation<String>,
    pub time: Confirmation<String>,
    pub info_complete: Confirmation<()>,
    battery: AtomicU8,
    identity: Mutex<DeviceIdentity>,
}

impl DeviceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last reported battery level in percent, 0 before the first report.
    pub fn battery_level(&self) -> u8 {
        self.battery.load(Ordering::Relaxed)
    }

    pub fn identity(&self) -> DeviceIdentity {
        self.identity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Record `report`. Returns `false` if it carried nothing we track.
    pub fn apply(&self, report: &DeviceReport) -> bool {
        match report {
            DeviceReport::Battery(level) => self.battery.store(*level, Ordering::Relaxed),
            DeviceReport::DateConfirmed(date) => {
                self.date.resolve(date.clone());
            }
            DeviceReport::TimeConfirmed(time) => {
                self.time.resolve(time.clone());
            }
            DeviceReport::InfoComplete => {
                self.info_complete.resolve(());
            }
            DeviceReport::Name(v) => self.update_identity(|id| id.name = Some(v.clone())),
            DeviceReport::Versions(v) => self.update_identity(|id| {
                id.software_version = Some(v.software.clone());
                id.hardware_version = Some(v.hardware.clone());
            }),
            DeviceReport::ProductId(v) => self.update_identity(|id| id.product_id = Some(v.clone())),
            DeviceReport::Serial(v) => self.update_identity(|id| id.serial = Some(v.clone())),
            DeviceReport::Language(v) => self.update_identity(|id| id.language = Some(v.clone())),
            DeviceReport::Unknown { .. } => return false,
        }
        true
    }

    fn update_identity(&self, update: impl FnOnce(&mut DeviceIdentity)) {
        update(&mut self.identity.lock().unwrap_or_else(PoisonError::into_inner));
    }
}
