use std::collections::HashSet;
use std::fmt;

use crate::config::AppConfig;
use crate::error::{GatewayError, Result};
use crate::status::StatusFlags;

/// One monitored endpoint on the bus.
#[derive(Debug, Clone)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub address: u8,
    /// Alarm threshold enforced by the endpoint itself; informational here.
    pub timeout_minutes: u32,
    pub alert_recipient: String,
    last_status: Option<StatusFlags>,
}

impl Device {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        address: u8,
        timeout_minutes: u32,
        alert_recipient: impl Into<String>,
    ) -> Self {
        Device {
            id: id.into(),
            name: name.into(),
            address,
            timeout_minutes,
            alert_recipient: alert_recipient.into(),
            last_status: None,
        }
    }

    /// Status from the most recent poll; `None` before the first poll or after a failed one.
    pub fn last_status(&self) -> Option<StatusFlags> {
        self.last_status
    }

    // Only the poll cycle writes this.
    pub(crate) fn record_status(&mut self, status: Option<StatusFlags>) {
        self.last_status = status;
    }

    pub fn is_tag_present(&self) -> bool {
        self.last_status.is_some_and(StatusFlags::tag_present)
    }

    pub fn is_timer_running(&self) -> bool {
        self.last_status.is_some_and(StatusFlags::timer_running)
    }

    pub fn is_alarm_active(&self) -> bool {
        self.last_status.is_some_and(StatusFlags::alarm_active)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (name={}, addr=0x{:02X}, timeout={}min, alert={})",
            self.id, self.name, self.address, self.timeout_minutes, self.alert_recipient
        )
    }
}

/// Devices in configuration order. Ids and addresses are unique.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<Device>,
}

impl DeviceRegistry {
    pub fn new(devices: Vec<Device>) -> Result<Self> {
        let mut ids = HashSet::new();
        let mut addresses = HashSet::new();
        for device in &devices {
            if !ids.insert(device.id.as_str()) {
                return Err(GatewayError::Config(format!(
                    "duplicate device id '{}'",
                    device.id
                )));
            }
            if !addresses.insert(device.address) {
                return Err(GatewayError::Config(format!(
                    "duplicate device address 0x{:02X} ({})",
                    device.address, device.id
                )));
            }
        }
        Ok(DeviceRegistry { devices })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let devices = config
            .devices
            .iter()
            .map(|d| {
                Device::new(
                    d.id.clone(),
                    d.name.clone(),
                    d.address,
                    d.timeout_minutes,
                    config.alerts.email.clone(),
                )
            })
            .collect();
        Self::new(devices)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Device> {
        self.devices.iter_mut()
    }
}
