use std::fmt;

use chrono::{DateTime, Local};
use serde_derive::Serialize;

use crate::device::Device;

pub const SYSTEM_DEVICE_ID: &str = "GATEWAY";
pub const SYSTEM_DEVICE_NAME: &str = "Gateway";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    ObjectReturned,
    ObjectRemoved,
    AlarmStarted,
    AlarmStopped,
    /// Poll failure, kept apart from state transitions.
    DeviceUnreachable,
    System,
}

impl EventType {
    pub const fn as_str(self) -> &'static str {
        match self {
            EventType::ObjectReturned => "OBJECT_RETURNED",
            EventType::ObjectRemoved => "OBJECT_REMOVED",
            EventType::AlarmStarted => "ALARM_STARTED",
            EventType::AlarmStopped => "ALARM_STOPPED",
            EventType::DeviceUnreachable => "DEVICE_UNREACHABLE",
            EventType::System => "SYSTEM",
        }
    }

    pub const fn default_message(self) -> &'static str {
        match self {
            EventType::ObjectReturned => "Object returned to its place",
            EventType::ObjectRemoved => "Object removed from its place",
            EventType::AlarmStarted => "Alarm started",
            EventType::AlarmStopped => "Alarm stopped",
            EventType::DeviceUnreachable => "Device did not answer on the bus",
            EventType::System => "",
        }
    }

    pub const fn is_alarm(self) -> bool {
        matches!(self, EventType::AlarmStarted | EventType::AlarmStopped)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Event {
    pub timestamp: DateTime<Local>,
    pub event_type: EventType,
    pub device_id: String,
    pub device_name: String,
    pub message: String,
}

impl Event {
    pub fn for_device(device: &Device, event_type: EventType) -> Self {
        Self::with_message(device, event_type, event_type.default_message())
    }

    pub fn with_message(device: &Device, event_type: EventType, message: impl Into<String>) -> Self {
        Event {
            timestamp: Local::now(),
            event_type,
            device_id: device.id.clone(),
            device_name: device.name.clone(),
            message: message.into(),
        }
    }

    pub fn system(message: impl Into<String>) -> Self {
        Event {
            timestamp: Local::now(),
            event_type: EventType::System,
            device_id: SYSTEM_DEVICE_ID.to_string(),
            device_name: SYSTEM_DEVICE_NAME.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} - {}",
            self.timestamp.to_rfc3339(),
            self.event_type,
            self.device_name,
            self.message
        )
    }
}
