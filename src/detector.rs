use std::collections::HashMap;

use log::debug;

use crate::device::{Device, DeviceRegistry};
use crate::messages::{Event, EventType};
use crate::status::StatusFlags;

/// Transition events between two consecutive known readings.
///
/// Tag presence is checked before the alarm flag. The timer flag never
/// produces an event on its own.
pub fn transitions(
    previous: StatusFlags,
    current: StatusFlags,
) -> impl Iterator<Item = EventType> {
    let checks = [
        (
            previous.tag_present(),
            current.tag_present(),
            EventType::ObjectReturned,
            EventType::ObjectRemoved,
        ),
        (
            previous.alarm_active(),
            current.alarm_active(),
            EventType::AlarmStarted,
            EventType::AlarmStopped,
        ),
    ];
    checks
        .into_iter()
        .filter_map(|(before, after, rising, falling)| match (before, after) {
            (false, true) => Some(rising),
            (true, false) => Some(falling),
            _ => None,
        })
}

/// Compares each device's latest reading against the last known-good one.
#[derive(Debug, Default)]
pub struct TransitionDetector {
    previous: HashMap<String, StatusFlags>,
}

impl TransitionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous(&self, device_id: &str) -> Option<StatusFlags> {
        self.previous.get(device_id).copied()
    }

    /// Evaluate one device. A failed read (`None`) is skipped and leaves the stored baseline alone.
    pub fn observe(&mut self, device: &Device) -> Vec<Event> {
        let Some(current) = device.last_status() else {
            return Vec::new();
        };

        let Some(previous) = self.previous.insert(device.id.clone(), current) else {
            debug!("Baseline for {}: {}", device.id, current);
            return Vec::new();
        };

        if previous == current {
            return Vec::new();
        }

        debug!("{}: {} -> {}", device.id, previous, current);
        transitions(previous, current)
            .map(|event_type| Event::for_device(device, event_type))
            .collect()
    }

    /// Evaluate every device in registry order.
    pub fn check(&mut self, registry: &DeviceRegistry) -> Vec<Event> {
        registry
            .iter()
            .flat_map(|device| self.observe(device))
            .collect()
    }
}
