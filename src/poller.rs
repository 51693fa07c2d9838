use std::collections::HashSet;

use log::{info, warn};

use crate::bus::BusTransport;
use crate::device::DeviceRegistry;
use crate::error::GatewayError;
use crate::messages::{Event, EventType};

#[derive(Debug, Default)]
pub struct PollOutcome {
    pub polled: usize,
    pub failed: usize,
    /// `DEVICE_UNREACHABLE` events, one per device that just stopped answering.
    pub events: Vec<Event>,
    pub interrupted: bool,
}

/// One status read per device, in registry order.
#[derive(Debug, Default)]
pub struct Poller {
    unreachable: HashSet<String>,
}

impl Poller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_unreachable(&self, device_id: &str) -> bool {
        self.unreachable.contains(device_id)
    }

    /// Run a full cycle. `cancelled` is checked before each device.
    pub fn poll_all<B, F>(
        &mut self,
        registry: &mut DeviceRegistry,
        bus: &mut B,
        cancelled: F,
    ) -> PollOutcome
    where
        B: BusTransport + ?Sized,
        F: Fn() -> bool,
    {
        let mut outcome = PollOutcome::default();

        for device in registry.iter_mut() {
            if cancelled() {
                outcome.interrupted = true;
                break;
            }

            outcome.polled += 1;
            match bus.read_status(device.address) {
                Ok(status) => {
                    device.record_status(Some(status));
                    if self.unreachable.remove(&device.id) {
                        info!("{} answering again on 0x{:02X}", device.id, device.address);
                    }
                }
                Err(source) => {
                    device.record_status(None);
                    outcome.failed += 1;
                    let err = GatewayError::Bus {
                        address: device.address,
                        source,
                    };
                    warn!("Error while reading {}: {}", device.id, err);
                    if self.unreachable.insert(device.id.clone()) {
                        let message = format!(
                            "{} ({})",
                            EventType::DeviceUnreachable.default_message(),
                            err
                        );
                        outcome.events.push(Event::with_message(
                            device,
                            EventType::DeviceUnreachable,
                            message,
                        ));
                    }
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::{HashMap, VecDeque};

    use super::*;
    use crate::device::Device;
    use crate::error::BusError;
    use crate::status::{Command, StatusFlags};

    /// Scripted bus: each address answers from its own queue; an empty queue or `None` is a failure.
    #[derive(Default)]
    pub(crate) struct FakeBus {
        pub replies: HashMap<u8, VecDeque<Option<u8>>>,
        pub reads: Vec<u8>,
        pub commands: Vec<(u8, Command)>,
        pub closed: bool,
    }

    impl FakeBus {
        pub fn script(mut self, address: u8, replies: &[Option<u8>]) -> Self {
            self.replies
                .entry(address)
                .or_default()
                .extend(replies.iter().copied());
            self
        }
    }

    impl BusTransport for FakeBus {
        fn read_status(&mut self, address: u8) -> Result<StatusFlags, BusError> {
            self.reads.push(address);
            match self.replies.get_mut(&address).and_then(|q| q.pop_front()) {
                Some(Some(bits)) => Ok(StatusFlags::from_bits(bits)),
                _ => Err(BusError::Nack),
            }
        }

        fn write_command(&mut self, address: u8, command: Command) -> Result<(), BusError> {
            self.commands.push((address, command));
            Ok(())
        }

        fn read_tag_id(&mut self, _address: u8) -> Result<String, BusError> {
            Ok("OSC-01".to_string())
        }

        fn read_timer_left(&mut self, _address: u8) -> Result<u16, BusError> {
            Ok(600)
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }

    fn registry() -> DeviceRegistry {
        DeviceRegistry::new(vec![
            Device::new("A", "Analyzer", 0x10, 30, ""),
            Device::new("B", "Bench", 0x11, 30, ""),
            Device::new("C", "Camera", 0x12, 30, ""),
        ])
        .unwrap()
    }

    #[test]
    fn test_one_read_per_device_in_order() {
        let mut registry = registry();
        let mut bus = FakeBus::default()
            .script(0x10, &[Some(0b001)])
            .script(0x11, &[Some(0b000)])
            .script(0x12, &[Some(0b100)]);
        let mut poller = Poller::new();

        let outcome = poller.poll_all(&mut registry, &mut bus, || false);

        assert_eq!(bus.reads, vec![0x10, 0x11, 0x12]);
        assert!(bus.commands.is_empty());
        assert_eq!(outcome.polled, 3);
        assert_eq!(outcome.failed, 0);
        assert!(outcome.events.is_empty());
        assert_eq!(
            registry.get("C").and_then(|d| d.last_status()),
            Some(StatusFlags::from_bits(0b100))
        );
    }

    #[test]
    fn test_failure_sets_absent_and_continues() {
        let mut registry = registry();
        let mut bus = FakeBus::default()
            .script(0x10, &[Some(0b001)])
            .script(0x11, &[None])
            .script(0x12, &[Some(0b001)]);
        let mut poller = Poller::new();

        let outcome = poller.poll_all(&mut registry, &mut bus, || false);

        assert_eq!(bus.reads.len(), 3);
        assert_eq!(outcome.failed, 1);
        assert_eq!(registry.get("B").and_then(|d| d.last_status()), None);
        assert!(registry.get("C").and_then(|d| d.last_status()).is_some());
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].event_type, EventType::DeviceUnreachable);
        assert_eq!(outcome.events[0].device_id, "B");
    }

    #[test]
    fn test_unreachable_reported_once_until_recovery() {
        let mut registry =
            DeviceRegistry::new(vec![Device::new("A", "Analyzer", 0x10, 30, "")]).unwrap();
        let mut bus = FakeBus::default().script(0x10, &[None, None, Some(0), None]);
        let mut poller = Poller::new();

        assert_eq!(poller.poll_all(&mut registry, &mut bus, || false).events.len(), 1);
        assert_eq!(poller.poll_all(&mut registry, &mut bus, || false).events.len(), 0);
        assert!(poller.is_unreachable("A"));
        assert_eq!(poller.poll_all(&mut registry, &mut bus, || false).events.len(), 0);
        assert!(!poller.is_unreachable("A"));
        assert_eq!(poller.poll_all(&mut registry, &mut bus, || false).events.len(), 1);
    }

    #[test]
    fn test_cancel_between_devices() {
        let mut registry = registry();
        let mut bus = FakeBus::default()
            .script(0x10, &[Some(0)])
            .script(0x11, &[Some(0)])
            .script(0x12, &[Some(0)]);
        let mut poller = Poller::new();
        let calls = std::cell::Cell::new(0);

        let outcome = poller.poll_all(&mut registry, &mut bus, || {
            calls.set(calls.get() + 1);
            calls.get() > 1
        });

        assert!(outcome.interrupted);
        assert_eq!(bus.reads, vec![0x10]);
    }
}
