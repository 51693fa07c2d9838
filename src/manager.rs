use std::time::Duration;

use log::{debug, info};
use tokio::sync::watch;

use crate::bus::BusTransport;
use crate::detector::TransitionDetector;
use crate::device::DeviceRegistry;
use crate::messages::Event;
use crate::notifier::NotificationRouter;
use crate::poller::Poller;
use crate::sink::SinkSet;

/// Counters for one pass over the registry.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub polled: usize,
    pub failed: usize,
    pub events: usize,
    pub notified: usize,
    pub interrupted: bool,
}

/// Owns the registry, the bus handle and the previous-state table; nothing else touches them.
pub struct Gateway<B: BusTransport> {
    registry: DeviceRegistry,
    bus: B,
    poller: Poller,
    detector: TransitionDetector,
    sinks: SinkSet,
    router: NotificationRouter,
    poll_interval: Duration,
}

impl<B: BusTransport> Gateway<B> {
    pub fn new(
        registry: DeviceRegistry,
        bus: B,
        sinks: SinkSet,
        router: NotificationRouter,
        poll_interval: Duration,
    ) -> Self {
        Gateway {
            registry,
            bus,
            poller: Poller::new(),
            detector: TransitionDetector::new(),
            sinks,
            router,
            poll_interval,
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    #[cfg(test)]
    pub fn detector(&self) -> &TransitionDetector {
        &self.detector
    }

    #[cfg(test)]
    pub fn bus(&self) -> &B {
        &self.bus
    }

    async fn dispatch(&mut self, event: &Event) -> bool {
        self.sinks.record_all(event);
        let results = self.router.route(event).await;
        results.values().any(|delivered| *delivered)
    }

    /// Poll every device, detect transitions, then record and notify.
    pub async fn run_cycle(&mut self, shutdown: &watch::Receiver<bool>) -> CycleReport {
        let outcome = self
            .poller
            .poll_all(&mut self.registry, &mut self.bus, || *shutdown.borrow());

        let mut report = CycleReport {
            polled: outcome.polled,
            failed: outcome.failed,
            interrupted: outcome.interrupted,
            ..Default::default()
        };

        // Keep device order: each device's failure report, then its transitions.
        let mut unreachable = outcome.events;
        let mut events = Vec::with_capacity(unreachable.len());
        for device in self.registry.iter() {
            let (mine, rest): (Vec<Event>, Vec<Event>) = unreachable
                .into_iter()
                .partition(|event| event.device_id == device.id);
            unreachable = rest;
            events.extend(mine);
            if !outcome.interrupted {
                events.extend(self.detector.observe(device));
            }
        }

        for event in &events {
            if self.dispatch(event).await {
                report.notified += 1;
            }
        }
        report.events = events.len();

        self.sinks.flush_all();
        report
    }

    /// Loop until `shutdown` flips to `true`, then flush the sinks and release the bus.
    pub async fn run_loop(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Gateway running with {} device(s), polling every {:?}",
            self.registry.len(),
            self.poll_interval
        );
        self.dispatch(&Event::system("Gateway running")).await;

        while !*shutdown.borrow() {
            let report = self.run_cycle(&shutdown).await;
            debug!("Cycle finished: {:?}", report);
            if report.interrupted {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                Ok(()) = shutdown.changed() => {}
            }
        }

        self.shutdown().await;
    }

    async fn shutdown(&mut self) {
        info!("Gateway stopping");
        self.dispatch(&Event::system("Gateway stopping")).await;
        self.sinks.flush_all();
        self.bus.close();
    }
}
