//! Notifications for presentation layers.
//!
//! The scheduler reports to a [`SyncObserver`] after every applied cycle and
//! on every non-fatal failure. Presentation code subscribes either by
//! implementing the trait directly or through a [`ChannelObserver`]:
//!
//! ```text
//! PollingScheduler ──► SyncObserver ──► ChannelObserver ──► mpsc ──► UI task
//! ```

use tokio::sync::mpsc;

use crate::error::CycleErrorKind;
use crate::vehicle::TrackedVehicle;

/// Receives registry updates and cycle failures.
///
/// Called from the scheduler's cycle tasks; implementations must not block
/// and must not start or stop sessions.
pub trait SyncObserver: Send + Sync {
    /// The registry changed; `vehicles` is a snapshot in insertion order.
    fn on_vehicles_changed(&self, vehicles: &[TrackedVehicle]);

    /// A cycle failed without ending the session.
    fn on_cycle_error(&self, kind: CycleErrorKind, detail: &str);
}

/// Observer that ignores all notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SyncObserver for NoopObserver {
    fn on_vehicles_changed(&self, _vehicles: &[TrackedVehicle]) {}

    fn on_cycle_error(&self, _kind: CycleErrorKind, _detail: &str) {}
}

/// A notification delivered through a [`ChannelObserver`].
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Snapshot of the registry after a cycle was applied.
    VehiclesChanged(Vec<TrackedVehicle>),
    /// A cycle failed.
    CycleError { kind: CycleErrorKind, detail: String },
}

/// Observer that forwards notifications to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<SyncEvent>,
}

impl ChannelObserver {
    /// Create an observer and the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: SyncEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Sync event receiver dropped");
        }
    }
}

impl SyncObserver for ChannelObserver {
    fn on_vehicles_changed(&self, vehicles: &[TrackedVehicle]) {
        self.send(SyncEvent::VehiclesChanged(vehicles.to_vec()));
    }

    fn on_cycle_error(&self, kind: CycleErrorKind, detail: &str) {
        self.send(SyncEvent::CycleError {
            kind,
            detail: detail.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_observer_forwards_events() {
        let (observer, mut rx) = ChannelObserver::new();

        observer.on_vehicles_changed(&[]);
        observer.on_cycle_error(CycleErrorKind::Network, "HTTP 503");

        assert_eq!(rx.try_recv().unwrap(), SyncEvent::VehiclesChanged(vec![]));
        assert_eq!(
            rx.try_recv().unwrap(),
            SyncEvent::CycleError {
                kind: CycleErrorKind::Network,
                detail: "HTTP 503".to_string()
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_observer_survives_dropped_receiver() {
        let (observer, rx) = ChannelObserver::new();
        drop(rx);

        observer.on_cycle_error(CycleErrorKind::Malformed, "bad json");
    }
}
