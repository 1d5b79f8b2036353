//! Scheduler configuration.

use std::time::Duration;

use crate::geo::DEFAULT_WALKING_SPEED_MPS;

/// Default interval between ALL-mode cycles.
pub const DEFAULT_ALL_INTERVAL: Duration = Duration::from_millis(5000);

/// Default interval between SINGLE-mode cycles.
pub const DEFAULT_SINGLE_INTERVAL: Duration = Duration::from_millis(3000);

/// Shortest accepted interval; shorter requests are raised to this.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for [`PollingScheduler`](super::PollingScheduler).
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Walking speed used for ETA annotation.
    pub walking_speed_mps: f64,

    /// How long a vehicle missing from ALL-mode payloads is kept.
    ///
    /// `None` keeps it until the registry is cleared.
    pub retain_missing_for: Option<Duration>,

    /// Interval callers use for ALL-mode sessions.
    pub all_interval: Duration,

    /// Interval callers use for SINGLE-mode sessions.
    pub single_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            walking_speed_mps: DEFAULT_WALKING_SPEED_MPS,
            retain_missing_for: None,
            all_interval: DEFAULT_ALL_INTERVAL,
            single_interval: DEFAULT_SINGLE_INTERVAL,
        }
    }
}

impl SchedulerConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the walking speed.
    pub fn with_walking_speed(mut self, mps: f64) -> Self {
        self.walking_speed_mps = mps;
        self
    }

    /// Set the retention window for vehicles missing from ALL payloads.
    pub fn with_retain_missing_for(mut self, window: Option<Duration>) -> Self {
        self.retain_missing_for = window;
        self
    }

    /// Set the ALL-mode interval.
    pub fn with_all_interval(mut self, interval: Duration) -> Self {
        self.all_interval = interval;
        self
    }

    /// Set the SINGLE-mode interval.
    pub fn with_single_interval(mut self, interval: Duration) -> Self {
        self.single_interval = interval;
        self
    }
}

/// Raise `interval` to [`MIN_POLL_INTERVAL`] if shorter.
pub(crate) fn effective_interval(interval: Duration) -> Duration {
    if interval < MIN_POLL_INTERVAL {
        tracing::warn!(
            requested_ms = interval.as_millis() as u64,
            minimum_ms = MIN_POLL_INTERVAL.as_millis() as u64,
            "Poll interval too short, using minimum"
        );
        MIN_POLL_INTERVAL
    } else {
        interval
    }
}
