//! Poll cycle metrics.
//!
//! Lock-free atomic counters updated by the scheduler's cycle tasks, and a
//! point-in-time [`SyncSnapshot`] for display.
//!
//! ```text
//! cycle tasks ─────► SyncMetrics ─────► SyncSnapshot ─────► CLI / UI
//!                    (atomic counters)  (point-in-time copy)
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing scheduler activity since creation.
#[derive(Debug, Default)]
pub struct SyncMetrics {
    cycles_started: AtomicU64,
    cycles_applied: AtomicU64,
    cycles_failed: AtomicU64,
    cycles_pending: AtomicU64,
    stale_results_dropped: AtomicU64,
    invalid_entries: AtomicU64,
    vehicles_upserted: AtomicU64,
    vehicles_removed: AtomicU64,
}

impl SyncMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// A cycle began fetching.
    pub fn cycle_started(&self) {
        self.cycles_started.fetch_add(1, Ordering::Relaxed);
    }

    /// A cycle's results were applied to the registry.
    pub fn cycle_applied(&self, upserted: usize, removed: usize) {
        self.cycles_applied.fetch_add(1, Ordering::Relaxed);
        self.vehicles_upserted
            .fetch_add(upserted as u64, Ordering::Relaxed);
        self.vehicles_removed
            .fetch_add(removed as u64, Ordering::Relaxed);
    }

    /// A cycle's fetch failed.
    pub fn cycle_failed(&self) {
        self.cycles_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// A followed vehicle had no location yet.
    pub fn cycle_pending(&self) {
        self.cycles_pending.fetch_add(1, Ordering::Relaxed);
    }

    /// Results from a superseded session were discarded.
    pub fn stale_result_dropped(&self) {
        self.stale_results_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Backend entries were skipped as invalid.
    pub fn invalid_entries(&self, count: usize) {
        self.invalid_entries
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of all counters.
    pub fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            cycles_started: self.cycles_started.load(Ordering::Relaxed),
            cycles_applied: self.cycles_applied.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
            cycles_pending: self.cycles_pending.load(Ordering::Relaxed),
            stale_results_dropped: self.stale_results_dropped.load(Ordering::Relaxed),
            invalid_entries: self.invalid_entries.load(Ordering::Relaxed),
            vehicles_upserted: self.vehicles_upserted.load(Ordering::Relaxed),
            vehicles_removed: self.vehicles_removed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SyncMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSnapshot {
    pub cycles_started: u64,
    pub cycles_applied: u64,
    pub cycles_failed: u64,
    pub cycles_pending: u64,
    pub stale_results_dropped: u64,
    pub invalid_entries: u64,
    pub vehicles_upserted: u64,
    pub vehicles_removed: u64,
}

impl SyncSnapshot {
    /// Fraction of started cycles that failed, 0.0 when none started.
    pub fn failure_rate(&self) -> f64 {
        if self.cycles_started == 0 {
            0.0
        } else {
            self.cycles_failed as f64 / self.cycles_started as f64
        }
    }
}

impl std::fmt::Display for SyncSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cycles: {} started, {} applied, {} failed, {} pending, {} stale dropped; \
             vehicles: {} upserted, {} removed, {} invalid skipped",
            self.cycles_started,
            self.cycles_applied,
            self.cycles_failed,
            self.cycles_pending,
            self.stale_results_dropped,
            self.vehicles_upserted,
            self.vehicles_removed,
            self.invalid_entries
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_new_metrics_are_zero() {
        assert_eq!(SyncMetrics::new().snapshot(), SyncSnapshot::default());
    }

    #[test]
    fn test_counters_accumulate() {
        let metrics = SyncMetrics::new();
        metrics.cycle_started();
        metrics.cycle_started();
        metrics.cycle_applied(3, 1);
        metrics.cycle_failed();
        metrics.invalid_entries(2);
        metrics.stale_result_dropped();
        metrics.cycle_pending();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cycles_started, 2);
        assert_eq!(snapshot.cycles_applied, 1);
        assert_eq!(snapshot.cycles_failed, 1);
        assert_eq!(snapshot.cycles_pending, 1);
        assert_eq!(snapshot.vehicles_upserted, 3);
        assert_eq!(snapshot.vehicles_removed, 1);
        assert_eq!(snapshot.invalid_entries, 2);
        assert_eq!(snapshot.stale_results_dropped, 1);
        assert!((snapshot.failure_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_thread_safe_counting() {
        use std::thread;

        let metrics = Arc::new(SyncMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..100 {
                        metrics.cycle_started();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.snapshot().cycles_started, 800);
    }

    #[test]
    fn test_snapshot_display() {
        let text = SyncSnapshot {
            cycles_started: 4,
            cycles_failed: 1,
            ..Default::default()
        }
        .to_string();
        assert!(text.contains("4 started"));
        assert!(text.contains("1 failed"));
    }
}
