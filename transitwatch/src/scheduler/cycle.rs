//! A single poll cycle: fetch, reconcile, apply, notify.
//!
//! Every cycle is tagged with the [`SessionId`] that spawned it. The id is
//! compared against the scheduler's current session after the fetch and
//! again under the registry write lock, so a cycle whose session was
//! superseded while it was in flight never touches the registry.
//!
//! Notifications are delivered under a gate that session changes also take,
//! so once `start_*` or `stop` returns the observer hears nothing more from
//! older sessions. Observers must therefore not start or stop sessions from
//! inside a callback.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::error::{CycleErrorKind, SyncError};
use crate::location::UserPositionProvider;
use crate::metrics::SyncMetrics;
use crate::observer::SyncObserver;
use crate::reconcile::{Reconciliation, ReconciliationEngine};
use crate::registry::SharedVehicleRegistry;
use crate::source::VehicleSource;

use super::session::{PollMode, SessionId};

/// Raw id stored in [`CycleRunner::current`] when no session is active.
pub(crate) const NO_SESSION: u64 = 0;

/// State shared by the scheduler and all of its cycle tasks.
pub(crate) struct CycleRunner {
    pub(crate) source: Arc<dyn VehicleSource>,
    pub(crate) registry: SharedVehicleRegistry,
    pub(crate) user_position: Arc<dyn UserPositionProvider>,
    pub(crate) observer: Arc<dyn SyncObserver>,
    pub(crate) engine: ReconciliationEngine,
    pub(crate) metrics: Arc<SyncMetrics>,
    /// Raw id of the active session, [`NO_SESSION`] when stopped.
    current: AtomicU64,
    /// Held while notifying and while `current` changes.
    notify_gate: Mutex<()>,
}

impl CycleRunner {
    pub(crate) fn new(
        source: Arc<dyn VehicleSource>,
        registry: SharedVehicleRegistry,
        user_position: Arc<dyn UserPositionProvider>,
        observer: Arc<dyn SyncObserver>,
        engine: ReconciliationEngine,
        metrics: Arc<SyncMetrics>,
    ) -> Self {
        Self {
            source,
            registry,
            user_position,
            observer,
            engine,
            metrics,
            current: AtomicU64::new(NO_SESSION),
            notify_gate: Mutex::new(()),
        }
    }

    /// Make `raw` the current session id.
    ///
    /// Waits for any notification in progress, so no older session is
    /// heard from after this returns.
    pub(crate) fn set_current(&self, raw: u64) {
        let _gate = self.notify_gate.lock();
        self.current.store(raw, Ordering::SeqCst);
    }

    /// Run one cycle for `session` and report its outcome.
    ///
    /// Never fails: every error is logged, counted, and (unless it is a
    /// superseded-session signal) passed to the observer.
    pub(crate) async fn run(&self, session: SessionId, mode: &PollMode) {
        self.metrics.cycle_started();

        let result = match mode {
            PollMode::All => self.run_all(session).await,
            PollMode::Single(vehicle_id) => self.run_single(session, vehicle_id).await,
        };

        match result {
            Ok(()) => {}
            Err(SyncError::SessionSuperseded { session }) => {
                self.metrics.stale_result_dropped();
                debug!(session = %session, "Discarded results from superseded session");
            }
            Err(e @ SyncError::PendingLocation { .. }) => {
                self.metrics.cycle_pending();
                debug!(session = %session, error = %e, "Followed vehicle has no location yet");
                self.report(session, &e);
            }
            Err(e) => {
                if matches!(e, SyncError::InvalidData { .. }) {
                    self.metrics.invalid_entries(1);
                }
                self.metrics.cycle_failed();
                warn!(session = %session, mode = %mode, error = %e, "Poll cycle failed");
                self.report(session, &e);
            }
        }
    }

    /// Returns true if `session` is still the active session.
    pub(crate) fn is_current(&self, session: SessionId) -> bool {
        self.current.load(Ordering::SeqCst) == session.get()
    }

    async fn run_all(&self, session: SessionId) -> Result<(), SyncError> {
        let payload = self.source.fetch_all().await?;
        self.ensure_current(session)?;

        let user = self.user_position.user_position();
        let prior = self.registry.list_all();
        let reconciliation = self
            .engine
            .reconcile_all(&payload, &prior, user, Utc::now());

        self.apply(session, &reconciliation)?;

        if reconciliation.invalid_count > 0 {
            self.metrics.invalid_entries(reconciliation.invalid_count);
            let detail = format!(
                "{} of {} vehicle entries skipped",
                reconciliation.invalid_count,
                payload.len()
            );
            self.notify(session, |observer| {
                observer.on_cycle_error(CycleErrorKind::InvalidData, &detail)
            });
        }
        Ok(())
    }

    async fn run_single(&self, session: SessionId, vehicle_id: &str) -> Result<(), SyncError> {
        let raw = self.source.fetch_vehicle(vehicle_id).await?;
        self.ensure_current(session)?;

        let user = self.user_position.user_position();
        let reconciliation = self
            .engine
            .reconcile_single(vehicle_id, &raw, user, Utc::now())?;

        self.apply(session, &reconciliation)
    }

    /// Apply `reconciliation` if `session` is still current, then notify.
    fn apply(&self, session: SessionId, reconciliation: &Reconciliation) -> Result<(), SyncError> {
        let (changed, vehicles) = {
            let mut registry = self.registry.write();
            self.ensure_current(session)?;
            let changed = registry.apply(reconciliation);
            (changed, registry.list_all())
        };

        self.metrics
            .cycle_applied(reconciliation.upserts.len(), reconciliation.removals.len());
        trace!(
            session = %session,
            upserted = reconciliation.upserts.len(),
            removed = reconciliation.removals.len(),
            changed,
            tracked = vehicles.len(),
            "Cycle applied"
        );

        self.notify(session, |observer| observer.on_vehicles_changed(&vehicles));
        Ok(())
    }

    /// Call the observer unless `session` has been superseded.
    fn notify(&self, session: SessionId, deliver: impl FnOnce(&dyn SyncObserver)) {
        let _gate = self.notify_gate.lock();
        if self.is_current(session) {
            deliver(self.observer.as_ref());
        } else {
            debug!(session = %session, "Dropped notification from superseded session");
        }
    }

    fn ensure_current(&self, session: SessionId) -> Result<(), SyncError> {
        if self.is_current(session) {
            Ok(())
        } else {
            Err(SyncError::SessionSuperseded { session })
        }
    }

    fn report(&self, session: SessionId, error: &SyncError) {
        if let Some(kind) = error.kind() {
            let detail = error.to_string();
            self.notify(session, |observer| observer.on_cycle_error(kind, &detail));
        }
    }
}
