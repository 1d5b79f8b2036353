//! Polling scheduler.
//!
//! Drives repeated fetch-reconcile-apply cycles against a [`VehicleSource`]
//! in one of two modes, with at most one session active at a time.
//!
//! # Architecture
//!
//! ```text
//! start_all / start_single
//!        │
//!        ▼
//! ┌──────────────────┐   tick    ┌────────────────┐
//! │  session loop    │──────────►│  cycle task    │── fetch ──► VehicleSource
//! │ (one per session)│  spawn    │ (tagged with   │
//! │                  │           │  SessionId)    │── apply ──► SharedVehicleRegistry
//! └──────────────────┘           └────────────────┘── notify ─► SyncObserver
//!        ▲
//!        │ CancellationToken
//!   stop / next start
//! ```
//!
//! Starting a session cancels the previous one's loop and advances the
//! current session id. Cycles already in flight are allowed to finish, but
//! their results are discarded once their id no longer matches.
//!
//! # Example
//!
//! ```ignore
//! let scheduler = PollingScheduler::builder(source)
//!     .observer(observer)
//!     .build()?;
//!
//! scheduler.start_all(Duration::from_secs(5));
//! // ... later, the user taps a vehicle
//! scheduler.start_single("v42", Duration::from_secs(3));
//! ```

mod config;
mod cycle;
mod session;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::SchedulerError;
use crate::location::{SharedUserPosition, UserPositionProvider};
use crate::metrics::SyncMetrics;
use crate::observer::{NoopObserver, SyncObserver};
use crate::reconcile::ReconciliationEngine;
use crate::registry::SharedVehicleRegistry;
use crate::source::VehicleSource;
use crate::vehicle::{IconResolver, KnownModeIcons};

use cycle::{CycleRunner, NO_SESSION};

pub use config::{
    SchedulerConfig, DEFAULT_ALL_INTERVAL, DEFAULT_SINGLE_INTERVAL, MIN_POLL_INTERVAL,
};
pub use session::{PollMode, PollSession, SessionId};

/// The running session and the handles needed to stop it.
struct ActiveSession {
    session: PollSession,
    cancellation: CancellationToken,
    handle: JoinHandle<()>,
}

/// Schedules poll cycles and owns the single active session.
pub struct PollingScheduler {
    runner: Arc<CycleRunner>,
    active: Mutex<Option<ActiveSession>>,
    next_session: AtomicU64,
    config: SchedulerConfig,
    runtime: Handle,
}

impl PollingScheduler {
    /// Start building a scheduler that polls `source`.
    pub fn builder(source: Arc<dyn VehicleSource>) -> PollingSchedulerBuilder {
        PollingSchedulerBuilder::new(source)
    }

    /// Start polling every vehicle.
    ///
    /// Cancels any active session. The registry is kept so the display does
    /// not flash empty while the first ALL cycle is in flight.
    pub fn start_all(&self, interval: Duration) -> PollSession {
        self.start(PollMode::All, interval)
    }

    /// Start following one vehicle.
    ///
    /// Cancels any active session and clears the registry before the first
    /// cycle, so only the followed vehicle is ever shown.
    pub fn start_single(&self, vehicle_id: impl Into<String>, interval: Duration) -> PollSession {
        self.start(PollMode::Single(vehicle_id.into()), interval)
    }

    /// Stop the active session.
    ///
    /// Returns false if nothing was running. The registry keeps its last
    /// contents; in-flight cycles are discarded.
    pub fn stop(&self) -> bool {
        match self.take_active() {
            Some(previous) => {
                info!(session = %previous.session.id, "Poll session stopped");
                true
            }
            None => false,
        }
    }

    /// Stop the active session and wait for its loop to exit.
    pub async fn shutdown(&self) {
        if let Some(previous) = self.take_active() {
            if let Err(e) = previous.handle.await {
                debug!(error = %e, "Session loop ended abnormally");
            }
            info!(session = %previous.session.id, "Poll session shut down");
        }
    }

    /// The active session, if any.
    pub fn current_session(&self) -> Option<PollSession> {
        self.active.lock().as_ref().map(|a| a.session.clone())
    }

    /// Returns true while a session is active.
    pub fn is_running(&self) -> bool {
        self.active.lock().is_some()
    }

    /// The registry this scheduler writes to.
    pub fn registry(&self) -> &SharedVehicleRegistry {
        &self.runner.registry
    }

    /// Cycle counters.
    pub fn metrics(&self) -> &Arc<SyncMetrics> {
        &self.runner.metrics
    }

    /// The configuration this scheduler was built with.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Cancel and remove the active session.
    ///
    /// `current` is reset while the `active` lock is held, so a concurrent
    /// `start` can never have its new id overwritten.
    fn take_active(&self) -> Option<ActiveSession> {
        let mut active = self.active.lock();
        let previous = active.take()?;
        previous.cancellation.cancel();
        self.runner.set_current(NO_SESSION);
        Some(previous)
    }

    fn start(&self, mode: PollMode, interval: Duration) -> PollSession {
        let interval = config::effective_interval(interval);
        let mut active = self.active.lock();

        if let Some(previous) = active.take() {
            previous.cancellation.cancel();
            debug!(session = %previous.session.id, "Superseding poll session");
        }

        let id = SessionId::new(self.next_session.fetch_add(1, Ordering::SeqCst));
        self.runner.set_current(id.get());

        if matches!(mode, PollMode::Single(_)) {
            self.runner.registry.clear();
        }

        let session = PollSession {
            id,
            mode,
            interval,
            started_at: Utc::now(),
        };
        let cancellation = CancellationToken::new();
        let handle = self.runtime.spawn(run_session(
            Arc::clone(&self.runner),
            session.clone(),
            cancellation.clone(),
        ));

        info!(
            session = %session.id,
            mode = %session.mode,
            interval_ms = interval.as_millis() as u64,
            "Poll session started"
        );

        *active = Some(ActiveSession {
            session: session.clone(),
            cancellation,
            handle,
        });
        session
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        if let Some(active) = self.active.get_mut().take() {
            active.cancellation.cancel();
        }
    }
}

/// Session loop: spawn one cycle per tick until cancelled.
///
/// The first tick completes immediately. Cycles run as their own tasks so a
/// slow fetch never delays the next tick.
async fn run_session(runner: Arc<CycleRunner>, session: PollSession, cancellation: CancellationToken) {
    let mut ticker = tokio::time::interval(session.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = cancellation.cancelled() => {
                debug!(session = %session.id, "Session loop cancelled");
                break;
            }

            _ = ticker.tick() => {
                let runner = Arc::clone(&runner);
                let mode = session.mode.clone();
                let id = session.id;
                tokio::spawn(async move {
                    runner.run(id, &mode).await;
                });
            }
        }
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`PollingScheduler`].
pub struct PollingSchedulerBuilder {
    source: Arc<dyn VehicleSource>,
    registry: Option<SharedVehicleRegistry>,
    user_position: Option<Arc<dyn UserPositionProvider>>,
    observer: Option<Arc<dyn SyncObserver>>,
    icons: Option<Arc<dyn IconResolver>>,
    metrics: Option<Arc<SyncMetrics>>,
    config: SchedulerConfig,
    runtime: Option<Handle>,
}

impl PollingSchedulerBuilder {
    fn new(source: Arc<dyn VehicleSource>) -> Self {
        Self {
            source,
            registry: None,
            user_position: None,
            observer: None,
            icons: None,
            metrics: None,
            config: SchedulerConfig::default(),
            runtime: None,
        }
    }

    /// Write to an existing registry.
    pub fn registry(mut self, registry: SharedVehicleRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Read the user position from `provider`.
    pub fn user_position(mut self, provider: Arc<dyn UserPositionProvider>) -> Self {
        self.user_position = Some(provider);
        self
    }

    /// Notify `observer` of changes and failures.
    pub fn observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Resolve icons with `icons`.
    pub fn icons(mut self, icons: Arc<dyn IconResolver>) -> Self {
        self.icons = Some(icons);
        self
    }

    /// Record into existing metrics.
    pub fn metrics(mut self, metrics: Arc<SyncMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Use `config`.
    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Spawn session loops on `runtime` instead of the current runtime.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Build the scheduler.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::NoRuntime`] if no runtime handle was given and the
    /// caller is not inside a tokio runtime.
    pub fn build(self) -> Result<PollingScheduler, SchedulerError> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?,
        };

        let icons = self
            .icons
            .unwrap_or_else(|| Arc::new(KnownModeIcons::default()));
        let engine = ReconciliationEngine::new(icons, self.config.walking_speed_mps)
            .with_retain_missing_for(self.config.retain_missing_for);

        let runner = CycleRunner::new(
            self.source,
            self.registry.unwrap_or_default(),
            self.user_position
                .unwrap_or_else(|| Arc::new(SharedUserPosition::new())),
            self.observer.unwrap_or_else(|| Arc::new(NoopObserver)),
            engine,
            self.metrics.unwrap_or_default(),
        );

        Ok(PollingScheduler {
            runner: Arc::new(runner),
            active: Mutex::new(None),
            next_session: AtomicU64::new(NO_SESSION + 1),
            config: self.config,
            runtime,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    use serde_json::{json, Value};
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::sleep;

    use crate::error::CycleErrorKind;
    use crate::observer::{ChannelObserver, SyncEvent};
    use crate::source::{SourceError, SourceFuture};
    use crate::vehicle::{AllVehiclesPayload, RawVehicle};

    type Scripted<T> = (Duration, Result<T, SourceError>);

    /// Source replaying queued responses; the last one repeats.
    #[derive(Default)]
    struct ScriptedSource {
        all: Mutex<VecDeque<Scripted<AllVehiclesPayload>>>,
        single: Mutex<VecDeque<Scripted<RawVehicle>>>,
        all_calls: AtomicUsize,
        single_calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn push_all(&self, delay: Duration, result: Result<AllVehiclesPayload, SourceError>) {
            self.all.lock().push_back((delay, result));
        }

        fn push_single(&self, result: Result<RawVehicle, SourceError>) {
            self.single.lock().push_back((Duration::ZERO, result));
        }

        fn all_calls(&self) -> usize {
            self.all_calls.load(Ordering::SeqCst)
        }

        fn single_calls(&self) -> usize {
            self.single_calls.load(Ordering::SeqCst)
        }
    }

    fn next<T: Clone>(queue: &Mutex<VecDeque<Scripted<T>>>, fallback: T) -> Scripted<T> {
        let mut queue = queue.lock();
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue
                .front()
                .cloned()
                .unwrap_or((Duration::ZERO, Ok(fallback)))
        }
    }

    impl VehicleSource for ScriptedSource {
        fn fetch_all(&self) -> SourceFuture<'_, AllVehiclesPayload> {
            self.all_calls.fetch_add(1, Ordering::SeqCst);
            let (delay, result) = next(&self.all, AllVehiclesPayload::new());
            Box::pin(async move {
                if !delay.is_zero() {
                    sleep(delay).await;
                }
                result
            })
        }

        fn fetch_vehicle<'a>(&'a self, _id: &'a str) -> SourceFuture<'a, RawVehicle> {
            self.single_calls.fetch_add(1, Ordering::SeqCst);
            let (_, result) = next(&self.single, RawVehicle::located(8.485, -13.23));
            Box::pin(async move { result })
        }
    }

    fn payload(value: Value) -> AllVehiclesPayload {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {}", other),
        }
    }

    fn drain(rx: &mut UnboundedReceiver<SyncEvent>) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn scheduler_with(
        source: Arc<ScriptedSource>,
    ) -> (PollingScheduler, UnboundedReceiver<SyncEvent>) {
        let (observer, rx) = ChannelObserver::new();
        let scheduler = PollingScheduler::builder(source)
            .observer(Arc::new(observer))
            .build()
            .unwrap();
        (scheduler, rx)
    }

    #[test]
    fn test_build_outside_runtime_fails() {
        let result = PollingScheduler::builder(Arc::new(ScriptedSource::default())).build();
        assert!(matches!(result, Err(SchedulerError::NoRuntime)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_cycle_runs_immediately() {
        let source = Arc::new(ScriptedSource::default());
        source.push_all(
            Duration::ZERO,
            Ok(payload(json!({"a": {"lat": 8.48, "lon": -13.22, "mode": "Bus"}}))),
        );
        let (scheduler, mut rx) = scheduler_with(Arc::clone(&source));

        let session = scheduler.start_all(Duration::from_secs(5));
        assert_eq!(session.mode, PollMode::All);
        sleep(Duration::from_millis(10)).await;

        assert_eq!(source.all_calls(), 1);
        let vehicle = scheduler.registry().get("a").unwrap();
        assert_eq!(vehicle.mode, "bus");
        assert_eq!(vehicle.icon, "bus");

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], SyncEvent::VehiclesChanged(v) if v.len() == 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_position_annotates_vehicles() {
        let source = Arc::new(ScriptedSource::default());
        source.push_all(
            Duration::ZERO,
            Ok(payload(json!({"a": {"lat": 8.485, "lon": -13.22}}))),
        );
        let position = SharedUserPosition::with_position(Some(crate::geo::Position::new(
            8.48, -13.22,
        )));
        let scheduler = PollingScheduler::builder(source)
            .user_position(Arc::new(position))
            .build()
            .unwrap();

        scheduler.start_all(Duration::from_secs(5));
        sleep(Duration::from_millis(10)).await;

        let vehicle = scheduler.registry().get("a").unwrap();
        assert_eq!(vehicle.distance_meters, Some(556));
        assert_eq!(vehicle.eta_minutes, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_entries_are_reported_once_per_cycle() {
        let source = Arc::new(ScriptedSource::default());
        source.push_all(
            Duration::ZERO,
            Ok(payload(json!({
                "good": {"lat": 1.0, "lon": 2.0},
                "bad": {"lat": "north", "lon": 2.0},
                "half": {"lat": 1.0}
            }))),
        );
        let (scheduler, mut rx) = scheduler_with(source);

        scheduler.start_all(Duration::from_secs(5));
        sleep(Duration::from_millis(10)).await;

        assert_eq!(scheduler.registry().len(), 1);
        let events = drain(&mut rx);
        let errors: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                SyncEvent::CycleError { kind, .. } => Some(*kind),
                _ => None,
            })
            .collect();
        assert_eq!(errors, vec![CycleErrorKind::InvalidData]);
        assert_eq!(scheduler.metrics().snapshot().invalid_entries, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_location_keeps_polling() {
        let source = Arc::new(ScriptedSource::default());
        source.push_single(Ok(RawVehicle::pending()));
        source.push_single(Ok(RawVehicle::located(8.485, -13.23).with_mode("keke")));
        let (scheduler, mut rx) = scheduler_with(Arc::clone(&source));

        scheduler.start_single("v1", Duration::from_secs(1));
        sleep(Duration::from_millis(500)).await;

        assert!(scheduler.registry().is_empty());
        let events = drain(&mut rx);
        assert!(matches!(
            events.as_slice(),
            [SyncEvent::CycleError { kind: CycleErrorKind::PendingLocation, .. }]
        ));
        assert!(scheduler.is_running());

        sleep(Duration::from_millis(1000)).await;

        assert_eq!(source.single_calls(), 2);
        assert_eq!(scheduler.registry().get("v1").unwrap().icon, "keke");
        assert_eq!(scheduler.metrics().snapshot().cycles_pending, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_results_are_discarded() {
        let source = Arc::new(ScriptedSource::default());
        source.push_all(
            Duration::from_secs(5),
            Ok(payload(json!({"old": {"lat": 1.0, "lon": 2.0}}))),
        );
        let (scheduler, mut rx) = scheduler_with(Arc::clone(&source));

        scheduler.start_all(Duration::from_secs(1));
        sleep(Duration::from_millis(500)).await;
        scheduler.start_single("v1", Duration::from_secs(1));
        sleep(Duration::from_secs(10)).await;

        assert_eq!(source.all_calls(), 1);
        assert_eq!(scheduler.registry().read().ids(), vec!["v1".to_string()]);
        assert_eq!(scheduler.metrics().snapshot().stale_results_dropped, 1);

        for event in drain(&mut rx) {
            if let SyncEvent::VehiclesChanged(vehicles) = event {
                assert!(vehicles.iter().all(|v| v.id == "v1"));
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_fetching_and_keeps_registry() {
        let source = Arc::new(ScriptedSource::default());
        source.push_all(
            Duration::ZERO,
            Ok(payload(json!({"a": {"lat": 1.0, "lon": 2.0}}))),
        );
        let (scheduler, _rx) = scheduler_with(Arc::clone(&source));

        scheduler.start_all(Duration::from_secs(1));
        sleep(Duration::from_millis(1500)).await;
        assert_eq!(source.all_calls(), 2);

        assert!(scheduler.stop());
        assert!(!scheduler.stop());
        sleep(Duration::from_secs(5)).await;

        assert_eq!(source.all_calls(), 2);
        assert!(!scheduler.is_running());
        assert!(scheduler.current_session().is_none());
        assert_eq!(scheduler.registry().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_ids_increase() {
        let source = Arc::new(ScriptedSource::default());
        let (scheduler, _rx) = scheduler_with(source);

        let first = scheduler.start_all(Duration::from_secs(1));
        let second = scheduler.start_single("v1", Duration::from_secs(1));

        assert!(second.id > first.id);
        assert_eq!(scheduler.current_session().unwrap().id, second.id);

        scheduler.shutdown().await;
        assert!(!scheduler.is_running());
    }

    #[test]
    fn test_concurrent_stop_and_start_keep_session_current() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        let scheduler = PollingScheduler::builder(Arc::new(ScriptedSource::default()))
            .runtime(runtime.handle().clone())
            .build()
            .unwrap();
        let barrier = std::sync::Barrier::new(2);

        for _ in 0..2_000 {
            scheduler.start_all(Duration::from_secs(60));

            std::thread::scope(|scope| {
                scope.spawn(|| {
                    barrier.wait();
                    scheduler.stop();
                });
                scope.spawn(|| {
                    barrier.wait();
                    scheduler.start_all(Duration::from_secs(60));
                });
            });

            match scheduler.current_session() {
                Some(session) => assert!(scheduler.runner.is_current(session.id)),
                None => assert!(!scheduler.runner.is_current(SessionId::new(
                    scheduler.next_session.load(Ordering::SeqCst) - 1
                ))),
            }
        }

        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_raised() {
        let source = Arc::new(ScriptedSource::default());
        let (scheduler, _rx) = scheduler_with(source);

        let session = scheduler.start_all(Duration::ZERO);
        assert_eq!(session.interval, MIN_POLL_INTERVAL);
    }
}
