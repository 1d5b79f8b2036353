//! Integration tests for the polling scheduler.
//!
//! These drive the full stack through the public API:
//! - scripted HTTP responses → `HttpVehicleSource` → `PollingScheduler`
//! - reconciliation into the shared registry
//! - observer notifications
//!
//! Time is paused, so intervals elapse instantly and deterministically.
//!
//! Run with: `cargo test --test polling_integration`

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::sleep;

use transitwatch::error::CycleErrorKind;
use transitwatch::geo::Position;
use transitwatch::location::SharedUserPosition;
use transitwatch::observer::{ChannelObserver, SyncEvent};
use transitwatch::scheduler::PollingScheduler;
use transitwatch::source::{AsyncHttpClient, HttpSourceConfig, HttpVehicleSource, SourceError};

// ============================================================================
// Helpers
// ============================================================================

const BASE_URL: &str = "http://transit.test";
const ALL_URL: &str = "http://transit.test/api/vehicles";

type Response = Result<Vec<u8>, SourceError>;

/// HTTP client replaying scripted responses per URL; the last one repeats.
#[derive(Default)]
struct ScriptedHttp {
    routes: Mutex<Vec<(String, VecDeque<Response>)>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedHttp {
    fn route(&self, url: &str, body: &str) {
        self.push(url, Ok(body.as_bytes().to_vec()));
    }

    fn fail(&self, url: &str, status: u16) {
        self.push(
            url,
            Err(SourceError::Http {
                status,
                url: url.to_string(),
            }),
        );
    }

    fn push(&self, url: &str, response: Response) {
        let mut routes = self.routes.lock().unwrap();
        match routes.iter_mut().find(|(u, _)| u == url) {
            Some((_, queue)) => queue.push_back(response),
            None => routes.push((url.to_string(), VecDeque::from([response]))),
        }
    }

    fn calls_to(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.as_str() == url)
            .count()
    }
}

impl AsyncHttpClient for ScriptedHttp {
    fn get<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, SourceError>> + Send + 'a>> {
        self.calls.lock().unwrap().push(url.to_string());

        let response = {
            let mut routes = self.routes.lock().unwrap();
            match routes.iter_mut().find(|(u, _)| u == url) {
                Some((_, queue)) if queue.len() > 1 => queue.pop_front().unwrap(),
                Some((_, queue)) => queue.front().cloned().unwrap(),
                None => Err(SourceError::Http {
                    status: 404,
                    url: url.to_string(),
                }),
            }
        };
        Box::pin(async move { response })
    }
}

/// Forwards to a shared [`ScriptedHttp`] so the test keeps a handle to it.
struct SharedHttp(Arc<ScriptedHttp>);

impl AsyncHttpClient for SharedHttp {
    fn get<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, SourceError>> + Send + 'a>> {
        self.0.get(url)
    }
}

struct Harness {
    http: Arc<ScriptedHttp>,
    scheduler: PollingScheduler,
    events: UnboundedReceiver<SyncEvent>,
}

fn harness(user: Option<Position>) -> Harness {
    let http = Arc::new(ScriptedHttp::default());
    let source = HttpVehicleSource::new(
        SharedHttp(Arc::clone(&http)),
        HttpSourceConfig::new(BASE_URL),
    );
    let (observer, events) = ChannelObserver::new();

    let scheduler = PollingScheduler::builder(Arc::new(source))
        .observer(Arc::new(observer))
        .user_position(Arc::new(SharedUserPosition::with_position(user)))
        .build()
        .unwrap();

    Harness {
        http,
        scheduler,
        events,
    }
}

fn drain(rx: &mut UnboundedReceiver<SyncEvent>) -> Vec<SyncEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn error_kinds(events: &[SyncEvent]) -> Vec<CycleErrorKind> {
    events
        .iter()
        .filter_map(|e| match e {
            SyncEvent::CycleError { kind, .. } => Some(*kind),
            SyncEvent::VehiclesChanged(_) => None,
        })
        .collect()
}

fn ids(scheduler: &PollingScheduler) -> Vec<String> {
    scheduler.registry().read().ids()
}

// ============================================================================
// Mode switching
// ============================================================================

/// After switching to SINGLE, no ALL fetch is issued and the registry never
/// again contains vehicles from the ALL session.
#[tokio::test(start_paused = true)]
async fn test_switch_to_single_mode_stops_all_polling() {
    let mut h = harness(None);
    h.http.route(
        ALL_URL,
        r#"{"a": {"lat": 8.48, "lon": -13.22, "mode": "Bus"},
            "b": {"lat": 8.49, "lon": -13.21, "mode": "Taxi"}}"#,
    );
    h.http.route(
        "http://transit.test/api/vehicles/v7",
        r#"{"lat": 8.485, "lon": -13.23, "mode": "Keke"}"#,
    );

    h.scheduler.start_all(Duration::from_secs(1));
    sleep(Duration::from_millis(2500)).await;

    assert_eq!(h.http.calls_to(ALL_URL), 3);
    assert_eq!(ids(&h.scheduler), vec!["a", "b"]);

    h.scheduler.start_single("v7", Duration::from_secs(1));
    assert!(h.scheduler.registry().is_empty());
    drain(&mut h.events);

    sleep(Duration::from_millis(5500)).await;

    assert_eq!(h.http.calls_to(ALL_URL), 3);
    assert!(h.http.calls_to("http://transit.test/api/vehicles/v7") >= 5);
    assert_eq!(ids(&h.scheduler), vec!["v7"]);

    for event in drain(&mut h.events) {
        match event {
            SyncEvent::VehiclesChanged(vehicles) => {
                assert!(vehicles.iter().all(|v| v.id == "v7"));
            }
            SyncEvent::CycleError { kind, detail } => {
                panic!("unexpected {} error: {}", kind, detail);
            }
        }
    }
}

/// Returning to ALL mode does not clear the registry; the first ALL cycle
/// fills it.
#[tokio::test(start_paused = true)]
async fn test_switch_back_to_all_mode() {
    let h = harness(None);
    h.http.route(ALL_URL, r#"{"a": {"lat": 1.0, "lon": 2.0}}"#);
    h.http.route(
        "http://transit.test/api/vehicles/v7",
        r#"{"lat": 8.485, "lon": -13.23}"#,
    );

    h.scheduler.start_single("v7", Duration::from_secs(1));
    sleep(Duration::from_millis(500)).await;
    assert_eq!(ids(&h.scheduler), vec!["v7"]);

    h.scheduler.start_all(Duration::from_secs(1));
    sleep(Duration::from_millis(500)).await;

    assert!(ids(&h.scheduler).contains(&"a".to_string()));
    h.scheduler.shutdown().await;
    assert!(!h.scheduler.is_running());
}

// ============================================================================
// Failure recovery
// ============================================================================

/// A failing cycle between two successes leaves the registry at the first
/// success, reports exactly one error, and the next cycle recovers.
#[tokio::test(start_paused = true)]
async fn test_failed_cycle_between_successes() {
    let mut h = harness(Some(Position::new(8.48, -13.22)));
    h.http.route(ALL_URL, r#"{"a": {"lat": 8.485, "lon": -13.23, "mode": "bus"}}"#);
    h.http.fail(ALL_URL, 503);
    h.http.route(
        ALL_URL,
        r#"{"a": {"lat": 8.485, "lon": -13.22, "mode": "bus"},
            "c": {"lat": 8.49, "lon": -13.22, "mode": "ferry"}}"#,
    );

    h.scheduler.start_all(Duration::from_secs(1));

    sleep(Duration::from_millis(500)).await;
    let first = h.scheduler.registry().get("a").unwrap();
    assert_eq!(first.distance_meters, Some(1232));
    assert_eq!(first.eta_minutes, Some(15));

    sleep(Duration::from_millis(1000)).await;
    assert_eq!(h.scheduler.registry().get("a").unwrap(), first);
    assert!(h.scheduler.registry().get("c").is_none());

    sleep(Duration::from_millis(1000)).await;
    let recovered = h.scheduler.registry().get("a").unwrap();
    assert_eq!(recovered.distance_meters, Some(556));
    assert_eq!(ids(&h.scheduler), vec!["a", "c"]);

    let events = drain(&mut h.events);
    assert_eq!(error_kinds(&events), vec![CycleErrorKind::Network]);

    let snapshot = h.scheduler.metrics().snapshot();
    assert_eq!(snapshot.cycles_started, 3);
    assert_eq!(snapshot.cycles_failed, 1);
    assert_eq!(snapshot.cycles_applied, 2);
    assert!(h.scheduler.is_running());
}

/// A body that is not JSON is reported as malformed and skipped.
#[tokio::test(start_paused = true)]
async fn test_malformed_payload_is_skipped() {
    let mut h = harness(None);
    h.http.route(ALL_URL, r#"{"a": {"lat": 1.0, "lon": 2.0}}"#);
    h.http.route(ALL_URL, "<html>gateway timeout</html>");
    h.http.route(ALL_URL, r#"{"a": {"lat": 1.5, "lon": 2.0}}"#);

    h.scheduler.start_all(Duration::from_secs(1));
    sleep(Duration::from_millis(1500)).await;

    assert_eq!(
        h.scheduler.registry().get("a").unwrap().position,
        Position::new(1.0, 2.0)
    );
    assert_eq!(
        error_kinds(&drain(&mut h.events)),
        vec![CycleErrorKind::Malformed]
    );

    sleep(Duration::from_millis(1000)).await;
    assert_eq!(
        h.scheduler.registry().get("a").unwrap().position,
        Position::new(1.5, 2.0)
    );
}

// ============================================================================
// SINGLE mode
// ============================================================================

/// A followed vehicle without a location is reported as pending until it
/// reports one.
#[tokio::test(start_paused = true)]
async fn test_followed_vehicle_pending_then_located() {
    let mut h = harness(None);
    let url = "http://transit.test/api/vehicles/v9";
    h.http.route(url, r#"{"lat": null, "lon": null, "mode": "okada"}"#);
    h.http.route(url, r#"{"lat": 0.0, "lon": 0.0, "mode": "okada"}"#);

    h.scheduler.start_single("v9", Duration::from_secs(1));
    sleep(Duration::from_millis(500)).await;

    assert!(h.scheduler.registry().is_empty());
    assert_eq!(
        error_kinds(&drain(&mut h.events)),
        vec![CycleErrorKind::PendingLocation]
    );

    sleep(Duration::from_millis(1000)).await;

    let vehicle = h.scheduler.registry().get("v9").unwrap();
    assert_eq!(vehicle.position, Position::new(0.0, 0.0));
    assert_eq!(vehicle.icon, "okada");
    assert_eq!(vehicle.distance_meters, None);
}

/// Stopping keeps the last registry contents and issues no further fetches.
#[tokio::test(start_paused = true)]
async fn test_stop_is_final() {
    let h = harness(None);
    h.http.route(ALL_URL, r#"{"a": {"lat": 1.0, "lon": 2.0}}"#);

    h.scheduler.start_all(Duration::from_secs(1));
    sleep(Duration::from_millis(500)).await;
    assert!(h.scheduler.stop());
    let fetched = h.http.calls_to(ALL_URL);

    sleep(Duration::from_secs(10)).await;

    assert_eq!(h.http.calls_to(ALL_URL), fetched);
    assert_eq!(ids(&h.scheduler), vec!["a"]);
}
