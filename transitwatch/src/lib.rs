//! TransitWatch - live public-transit vehicle tracking
//!
//! Polls a backend for vehicle positions, reconciles each payload into a
//! registry of tracked vehicles annotated with walking distance and ETA from
//! the user, and notifies a presentation layer of every change.
//!
//! # Modules
//!
//! - [`geo`] - haversine distance and walking ETA
//! - [`vehicle`] - raw and tracked vehicle models, icon resolution
//! - [`registry`] - the current set of tracked vehicles
//! - [`reconcile`] - payload to registry mutations, no I/O
//! - [`source`] - backend access over HTTP
//! - [`scheduler`] - ALL and SINGLE poll sessions
//! - [`observer`] - change and failure notifications
//! - [`location`] - user position input
//! - [`metrics`] - cycle counters
//! - [`config`] - INI configuration file
//! - [`logging`] - tracing subscriber setup

pub mod config;
pub mod error;
pub mod geo;
pub mod location;
pub mod logging;
pub mod metrics;
pub mod observer;
pub mod reconcile;
pub mod registry;
pub mod scheduler;
pub mod source;
pub mod vehicle;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use error::{CycleErrorKind, SchedulerError, SyncError};
pub use geo::{compute_distance_and_eta, DistanceEta, Position};
pub use registry::{SharedVehicleRegistry, VehicleRegistry};
pub use scheduler::{PollMode, PollSession, PollingScheduler, SessionId};
pub use vehicle::TrackedVehicle;
