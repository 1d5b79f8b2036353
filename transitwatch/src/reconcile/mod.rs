//! Reconciliation of backend payloads into registry mutations.
//!
//! The [`ReconciliationEngine`] is a pure transform: payload + user position +
//! prior registry state in, [`Reconciliation`] out. It performs no I/O and
//! never touches the registry itself; the scheduler applies the result.
//!
//! # Validation
//!
//! | Entry                              | ALL mode         | SINGLE mode        |
//! |------------------------------------|------------------|--------------------|
//! | empty id                           | skipped, counted | `InvalidData`      |
//! | both coordinates absent            | skipped, counted | `PendingLocation`  |
//! | one coordinate absent              | skipped, counted | `InvalidData`      |
//! | non-numeric / non-finite coordinate| skipped, counted | `InvalidData`      |
//!
//! A coordinate of exactly `0` is a valid location.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::geo::{compute_distance_and_eta, Position, DEFAULT_WALKING_SPEED_MPS};
use crate::vehicle::{
    normalize_mode, AllVehiclesPayload, IconResolver, KnownModeIcons, RawCoordinate, RawVehicle,
    TrackedVehicle,
};

/// Why a single backend entry could not be reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// The entry failed validation.
    #[error("invalid vehicle data for '{id}': {reason}")]
    InvalidData { id: String, reason: String },

    /// The vehicle has not reported coordinates yet.
    #[error("vehicle '{id}' has no location yet")]
    PendingLocation { id: String },
}

/// Registry mutations produced by one reconciliation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// Vehicles to insert or replace.
    pub upserts: Vec<TrackedVehicle>,
    /// Ids to remove.
    pub removals: Vec<String>,
    /// Number of backend entries skipped as invalid.
    pub invalid_count: usize,
}

impl Reconciliation {
    /// Returns true if applying this would not change the registry.
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.removals.is_empty()
    }
}

/// Turns raw backend payloads into [`Reconciliation`]s.
#[derive(Clone)]
pub struct ReconciliationEngine {
    icons: Arc<dyn IconResolver>,
    walking_speed_mps: f64,
    retain_missing_for: Option<Duration>,
}

impl std::fmt::Debug for ReconciliationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationEngine")
            .field("walking_speed_mps", &self.walking_speed_mps)
            .field("retain_missing_for", &self.retain_missing_for)
            .finish_non_exhaustive()
    }
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new(Arc::new(KnownModeIcons::default()), DEFAULT_WALKING_SPEED_MPS)
    }
}

impl ReconciliationEngine {
    /// Create an engine with the given icon resolver and walking speed.
    pub fn new(icons: Arc<dyn IconResolver>, walking_speed_mps: f64) -> Self {
        Self {
            icons,
            walking_speed_mps,
            retain_missing_for: None,
        }
    }

    /// Remove vehicles missing from ALL-mode payloads once they have not been
    /// seen for `window`. `None` keeps them indefinitely.
    pub fn with_retain_missing_for(mut self, window: Option<Duration>) -> Self {
        self.retain_missing_for = window;
        self
    }

    /// Reconcile an "all vehicles" payload.
    ///
    /// Invalid entries are skipped and counted; they never fail the whole
    /// payload.
    pub fn reconcile_all(
        &self,
        payload: &AllVehiclesPayload,
        prior: &[TrackedVehicle],
        user: Option<Position>,
        now: DateTime<Utc>,
    ) -> Reconciliation {
        let mut upserts = Vec::with_capacity(payload.len());
        let mut invalid_count = 0;

        for (id, value) in payload {
            let tracked = RawVehicle::from_value(value)
                .map_err(|e| ReconcileError::InvalidData {
                    id: id.clone(),
                    reason: e.to_string(),
                })
                .and_then(|raw| self.track(id, &raw, user, now));

            match tracked {
                Ok(vehicle) => upserts.push(vehicle),
                Err(e) => {
                    invalid_count += 1;
                    tracing::debug!(error = %e, "Skipping vehicle entry");
                }
            }
        }

        let removals = self.expired_missing(payload, prior, now);

        Reconciliation {
            upserts,
            removals,
            invalid_count,
        }
    }

    /// Reconcile the payload of a single followed vehicle.
    ///
    /// Returns [`ReconcileError::PendingLocation`] when neither coordinate has
    /// been reported yet; the caller should skip the cycle and keep polling.
    pub fn reconcile_single(
        &self,
        vehicle_id: &str,
        payload: &RawVehicle,
        user: Option<Position>,
        now: DateTime<Utc>,
    ) -> Result<Reconciliation, ReconcileError> {
        let vehicle = self.track(vehicle_id, payload, user, now)?;
        Ok(Reconciliation {
            upserts: vec![vehicle],
            removals: Vec::new(),
            invalid_count: 0,
        })
    }

    /// Validate one raw entry and build its tracked form.
    fn track(
        &self,
        id: &str,
        raw: &RawVehicle,
        user: Option<Position>,
        now: DateTime<Utc>,
    ) -> Result<TrackedVehicle, ReconcileError> {
        if id.trim().is_empty() {
            return Err(ReconcileError::InvalidData {
                id: id.to_string(),
                reason: "empty id".to_string(),
            });
        }

        if raw.lat.is_absent() && raw.lon.is_absent() {
            return Err(ReconcileError::PendingLocation { id: id.to_string() });
        }

        let latitude = finite_coordinate(id, "lat", &raw.lat)?;
        let longitude = finite_coordinate(id, "lon", &raw.lon)?;
        let position = Position::new(latitude, longitude);

        let mode = normalize_mode(raw.mode.as_deref());
        let icon = self.icons.resolve(&mode);

        let walk = user.map(|u| compute_distance_and_eta(u, position, self.walking_speed_mps));

        Ok(TrackedVehicle {
            id: id.to_string(),
            position,
            mode,
            icon,
            distance_meters: walk.map(|w| w.distance_meters),
            eta_minutes: walk.map(|w| w.eta_minutes),
            last_seen_at: now,
        })
    }

    /// Prior vehicles absent from `payload` and unseen for longer than the
    /// retention window.
    fn expired_missing(
        &self,
        payload: &AllVehiclesPayload,
        prior: &[TrackedVehicle],
        now: DateTime<Utc>,
    ) -> Vec<String> {
        let Some(window) = self.retain_missing_for else {
            return Vec::new();
        };

        prior
            .iter()
            .filter(|v| !payload.contains_key(&v.id))
            .filter(|v| {
                now.signed_duration_since(v.last_seen_at)
                    .to_std()
                    .map(|age| age >= window)
                    .unwrap_or(false)
            })
            .map(|v| v.id.clone())
            .collect()
    }
}

fn finite_coordinate(id: &str, field: &str, value: &RawCoordinate) -> Result<f64, ReconcileError> {
    value.finite().ok_or_else(|| ReconcileError::InvalidData {
        id: id.to_string(),
        reason: match value {
            RawCoordinate::Absent => format!("missing {}", field),
            RawCoordinate::Number(v) => format!("non-finite {}: {}", field, v),
            RawCoordinate::Invalid(s) => format!("non-numeric {}: {}", field, s),
        },
    })
}
