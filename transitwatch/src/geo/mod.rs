//! Geodesic distance and walking ETA.
//!
//! Provides great-circle (haversine) distance between two geographic
//! positions and a walking-time estimate derived from it.
//!
//! # Rounding
//!
//! Distance and ETA are rounded independently from the unrounded haversine
//! distance:
//!
//! ```text
//! distance_meters = round(d)
//! eta_minutes     = round(d / speed_mps / 60)
//! ```

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Default walking speed in meters per second.
pub const DEFAULT_WALKING_SPEED_MPS: f64 = 1.4;

/// A geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl Position {
    /// Create a new position.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Returns true if both coordinates are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.5}, {:.5}", self.latitude, self.longitude)
    }
}

/// Walking distance and ETA between two positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistanceEta {
    /// Great-circle distance, rounded to whole meters.
    pub distance_meters: u32,
    /// Walking time, rounded to whole minutes.
    pub eta_minutes: u32,
}

/// Great-circle distance between two positions in meters (unrounded).
///
/// The haversine term is clamped to `[0, 1]` so antipodal points do not
/// produce NaN from floating point drift.
#[inline]
pub fn haversine_distance_m(from: Position, to: Position) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let dlat = (to.latitude - from.latitude).to_radians();
    let dlon = (to.longitude - from.longitude).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.clamp(0.0, 1.0).sqrt().asin();

    EARTH_RADIUS_M * c
}

/// Computes walking distance and ETA from `user` to `target`.
///
/// A non-positive or non-finite `walking_speed_mps` falls back to
/// [`DEFAULT_WALKING_SPEED_MPS`].
///
/// # Example
///
/// ```
/// use transitwatch::geo::{compute_distance_and_eta, Position};
///
/// let user = Position::new(8.4800, -13.2200);
/// let bus = Position::new(8.4850, -13.2300);
///
/// let result = compute_distance_and_eta(user, bus, 1.4);
/// assert_eq!(result.distance_meters, 1232);
/// assert_eq!(result.eta_minutes, 15);
/// ```
pub fn compute_distance_and_eta(
    user: Position,
    target: Position,
    walking_speed_mps: f64,
) -> DistanceEta {
    let speed = if walking_speed_mps.is_finite() && walking_speed_mps > 0.0 {
        walking_speed_mps
    } else {
        DEFAULT_WALKING_SPEED_MPS
    };

    let distance = haversine_distance_m(user, target);

    DistanceEta {
        distance_meters: distance.round() as u32,
        eta_minutes: (distance / speed / 60.0).round() as u32,
    }
}

/// [`compute_distance_and_eta`] at the default walking speed.
#[inline]
pub fn compute_distance_and_eta_default(user: Position, target: Position) -> DistanceEta {
    compute_distance_and_eta(user, target, DEFAULT_WALKING_SPEED_MPS)
}
