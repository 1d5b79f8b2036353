//! Vehicle data types.
//!
//! [`RawVehicle`] is what the backend reports; [`TrackedVehicle`] is what the
//! registry owns after reconciliation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::geo::Position;

/// Mode assigned to vehicles whose mode is absent or empty.
pub const UNKNOWN_MODE: &str = "unknown";

/// Payload of the "all vehicles" endpoint: vehicle id → raw vehicle object.
///
/// Entries are kept as untyped JSON so that one malformed entry can be
/// skipped without rejecting the whole payload.
pub type AllVehiclesPayload = serde_json::Map<String, Value>;

/// A coordinate as reported by the backend.
///
/// Accepts JSON numbers and numeric strings. `null`, a missing field, or a
/// blank string mean the coordinate is absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RawCoordinate {
    /// No value reported.
    #[default]
    Absent,
    /// A numeric value (may still be non-finite, e.g. `"NaN"`).
    Number(f64),
    /// A value that is not a number.
    Invalid(String),
}

impl RawCoordinate {
    /// Returns true if no value was reported.
    pub fn is_absent(&self) -> bool {
        matches!(self, RawCoordinate::Absent)
    }

    /// Returns the value if it is a finite number.
    pub fn finite(&self) -> Option<f64> {
        match self {
            RawCoordinate::Number(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for RawCoordinate {
    fn from(value: f64) -> Self {
        RawCoordinate::Number(value)
    }
}

impl From<Option<f64>> for RawCoordinate {
    fn from(value: Option<f64>) -> Self {
        value.map_or(RawCoordinate::Absent, RawCoordinate::Number)
    }
}

impl<'de> Deserialize<'de> for RawCoordinate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Null => RawCoordinate::Absent,
            Value::Number(n) => n
                .as_f64()
                .map_or_else(|| RawCoordinate::Invalid(n.to_string()), RawCoordinate::Number),
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    RawCoordinate::Absent
                } else {
                    trimmed
                        .parse::<f64>()
                        .map_or(RawCoordinate::Invalid(s), RawCoordinate::Number)
                }
            }
            other => RawCoordinate::Invalid(other.to_string()),
        })
    }
}

/// A single vehicle as reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawVehicle {
    /// Latitude in degrees.
    #[serde(default, alias = "latitude")]
    pub lat: RawCoordinate,
    /// Longitude in degrees.
    #[serde(default, alias = "longitude", alias = "lng")]
    pub lon: RawCoordinate,
    /// Transport mode (e.g. "Bus", "Taxi").
    #[serde(default)]
    pub mode: Option<String>,
}

impl RawVehicle {
    /// A vehicle with known coordinates and no mode.
    pub fn located(lat: f64, lon: f64) -> Self {
        Self {
            lat: RawCoordinate::Number(lat),
            lon: RawCoordinate::Number(lon),
            mode: None,
        }
    }

    /// A vehicle that has not reported a location yet.
    pub fn pending() -> Self {
        Self::default()
    }

    /// Set the transport mode.
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    /// Parse a single entry of an [`AllVehiclesPayload`].
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        RawVehicle::deserialize(value)
    }
}

/// A vehicle tracked by the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedVehicle {
    /// Backend vehicle id (non-empty).
    pub id: String,
    /// Last known position.
    pub position: Position,
    /// Normalized (lower-case) transport mode.
    pub mode: String,
    /// Icon key resolved from the mode.
    pub icon: String,
    /// Walking distance from the user, when the user position was known.
    pub distance_meters: Option<u32>,
    /// Walking time from the user in minutes, when the user position was known.
    pub eta_minutes: Option<u32>,
    /// When this vehicle was last reported by the backend.
    pub last_seen_at: DateTime<Utc>,
}

impl TrackedVehicle {
    /// Compare everything except `last_seen_at`.
    pub fn same_state(&self, other: &TrackedVehicle) -> bool {
        self.id == other.id
            && self.position == other.position
            && self.mode == other.mode
            && self.icon == other.icon
            && self.distance_meters == other.distance_meters
            && self.eta_minutes == other.eta_minutes
    }
}

/// Normalize a raw mode string: trimmed, lower-cased, `"unknown"` when empty.
pub fn normalize_mode(mode: Option<&str>) -> String {
    match mode.map(str::trim) {
        Some(m) if !m.is_empty() => m.to_lowercase(),
        _ => UNKNOWN_MODE.to_string(),
    }
}
