//! Typed configuration keys for `config get` / `config set`.

use std::path::PathBuf;
use std::str::FromStr;

use super::{ConfigError, ConfigFile};
use crate::scheduler::MIN_POLL_INTERVAL;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single configuration key, addressed as `section.key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    BackendBaseUrl,
    BackendAllVehiclesPath,
    BackendVehiclePath,
    BackendTimeout,
    PollingIntervalMs,
    PollingSingleIntervalMs,
    PollingRetainMissingSecs,
    WalkingSpeedMps,
    UserLatitude,
    UserLongitude,
    IconsModes,
    IconsDefault,
    LoggingLevel,
    LoggingDirectory,
}

impl ConfigKey {
    /// Every key, grouped by section in file order.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::BackendBaseUrl,
            ConfigKey::BackendAllVehiclesPath,
            ConfigKey::BackendVehiclePath,
            ConfigKey::BackendTimeout,
            ConfigKey::PollingIntervalMs,
            ConfigKey::PollingSingleIntervalMs,
            ConfigKey::PollingRetainMissingSecs,
            ConfigKey::WalkingSpeedMps,
            ConfigKey::UserLatitude,
            ConfigKey::UserLongitude,
            ConfigKey::IconsModes,
            ConfigKey::IconsDefault,
            ConfigKey::LoggingLevel,
            ConfigKey::LoggingDirectory,
        ]
    }

    /// INI section name.
    pub fn section(&self) -> &'static str {
        match self {
            ConfigKey::BackendBaseUrl
            | ConfigKey::BackendAllVehiclesPath
            | ConfigKey::BackendVehiclePath
            | ConfigKey::BackendTimeout => "backend",
            ConfigKey::PollingIntervalMs
            | ConfigKey::PollingSingleIntervalMs
            | ConfigKey::PollingRetainMissingSecs => "polling",
            ConfigKey::WalkingSpeedMps => "walking",
            ConfigKey::UserLatitude | ConfigKey::UserLongitude => "user",
            ConfigKey::IconsModes | ConfigKey::IconsDefault => "icons",
            ConfigKey::LoggingLevel | ConfigKey::LoggingDirectory => "logging",
        }
    }

    /// Key name within its section.
    pub fn key_name(&self) -> &'static str {
        match self {
            ConfigKey::BackendBaseUrl => "base_url",
            ConfigKey::BackendAllVehiclesPath => "all_vehicles_path",
            ConfigKey::BackendVehiclePath => "vehicle_path",
            ConfigKey::BackendTimeout => "timeout",
            ConfigKey::PollingIntervalMs => "interval_ms",
            ConfigKey::PollingSingleIntervalMs => "single_interval_ms",
            ConfigKey::PollingRetainMissingSecs => "retain_missing_secs",
            ConfigKey::WalkingSpeedMps => "speed_mps",
            ConfigKey::UserLatitude => "latitude",
            ConfigKey::UserLongitude => "longitude",
            ConfigKey::IconsModes => "modes",
            ConfigKey::IconsDefault => "default",
            ConfigKey::LoggingLevel => "level",
            ConfigKey::LoggingDirectory => "directory",
        }
    }

    /// Full `section.key` name.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value as a string; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::BackendBaseUrl => config.backend.base_url.clone(),
            ConfigKey::BackendAllVehiclesPath => config.backend.all_vehicles_path.clone(),
            ConfigKey::BackendVehiclePath => config.backend.vehicle_path.clone(),
            ConfigKey::BackendTimeout => config.backend.timeout.to_string(),
            ConfigKey::PollingIntervalMs => config.polling.interval_ms.to_string(),
            ConfigKey::PollingSingleIntervalMs => config.polling.single_interval_ms.to_string(),
            ConfigKey::PollingRetainMissingSecs => optional(config.polling.retain_missing_secs),
            ConfigKey::WalkingSpeedMps => config.walking.speed_mps.to_string(),
            ConfigKey::UserLatitude => optional(config.user.latitude),
            ConfigKey::UserLongitude => optional(config.user.longitude),
            ConfigKey::IconsModes => config.icons.modes.join(","),
            ConfigKey::IconsDefault => config.icons.default.clone(),
            ConfigKey::LoggingLevel => config.logging.level.clone(),
            ConfigKey::LoggingDirectory => config.logging.directory.display().to_string(),
        }
    }

    /// Validate `value` and store it.
    ///
    /// Optional keys accept an empty value to unset them.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        let invalid = |reason: &str| ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason: reason.to_string(),
        };

        match self {
            ConfigKey::BackendBaseUrl => {
                if !(value.starts_with("http://") || value.starts_with("https://")) {
                    return Err(invalid("must start with http:// or https://"));
                }
                config.backend.base_url = value.to_string();
            }
            ConfigKey::BackendAllVehiclesPath => {
                if value.is_empty() {
                    return Err(invalid("must not be empty"));
                }
                config.backend.all_vehicles_path = value.to_string();
            }
            ConfigKey::BackendVehiclePath => {
                if !value.contains("{id}") {
                    return Err(invalid("must contain the {id} placeholder"));
                }
                config.backend.vehicle_path = value.to_string();
            }
            ConfigKey::BackendTimeout => {
                config.backend.timeout = match value.parse::<u64>() {
                    Ok(secs) if secs > 0 => secs,
                    _ => return Err(invalid("expected a positive number of seconds")),
                };
            }
            ConfigKey::PollingIntervalMs | ConfigKey::PollingSingleIntervalMs => {
                let min = MIN_POLL_INTERVAL.as_millis() as u64;
                let ms = match value.parse::<u64>() {
                    Ok(ms) if ms >= min => ms,
                    _ => {
                        return Err(invalid(&format!(
                            "expected milliseconds, at least {}",
                            min
                        )))
                    }
                };
                if *self == ConfigKey::PollingIntervalMs {
                    config.polling.interval_ms = ms;
                } else {
                    config.polling.single_interval_ms = ms;
                }
            }
            ConfigKey::PollingRetainMissingSecs => {
                config.polling.retain_missing_secs = if value.is_empty() {
                    None
                } else {
                    Some(
                        value
                            .parse::<u64>()
                            .map_err(|_| invalid("expected seconds or empty"))?,
                    )
                };
            }
            ConfigKey::WalkingSpeedMps => {
                config.walking.speed_mps = match value.parse::<f64>() {
                    Ok(speed) if speed.is_finite() && speed > 0.0 => speed,
                    _ => return Err(invalid("expected a positive speed in m/s")),
                };
            }
            ConfigKey::UserLatitude => {
                config.user.latitude = parse_coordinate(value, 90.0)
                    .map_err(|_| invalid("expected degrees in [-90, 90] or empty"))?;
            }
            ConfigKey::UserLongitude => {
                config.user.longitude = parse_coordinate(value, 180.0)
                    .map_err(|_| invalid("expected degrees in [-180, 180] or empty"))?;
            }
            ConfigKey::IconsModes => {
                config.icons.modes = value
                    .split(',')
                    .map(|m| m.trim().to_lowercase())
                    .filter(|m| !m.is_empty())
                    .collect();
            }
            ConfigKey::IconsDefault => {
                if value.is_empty() {
                    return Err(invalid("must not be empty"));
                }
                config.icons.default = value.to_string();
            }
            ConfigKey::LoggingLevel => {
                let level = value.to_lowercase();
                if !LOG_LEVELS.contains(&level.as_str()) {
                    return Err(invalid("expected one of trace, debug, info, warn, error"));
                }
                config.logging.level = level;
            }
            ConfigKey::LoggingDirectory => {
                if value.is_empty() {
                    return Err(invalid("must not be empty"));
                }
                config.logging.directory = PathBuf::from(value);
            }
        }
        Ok(())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

impl std::fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.section(), self.key_name())
    }
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Parse an optional coordinate bounded by `±limit`.
fn parse_coordinate(value: &str, limit: f64) -> Result<Option<f64>, ()> {
    if value.is_empty() {
        return Ok(None);
    }
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() && v.abs() <= limit => Ok(Some(v)),
        _ => Err(()),
    }
}
