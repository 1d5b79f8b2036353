//! Configuration file support.
//!
//! Settings live in an INI file at `~/.config/transitwatch/config.ini` (or the
//! platform equivalent). A missing file, or a missing key, means the default
//! value. Every key is validated through [`ConfigKey::set`], so values read
//! from disk and values set from the command line follow the same rules.
//!
//! ```ini
//! [backend]
//! base_url = http://localhost:8000
//! timeout = 10
//!
//! [polling]
//! interval_ms = 5000
//! single_interval_ms = 3000
//!
//! [walking]
//! speed_mps = 1.4
//! ```

mod keys;

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::geo::{Position, DEFAULT_WALKING_SPEED_MPS};
use crate::scheduler::{SchedulerConfig, DEFAULT_ALL_INTERVAL, DEFAULT_SINGLE_INTERVAL};
use crate::source::{
    HttpSourceConfig, DEFAULT_ALL_VEHICLES_PATH, DEFAULT_TIMEOUT_SECS, DEFAULT_VEHICLE_PATH,
};
use crate::vehicle::{KnownModeIcons, DEFAULT_ICON_KEY, DEFAULT_ICON_MODES};

pub use keys::ConfigKey;

/// Default backend base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Errors from loading, saving, or editing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file is not valid INI.
    #[error("failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// A key has a value that fails validation.
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// The key name is not recognized.
    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),
}

/// `[backend]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendSettings {
    pub base_url: String,
    pub all_vehicles_path: String,
    /// Path template; `{id}` is replaced by the vehicle id.
    pub vehicle_path: String,
    /// Request timeout in seconds.
    pub timeout: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            all_vehicles_path: DEFAULT_ALL_VEHICLES_PATH.to_string(),
            vehicle_path: DEFAULT_VEHICLE_PATH.to_string(),
            timeout: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// `[polling]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct PollingSettings {
    pub interval_ms: u64,
    pub single_interval_ms: u64,
    /// Seconds a vehicle missing from ALL payloads is kept; `None` keeps it.
    pub retain_missing_secs: Option<u64>,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_ALL_INTERVAL.as_millis() as u64,
            single_interval_ms: DEFAULT_SINGLE_INTERVAL.as_millis() as u64,
            retain_missing_secs: None,
        }
    }
}

/// `[walking]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct WalkingSettings {
    pub speed_mps: f64,
}

impl Default for WalkingSettings {
    fn default() -> Self {
        Self {
            speed_mps: DEFAULT_WALKING_SPEED_MPS,
        }
    }
}

/// `[user]` section: a fixed user position, for setups without geolocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserSettings {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl UserSettings {
    /// The configured position, if both coordinates are set.
    pub fn position(&self) -> Option<Position> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Position::new(lat, lon)),
            _ => None,
        }
    }
}

/// `[icons]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct IconSettings {
    /// Modes with a dedicated icon.
    pub modes: Vec<String>,
    /// Icon key for any other mode.
    pub default: String,
}

impl Default for IconSettings {
    fn default() -> Self {
        Self {
            modes: DEFAULT_ICON_MODES.iter().map(|m| m.to_string()).collect(),
            default: DEFAULT_ICON_KEY.to_string(),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
    pub directory: PathBuf,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            directory: default_log_directory(),
        }
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub backend: BackendSettings,
    pub polling: PollingSettings,
    pub walking: WalkingSettings,
    pub user: UserSettings,
    pub icons: IconSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Load from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(source) => ConfigError::Read {
                path: path.to_path_buf(),
                source,
            },
            ini::Error::Parse(e) => ConfigError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        })?;

        Self::from_ini(&ini)
    }

    /// Build from parsed INI data; missing keys keep their defaults.
    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for key in ConfigKey::all() {
            let raw = ini
                .section(Some(key.section()))
                .and_then(|section| section.get(key.key_name()));
            if let Some(raw) = raw {
                key.set(&mut config, raw)?;
            }
        }
        Ok(config)
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Save every key to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        self.to_ini().write_to_file(path).map_err(write_err)
    }

    /// Render as INI data.
    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            ini.with_section(Some(key.section()))
                .set(key.key_name(), key.get(self));
        }
        ini
    }

    /// Endpoint configuration for the HTTP source.
    pub fn source_config(&self) -> HttpSourceConfig {
        HttpSourceConfig::new(self.backend.base_url.clone())
            .with_all_vehicles_path(self.backend.all_vehicles_path.clone())
            .with_vehicle_path(self.backend.vehicle_path.clone())
    }

    /// HTTP request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.timeout)
    }

    /// Scheduler configuration.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::new()
            .with_walking_speed(self.walking.speed_mps)
            .with_retain_missing_for(self.polling.retain_missing_secs.map(Duration::from_secs))
            .with_all_interval(Duration::from_millis(self.polling.interval_ms))
            .with_single_interval(Duration::from_millis(self.polling.single_interval_ms))
    }

    /// Icon resolver for the configured modes.
    pub fn icon_resolver(&self) -> KnownModeIcons {
        KnownModeIcons::new(self.icons.modes.iter(), self.icons.default.clone())
    }
}

/// Path of the configuration file.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("transitwatch")
        .join("config.ini")
}

/// Default directory for log files.
pub fn default_log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("transitwatch")
        .join("logs")
}
