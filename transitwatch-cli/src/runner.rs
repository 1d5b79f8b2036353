//! Shared setup for long-running commands.

use std::path::Path;

use transitwatch::config::ConfigFile;
use transitwatch::logging::{init_logging, WorkerGuard};

use crate::error::CliError;

/// Loaded configuration plus the logging guard held for the process
/// lifetime.
pub struct CliRunner {
    config: ConfigFile,
    _log_guard: WorkerGuard,
}

impl CliRunner {
    /// Load configuration from `config_path` and install logging.
    pub fn new(config_path: &Path, verbose: bool) -> Result<Self, CliError> {
        let config = ConfigFile::load_from(config_path)?;
        let guard = init_logging(&config.logging, verbose)?;
        Ok(Self {
            config,
            _log_guard: guard,
        })
    }

    /// The loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log the command being started.
    pub fn log_startup(&self, command: &str) {
        tracing::info!(
            version = transitwatch::VERSION,
            command,
            backend = %self.config.backend.base_url,
            "TransitWatch starting"
        );
    }
}
