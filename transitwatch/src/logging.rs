//! Logging setup.
//!
//! Installs a global `tracing` subscriber that writes to a daily-rolling log
//! file, optionally mirrored to stderr. `RUST_LOG` overrides the configured
//! level.

use std::path::PathBuf;

use thiserror::Error;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingSettings;

pub use tracing_appender::non_blocking::WorkerGuard;

/// Log file name prefix; the appender adds the date.
pub const LOG_FILE_PREFIX: &str = "transitwatch.log";

/// Errors from installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to create log directory {}: {source}", path.display())]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to install tracing subscriber: {0}")]
    Init(String),
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer when dropped; hold it for the
/// lifetime of the process.
pub fn init_logging(settings: &LoggingSettings, verbose: bool) -> Result<WorkerGuard, LoggingError> {
    std::fs::create_dir_all(&settings.directory).map_err(|source| {
        LoggingError::CreateDirectory {
            path: settings.directory.clone(),
            source,
        }
    })?;

    let appender = tracing_appender::rolling::daily(&settings.directory, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.level));

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_timer(ChronoLocal::rfc_3339());

    let stderr_layer = verbose.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_timer(ChronoLocal::rfc_3339())
            .compact()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    tracing::info!(
        version = crate::VERSION,
        directory = %settings.directory.display(),
        level = %settings.level,
        "Logging initialized"
    );

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_directory_and_rejects_second_install() {
        let dir = TempDir::new().unwrap();
        let settings = LoggingSettings {
            level: "debug".to_string(),
            directory: dir.path().join("logs"),
        };

        let guard = init_logging(&settings, false).unwrap();
        assert!(settings.directory.is_dir());

        assert!(matches!(
            init_logging(&settings, false),
            Err(LoggingError::Init(_))
        ));
        drop(guard);
    }
}
