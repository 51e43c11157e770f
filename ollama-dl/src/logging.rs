//! Tracing subscriber setup.
//!
//! Two layers are installed:
//! - stderr, filtered by `RUST_LOG` or the verbosity flag
//! - a non-blocking, daily-rotated file under the configured log directory
//!
//! The returned [`LoggingGuard`] flushes the file writer on drop and must be
//! kept alive for the whole process.

use std::path::PathBuf;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// File name prefix of the rolling log.
pub const LOG_FILE_NAME: &str = "ollama-dl.log";

/// Default filter for the stderr layer.
pub const DEFAULT_CONSOLE_FILTER: &str = "warn";

/// Filter for the stderr layer with `--verbose`.
pub const VERBOSE_CONSOLE_FILTER: &str = "ollama_dl=debug,info";

/// Default filter for the file layer.
pub const DEFAULT_FILE_FILTER: &str = "ollama_dl=debug,info";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to create log directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to install tracing subscriber: {0}")]
    Init(String),
}

/// Logging options.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory for the rolling log file; `None` disables file logging.
    pub directory: Option<PathBuf>,
    /// Raise the stderr level to debug.
    pub verbose: bool,
}

impl LoggingConfig {
    pub fn new(directory: Option<PathBuf>) -> Self {
        Self {
            directory,
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Keeps the background log writer alive.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
    log_file: Option<PathBuf>,
}

impl LoggingGuard {
    /// Path prefix of the rolling log file, if file logging is active.
    pub fn log_file(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }
}

/// Install the global subscriber.
///
/// Fails if a global subscriber is already set.
pub fn init_logging(config: LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let console_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if config.verbose => EnvFilter::new(VERBOSE_CONSOLE_FILTER),
        Err(_) => EnvFilter::new(DEFAULT_CONSOLE_FILTER),
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(LocalTime::rfc_3339())
        .with_target(config.verbose)
        .with_filter(console_filter);

    let (file_layer, guard, log_file) = match config.directory {
        Some(directory) => {
            std::fs::create_dir_all(&directory).map_err(|e| LoggingError::CreateDir {
                path: directory.clone(),
                source: e,
            })?;
            let appender = tracing_appender::rolling::daily(&directory, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(LocalTime::rfc_3339())
                .with_filter(EnvFilter::new(DEFAULT_FILE_FILTER));
            (Some(layer), Some(guard), Some(directory.join(LOG_FILE_NAME)))
        }
        None => (None, None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    Ok(LoggingGuard {
        _file: guard,
        log_file,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = LoggingConfig::new(Some(PathBuf::from("/tmp/logs"))).with_verbose(true);
        assert!(config.verbose);
        assert_eq!(config.directory, Some(PathBuf::from("/tmp/logs")));
    }

    // The only test in this crate that installs the global subscriber.
    #[test]
    fn test_init_reports_log_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let logs = dir.path().join("nested").join("logs");

        let guard = init_logging(LoggingConfig::new(Some(logs.clone()))).unwrap();

        assert!(logs.is_dir());
        assert_eq!(guard.log_file(), Some(&logs.join(LOG_FILE_NAME)));
    }

    #[test]
    fn test_filters_parse() {
        for directive in [DEFAULT_CONSOLE_FILTER, VERBOSE_CONSOLE_FILTER, DEFAULT_FILE_FILTER] {
            assert!(EnvFilter::try_new(directive).is_ok(), "{}", directive);
        }
    }
}
