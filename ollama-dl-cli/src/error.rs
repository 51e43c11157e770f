//! CLI error type and exit codes.

use std::fmt;

use ollama_dl::config::ConfigError;
use ollama_dl::logging::LoggingError;
use ollama_dl::ResolveError;

/// Exit code for general failures (bad input, resolution, setup).
pub const EXIT_FAILURE: i32 = 1;

/// Exit code when the run finished but some blobs failed.
pub const EXIT_JOBS_FAILED: i32 = 2;

/// Exit code after Ctrl+C.
pub const EXIT_CANCELLED: i32 = 130;

/// Errors surfaced by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Configuration problem.
    Config(String),
    /// Reading or writing config.ini failed.
    ConfigFile(ConfigError),
    /// The model could not be resolved.
    Resolve(ResolveError),
    /// Runtime, HTTP client or logging setup failed.
    Setup(String),
    /// Some jobs failed; the count is reported.
    JobsFailed { failed: usize, total: usize },
    /// The run was interrupted.
    Cancelled,
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::JobsFailed { .. } => EXIT_JOBS_FAILED,
            CliError::Cancelled => EXIT_CANCELLED,
            _ => EXIT_FAILURE,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Resolve(e) => write!(f, "{}", e),
            CliError::Setup(msg) => write!(f, "{}", msg),
            CliError::JobsFailed { failed, total } => {
                write!(f, "{} of {} downloads failed", failed, total)
            }
            CliError::Cancelled => write!(f, "Download cancelled"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<ResolveError> for CliError {
    fn from(e: ResolveError) -> Self {
        CliError::Resolve(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Setup(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Cancelled.exit_code(), 130);
        assert_eq!(CliError::JobsFailed { failed: 1, total: 3 }.exit_code(), 2);
        assert_eq!(CliError::Config("x".to_string()).exit_code(), 1);
        assert_eq!(
            CliError::Resolve(ResolveError::InvalidDigest("md5:x".to_string())).exit_code(),
            1
        );
    }

    #[test]
    fn test_display() {
        let e = CliError::JobsFailed { failed: 1, total: 3 };
        assert_eq!(e.to_string(), "1 of 3 downloads failed");
    }
}
