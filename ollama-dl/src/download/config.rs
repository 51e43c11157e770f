//! Configuration for the download engine.

use std::time::Duration;

use super::descriptor::DEFAULT_STAGING_SUFFIX;
use super::progress::DEFAULT_PROGRESS_INTERVAL;
use super::retry::RetryPolicy;

/// Default per-request timeout (headers, and each body read).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of transfers running at once.
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Settings shared by the orchestrator and every transfer unit.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Attempt bound and delay between attempts.
    pub retry: RetryPolicy,

    /// Bound on waiting for response headers and on each body chunk.
    ///
    /// This is an idle timeout, independent of total transfer time.
    pub request_timeout: Duration,

    /// Maximum concurrent transfers.
    pub max_concurrent: usize,

    /// Suffix appended to the destination to form the staging path.
    pub staging_suffix: String,

    /// Minimum interval between progress updates of one job.
    pub progress_interval: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            staging_suffix: DEFAULT_STAGING_SUFFIX.to_string(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl FetchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the attempt bound, keeping the current delay shape.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.retry = self.retry.with_max_attempts(attempts);
        self
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the concurrency bound (minimum 1).
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max.max(1);
        self
    }

    /// Set the staging suffix.
    pub fn with_staging_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.staging_suffix = suffix.into();
        self
    }

    /// Set the progress interval.
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }
}
