//! Progress reporting for blob transfers.
//!
//! The engine pushes updates into a [`ProgressSink`] and never waits on it.
//! Implementations must return quickly; anything slow (terminal rendering)
//! belongs behind the sink, not in the transfer loop.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::descriptor::{DownloadDescriptor, JobId};
use super::report::JobOutcome;

/// Default minimum interval between two progress updates of one job.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Consumer of per-job progress updates.
pub trait ProgressSink: Send + Sync {
    /// A transfer unit is about to start on `descriptor`.
    fn job_started(&self, _job: JobId, _descriptor: &DownloadDescriptor) {}

    /// Cumulative bytes on disk for `job`, including any resumed prefix.
    ///
    /// Not monotonic: when a server answers a range request with the full
    /// body, the job restarts and `bytes` drops back to 0.
    fn progress(&self, job: JobId, bytes: u64, total: u64);

    /// The job reached its final state.
    fn job_finished(&self, _job: JobId, _outcome: &JobOutcome) {}
}

/// Sink that discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn progress(&self, _job: JobId, _bytes: u64, _total: u64) {}
}

/// Rate limiter for a single job's progress updates.
///
/// Owned by one transfer unit; never shared.
#[derive(Debug)]
pub struct ProgressThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Whether an update at `now` should be forwarded. The first call always is.
    pub fn should_report(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// One recorded sink event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started { job: JobId },
    Progress { job: JobId, bytes: u64, total: u64 },
    Finished { job: JobId, completed: bool },
}

/// Sink that records every event, for assertions in tests.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events so far.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Byte offsets reported for `job`, in order.
    pub fn offsets(&self, job: JobId) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::Progress { job: j, bytes, .. } if j == job => Some(bytes),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}

impl ProgressSink for RecordingProgress {
    fn job_started(&self, job: JobId, _descriptor: &DownloadDescriptor) {
        self.push(ProgressEvent::Started { job });
    }

    fn progress(&self, job: JobId, bytes: u64, total: u64) {
        self.push(ProgressEvent::Progress { job, bytes, total });
    }

    fn job_finished(&self, job: JobId, outcome: &JobOutcome) {
        self.push(ProgressEvent::Finished {
            job,
            completed: outcome.is_completed(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_first_update_passes() {
        let mut throttle = ProgressThrottle::new(Duration::from_secs(1));
        assert!(throttle.should_report(Instant::now()));
    }

    #[test]
    fn test_throttle_suppresses_within_interval() {
        let mut throttle = ProgressThrottle::new(Duration::from_millis(100));
        let start = Instant::now();
        assert!(throttle.should_report(start));
        assert!(!throttle.should_report(start + Duration::from_millis(50)));
        assert!(throttle.should_report(start + Duration::from_millis(150)));
    }

    #[test]
    fn test_zero_interval_reports_everything() {
        let mut throttle = ProgressThrottle::new(Duration::ZERO);
        let now = Instant::now();
        assert!(throttle.should_report(now));
        assert!(throttle.should_report(now));
    }

    #[test]
    fn test_recording_offsets() {
        let sink = RecordingProgress::new();
        sink.progress(JobId(0), 10, 30);
        sink.progress(JobId(1), 5, 5);
        sink.progress(JobId(0), 30, 30);
        assert_eq!(sink.offsets(JobId(0)), vec![10, 30]);
        assert_eq!(sink.events().len(), 3);
    }
}
