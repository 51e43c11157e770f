//! Job outcomes and the aggregate report of a run.

use std::path::PathBuf;

use super::descriptor::JobId;
use crate::error::TransferError;

/// Final state of one job.
#[derive(Debug)]
pub enum JobOutcome {
    /// The destination already existed; no transfer was started.
    Skipped,
    /// The blob was committed to its destination.
    Completed {
        /// Bytes in the committed file.
        bytes: u64,
        /// Attempts used, including the successful one.
        attempts: u32,
    },
    /// The job gave up.
    Failed {
        reason: TransferError,
        /// Attempts made before giving up; 0 if none started.
        attempts: u32,
    },
}

impl JobOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    /// Number of transfer attempts made for this job.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Skipped => 0,
            Self::Completed { attempts, .. } | Self::Failed { attempts, .. } => *attempts,
        }
    }
}

/// Outcome of one job, tagged with its identity.
#[derive(Debug)]
pub struct JobReport {
    pub id: JobId,
    pub destination: PathBuf,
    pub size: u64,
    pub outcome: JobOutcome,
}

/// Aggregate result of an orchestrator run, ordered by job id.
#[derive(Debug, Default)]
pub struct DownloadReport {
    pub jobs: Vec<JobReport>,
    /// Whether a shutdown request interrupted the run.
    pub was_cancelled: bool,
}

impl DownloadReport {
    pub fn completed(&self) -> usize {
        self.jobs.iter().filter(|j| j.outcome.is_completed()).count()
    }

    pub fn failed(&self) -> usize {
        self.jobs.iter().filter(|j| j.outcome.is_failed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.jobs.iter().filter(|j| j.outcome.is_skipped()).count()
    }

    /// Whether any job failed.
    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    /// Whether every job either completed or was skipped.
    pub fn is_complete(&self) -> bool {
        !self.was_cancelled && !self.has_failures()
    }

    /// Bytes committed during this run (skipped jobs excluded).
    pub fn bytes_transferred(&self) -> u64 {
        self.jobs
            .iter()
            .filter_map(|j| match j.outcome {
                JobOutcome::Completed { bytes, .. } => Some(bytes),
                _ => None,
            })
            .sum()
    }

    /// Failed jobs with their reasons.
    pub fn failures(&self) -> impl Iterator<Item = (&JobReport, &TransferError)> {
        self.jobs.iter().filter_map(|j| match &j.outcome {
            JobOutcome::Failed { reason, .. } => Some((j, reason)),
            _ => None,
        })
    }

    /// Look up a job by id.
    pub fn job(&self, id: JobId) -> Option<&JobReport> {
        self.jobs.iter().find(|j| j.id == id)
    }
}
