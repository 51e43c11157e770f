//! Job orchestrator: fans descriptors out to transfer units and joins them.
//!
//! # Design
//!
//! The orchestrator keeps a sliding window of spawned transfer tasks:
//! 1. Pre-check every descriptor (existing destination, then duplicate path)
//! 2. Spawn up to `max_concurrent` transfers
//! 3. As each one finishes, record its outcome and spawn the next
//! 4. On cancellation, stop spawning and drain what is in flight
//!
//! A failing job never cancels its siblings; each job carries its own child
//! of the run's cancellation token.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::config::FetchConfig;
use super::descriptor::{DownloadDescriptor, JobId};
use super::progress::ProgressSink;
use super::report::{DownloadReport, JobOutcome, JobReport};
use super::transfer::BlobTransfer;
use super::transport::BlobTransport;
use crate::error::TransferError;

/// Runs a set of descriptors to completion on a bounded worker pool.
#[derive(Clone)]
pub struct JobOrchestrator {
    transfer: BlobTransfer,
}

impl JobOrchestrator {
    pub fn new(transport: Arc<dyn BlobTransport>, config: FetchConfig) -> Self {
        Self {
            transfer: BlobTransfer::new(transport, config),
        }
    }

    pub fn config(&self) -> &FetchConfig {
        self.transfer.config()
    }

    /// Download every descriptor and report each job's outcome.
    ///
    /// Job ids are positions in `descriptors`; the report is ordered by id
    /// regardless of completion order.
    pub async fn run(
        &self,
        descriptors: Vec<DownloadDescriptor>,
        sink: Arc<dyn ProgressSink>,
        cancel: CancellationToken,
    ) -> DownloadReport {
        let total = descriptors.len();
        let max_concurrent = self.config().max_concurrent.max(1);

        let mut outcomes: Vec<Option<JobOutcome>> = (0..total).map(|_| None).collect();
        let slots: Vec<(PathBuf, u64)> = descriptors
            .iter()
            .map(|d| (d.destination.clone(), d.size))
            .collect();

        let queue = self
            .precheck(descriptors, &mut outcomes, sink.as_ref())
            .await;
        let skipped = outcomes.iter().flatten().filter(|o| o.is_skipped()).count();
        info!(
            total,
            skipped,
            queued = queue.len(),
            max_concurrent,
            "Starting downloads"
        );

        let mut queue = queue.into_iter();
        let mut pending = FuturesUnordered::new();

        for (job, descriptor) in queue.by_ref().take(max_concurrent) {
            pending.push(self.spawn(job, descriptor, &sink, &cancel));
        }

        while let Some((job, joined)) = pending.next().await {
            let outcome = joined.unwrap_or_else(|e| {
                error!(job = %job, error = %e, "Transfer task failed to join");
                JobOutcome::Failed {
                    reason: TransferError::TaskPanicked(e.to_string()),
                    attempts: 0,
                }
            });
            sink.job_finished(job, &outcome);
            outcomes[job.0] = Some(outcome);

            if cancel.is_cancelled() {
                continue;
            }
            if let Some((job, descriptor)) = queue.next() {
                pending.push(self.spawn(job, descriptor, &sink, &cancel));
            }
        }

        let was_cancelled = cancel.is_cancelled();
        for (job, _) in queue {
            let outcome = JobOutcome::Failed {
                reason: TransferError::Cancelled,
                attempts: 0,
            };
            sink.job_finished(job, &outcome);
            outcomes[job.0] = Some(outcome);
        }

        let jobs: Vec<JobReport> = outcomes
            .into_iter()
            .zip(slots)
            .enumerate()
            .map(|(id, (outcome, (destination, size)))| JobReport {
                id: JobId(id),
                destination,
                size,
                // Every slot is filled by precheck, a joined task, or the drain above.
                outcome: outcome.unwrap_or(JobOutcome::Failed {
                    reason: TransferError::Cancelled,
                    attempts: 0,
                }),
            })
            .collect();

        let report = DownloadReport {
            jobs,
            was_cancelled,
        };
        info!(
            completed = report.completed(),
            skipped = report.skipped(),
            failed = report.failed(),
            bytes = report.bytes_transferred(),
            was_cancelled,
            "Downloads finished"
        );
        report
    }

    /// Resolve jobs that never need a transfer and return the rest in order.
    ///
    /// An existing destination always means `Skipped`. A later descriptor for
    /// a destination already claimed in this run is `Skipped` when it names the
    /// same blob, and `Failed(DuplicateDestination)` otherwise.
    async fn precheck(
        &self,
        descriptors: Vec<DownloadDescriptor>,
        outcomes: &mut [Option<JobOutcome>],
        sink: &dyn ProgressSink,
    ) -> Vec<(JobId, DownloadDescriptor)> {
        let mut claimed: HashMap<PathBuf, JobId> = HashMap::new();
        let mut queue: Vec<(JobId, DownloadDescriptor)> = Vec::with_capacity(descriptors.len());

        for (index, descriptor) in descriptors.into_iter().enumerate() {
            let job = JobId(index);

            // An unreadable path is left for the transfer to report.
            let exists = tokio::fs::try_exists(&descriptor.destination)
                .await
                .unwrap_or(false);
            if exists {
                debug!(job = %job, destination = %descriptor.destination.display(), "Destination exists, skipping");
                sink.job_finished(job, &JobOutcome::Skipped);
                outcomes[index] = Some(JobOutcome::Skipped);
                continue;
            }

            if let Some(&owner) = claimed.get(&descriptor.destination) {
                let same_blob = queue
                    .iter()
                    .find(|(id, _)| *id == owner)
                    .is_some_and(|(_, first)| {
                        first.digest == descriptor.digest && first.source == descriptor.source
                    });

                let outcome = if same_blob {
                    debug!(job = %job, owner = %owner, "Blob already queued for this destination, skipping");
                    JobOutcome::Skipped
                } else {
                    error!(job = %job, owner = %owner, destination = %descriptor.destination.display(), "Duplicate destination");
                    JobOutcome::Failed {
                        reason: TransferError::DuplicateDestination(descriptor.destination.clone()),
                        attempts: 0,
                    }
                };
                sink.job_finished(job, &outcome);
                outcomes[index] = Some(outcome);
                continue;
            }

            claimed.insert(descriptor.destination.clone(), job);
            queue.push((job, descriptor));
        }

        queue
    }

    /// Spawn one transfer task and tag its join result with the job id.
    fn spawn(
        &self,
        job: JobId,
        descriptor: DownloadDescriptor,
        sink: &Arc<dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = (JobId, Result<JobOutcome, tokio::task::JoinError>)>
    {
        let transfer = self.transfer.clone();
        let sink = Arc::clone(sink);
        let token = cancel.child_token();

        let handle = tokio::spawn(async move {
            sink.job_started(job, &descriptor);
            transfer
                .transfer(job, &descriptor, sink.as_ref(), &token)
                .await
        });

        async move { (job, handle.await) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::progress::{NoopProgress, ProgressEvent, RecordingProgress};
    use crate::download::retry::RetryPolicy;
    use crate::download::transport::tests::{MockBehavior, MockTransport};
    use crate::download::transport::{BlobResponse, BoxFuture};
    use crate::error::TransferResult;
    use crate::registry::{Digest, LayerKind};
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    fn url(n: usize) -> String {
        format!("http://registry.test/blobs/sha256:{:012x}", n)
    }

    fn descriptor(dir: &Path, n: usize, size: u64) -> DownloadDescriptor {
        DownloadDescriptor::new(
            Digest::parse(&format!("sha256:{:016x}", n)).unwrap(),
            url(n),
            dir.join(format!("blob-{}", n)),
            size,
            LayerKind::Model,
        )
    }

    fn config() -> FetchConfig {
        FetchConfig::new()
            .with_retry(RetryPolicy::immediate(10))
            .with_progress_interval(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_empty_run() {
        let orchestrator = JobOrchestrator::new(Arc::new(MockTransport::new()), config());
        let report = orchestrator
            .run(Vec::new(), Arc::new(NoopProgress), CancellationToken::new())
            .await;
        assert!(report.jobs.is_empty());
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let dir = TempDir::new().unwrap();
        let mock = Arc::new(
            MockTransport::new()
                .with_blob(&url(0), vec![1; 40], MockBehavior::Serve)
                .with_blob(&url(1), vec![2; 40], MockBehavior::Status(500))
                .with_blob(&url(2), vec![3; 40], MockBehavior::Serve),
        );
        let descriptors = (0..3).map(|n| descriptor(dir.path(), n, 40)).collect();

        let report = JobOrchestrator::new(mock.clone(), config())
            .run(descriptors, Arc::new(NoopProgress), CancellationToken::new())
            .await;

        assert_eq!(report.completed(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.job(JobId(1)).unwrap().outcome.attempts(), 10);
        assert_eq!(mock.calls_for(&url(1)), 10);
        assert!(!dir.path().join("blob-1").exists());
        assert!(dir.path().join("blob-0").exists());
        assert!(dir.path().join("blob-2").exists());
    }

    #[tokio::test]
    async fn test_existing_destination_is_skipped() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("blob-0"), b"short").unwrap();
        let mock = Arc::new(MockTransport::new().with_blob(&url(0), vec![0; 40], MockBehavior::Serve));

        let report = JobOrchestrator::new(mock.clone(), config())
            .run(
                vec![descriptor(dir.path(), 0, 40)],
                Arc::new(NoopProgress),
                CancellationToken::new(),
            )
            .await;

        assert_eq!(report.skipped(), 1);
        assert!(mock.calls().is_empty());
        assert_eq!(std::fs::read(dir.path().join("blob-0")).unwrap(), b"short");
    }

    #[tokio::test]
    async fn test_duplicate_destination_rejected() {
        let dir = TempDir::new().unwrap();
        let mock = Arc::new(
            MockTransport::new()
                .with_blob(&url(0), vec![0; 16], MockBehavior::Serve)
                .with_blob(&url(1), vec![1; 16], MockBehavior::Serve),
        );
        let first = descriptor(dir.path(), 0, 16);
        let mut second = descriptor(dir.path(), 1, 16);
        second.destination = first.destination.clone();

        let report = JobOrchestrator::new(mock.clone(), config())
            .run(vec![first, second], Arc::new(NoopProgress), CancellationToken::new())
            .await;

        assert!(report.job(JobId(0)).unwrap().outcome.is_completed());
        assert!(matches!(
            report.job(JobId(1)).unwrap().outcome,
            JobOutcome::Failed {
                reason: TransferError::DuplicateDestination(_),
                attempts: 0
            }
        ));
        assert_eq!(mock.calls(), vec![(url(0), 0)]);
        assert_eq!(std::fs::read(dir.path().join("blob-0")).unwrap(), vec![0; 16]);
    }

    #[tokio::test]
    async fn test_repeated_blob_downloads_once() {
        let dir = TempDir::new().unwrap();
        let mock = Arc::new(MockTransport::new().with_blob(&url(0), vec![7; 16], MockBehavior::Serve));
        let first = descriptor(dir.path(), 0, 16);
        let second = first.clone();

        let report = JobOrchestrator::new(mock.clone(), config())
            .run(vec![first, second], Arc::new(NoopProgress), CancellationToken::new())
            .await;

        assert!(report.job(JobId(0)).unwrap().outcome.is_completed());
        assert!(report.job(JobId(1)).unwrap().outcome.is_skipped());
        assert!(!report.has_failures());
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_existing_destination_wins_over_duplicate() {
        let dir = TempDir::new().unwrap();
        let first = descriptor(dir.path(), 0, 16);
        let mut other = descriptor(dir.path(), 1, 16);
        other.destination = first.destination.clone();
        std::fs::write(&first.destination, vec![0; 16]).unwrap();
        let mock = Arc::new(MockTransport::new());

        let report = JobOrchestrator::new(mock.clone(), config())
            .run(
                vec![first.clone(), first, other],
                Arc::new(NoopProgress),
                CancellationToken::new(),
            )
            .await;

        assert_eq!(report.skipped(), 3);
        assert!(report.is_complete());
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_report_is_ordered_and_sink_sees_every_job() {
        let dir = TempDir::new().unwrap();
        let mut mock = MockTransport::new();
        for n in 0..6 {
            mock = mock.with_blob(&url(n), vec![n as u8; 24 + n], MockBehavior::Serve);
        }
        let descriptors = (0..6)
            .map(|n| descriptor(dir.path(), n, 24 + n as u64))
            .collect();
        let sink = Arc::new(RecordingProgress::new());

        let report = JobOrchestrator::new(Arc::new(mock), config().with_max_concurrent(2))
            .run(descriptors, sink.clone(), CancellationToken::new())
            .await;

        let ids: Vec<usize> = report.jobs.iter().map(|j| j.id.0).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(report.completed(), 6);

        let events = sink.events();
        for n in 0..6 {
            assert!(events.contains(&ProgressEvent::Started { job: JobId(n) }));
            assert!(events.contains(&ProgressEvent::Finished {
                job: JobId(n),
                completed: true
            }));
        }
    }

    /// Transport that stalls every body, for cancellation tests.
    struct Stalling;

    impl BlobTransport for Stalling {
        fn fetch<'a>(&'a self, _url: &'a str, _offset: u64) -> BoxFuture<'a, TransferResult<BlobResponse>> {
            Box::pin(async move {
                Ok(BlobResponse {
                    status: 200,
                    body: futures::stream::pending().boxed(),
                })
            })
        }
    }

    #[tokio::test]
    async fn test_cancel_reports_unstarted_jobs() {
        let dir = TempDir::new().unwrap();
        let descriptors = (0..5).map(|n| descriptor(dir.path(), n, 10)).collect();
        let cancel = CancellationToken::new();
        let orchestrator = JobOrchestrator::new(Arc::new(Stalling), config().with_max_concurrent(2));

        let run = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                orchestrator
                    .run(descriptors, Arc::new(NoopProgress), cancel)
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        let report = run.await.unwrap();

        assert!(report.was_cancelled);
        assert_eq!(report.failed(), 5);
        for job in &report.jobs {
            assert!(matches!(
                job.outcome,
                JobOutcome::Failed {
                    reason: TransferError::Cancelled,
                    ..
                }
            ));
            assert!(!job.destination.exists());
        }
        assert_eq!(report.job(JobId(0)).unwrap().outcome.attempts(), 1);
        assert_eq!(report.job(JobId(4)).unwrap().outcome.attempts(), 0);
    }
}
