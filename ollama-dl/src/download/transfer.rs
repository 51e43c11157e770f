//! Blob transfer unit: one descriptor, resumable, retried, atomically committed.
//!
//! Each attempt:
//!
//! 1. creates the staging file's directory,
//! 2. opens `<destination>.tmp` for append and takes its length as the
//!    resume offset,
//! 3. fetches the source from that offset,
//! 4. accepts only 200 or 206,
//! 5. streams chunks into the staging file while reporting progress,
//! 6. on a clean end of stream, syncs and renames staging → destination.
//!
//! Resume state is nothing more than the staging file's length, so a crash
//! or restart simply picks up where the file ends. The rename is the only
//! commit point: the destination either does not exist or is complete.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::FetchConfig;
use super::descriptor::{DownloadDescriptor, JobId};
use super::progress::{ProgressSink, ProgressThrottle};
use super::report::JobOutcome;
use super::transport::{BlobTransport, STATUS_OK, STATUS_PARTIAL_CONTENT};
use crate::error::{TransferError, TransferResult};

/// Buffer size for staging file writes (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Ephemeral per-attempt state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferAttempt {
    /// Destination plus the staging suffix.
    pub staging: PathBuf,
    /// Staging file length when the attempt started.
    pub resume_offset: u64,
    /// 1-based attempt number.
    pub number: u32,
}

/// Performs the transfer of single descriptors.
///
/// Cheap to clone; clones share the transport and configuration.
#[derive(Clone)]
pub struct BlobTransfer {
    transport: Arc<dyn BlobTransport>,
    config: Arc<FetchConfig>,
}

impl BlobTransfer {
    pub fn new(transport: Arc<dyn BlobTransport>, config: FetchConfig) -> Self {
        Self {
            transport,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Transfer `descriptor`, retrying retryable failures up to the policy's bound.
    ///
    /// Never leaves a partial file at the destination. On failure the staging
    /// file is kept for a later resume.
    pub async fn transfer(
        &self,
        job: JobId,
        descriptor: &DownloadDescriptor,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> JobOutcome {
        let max_attempts = self.config.retry.max_attempts();
        let mut attempt = 1;

        loop {
            if cancel.is_cancelled() {
                return JobOutcome::Failed {
                    reason: TransferError::Cancelled,
                    attempts: attempt - 1,
                };
            }

            match self.attempt(job, descriptor, attempt, sink, cancel).await {
                Ok(bytes) => {
                    info!(
                        job = %job,
                        digest = %descriptor.digest,
                        bytes,
                        attempt,
                        destination = %descriptor.destination.display(),
                        "Blob committed"
                    );
                    return JobOutcome::Completed {
                        bytes,
                        attempts: attempt,
                    };
                }
                Err(e) if e.is_retryable() => {
                    if attempt >= max_attempts {
                        warn!(job = %job, digest = %descriptor.digest, attempts = attempt, error = %e, "Giving up on blob");
                        return JobOutcome::Failed {
                            reason: TransferError::RetriesExhausted {
                                attempts: attempt,
                                last_error: Box::new(e),
                            },
                            attempts: attempt,
                        };
                    }

                    warn!(job = %job, digest = %descriptor.digest, attempt, max_attempts, error = %e, "Attempt failed, retrying");

                    if let Some(delay) = self.config.retry.delay_for_attempt(attempt) {
                        if !delay.is_zero() {
                            tokio::select! {
                                _ = cancel.cancelled() => {
                                    return JobOutcome::Failed {
                                        reason: TransferError::Cancelled,
                                        attempts: attempt,
                                    };
                                }
                                _ = tokio::time::sleep(delay) => {}
                            }
                        }
                    }
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_local() {
                        error!(job = %job, destination = %descriptor.destination.display(), error = %e, "Local filesystem error, not retrying");
                    } else if !matches!(e, TransferError::Cancelled) {
                        warn!(job = %job, digest = %descriptor.digest, attempt, error = %e, "Blob failed");
                    }
                    return JobOutcome::Failed {
                        reason: e,
                        attempts: attempt,
                    };
                }
            }
        }
    }

    /// Run one attempt. Returns the committed size.
    async fn attempt(
        &self,
        job: JobId,
        descriptor: &DownloadDescriptor,
        number: u32,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> TransferResult<u64> {
        let staging = descriptor.staging_path(&self.config.staging_suffix);
        let file = prepare_staging(&staging).await?;
        let resume_offset = file
            .metadata()
            .await
            .map_err(|e| TransferError::OpenStagingFailed {
                path: staging.clone(),
                source: e,
            })?
            .len();

        let state = TransferAttempt {
            staging,
            resume_offset,
            number,
        };
        debug!(
            job = %job,
            attempt = state.number,
            offset = state.resume_offset,
            size = descriptor.size,
            staging = %state.staging.display(),
            "Starting attempt"
        );

        if state.resume_offset > descriptor.size {
            return Err(TransferError::StagingOversized {
                path: state.staging,
                len: state.resume_offset,
                expected: descriptor.size,
            });
        }

        if descriptor.size > 0 && state.resume_offset == descriptor.size {
            debug!(job = %job, "Staging file already complete");
            drop(file);
            commit(&state.staging, &descriptor.destination).await?;
            sink.progress(job, descriptor.size, descriptor.size);
            return Ok(descriptor.size);
        }

        let written = self
            .stream_to_staging(job, descriptor, &state, file, sink, cancel)
            .await?;

        commit(&state.staging, &descriptor.destination).await?;
        sink.progress(job, written, descriptor.size);
        Ok(written)
    }

    /// Fetch from the resume offset and append the body to the staging file.
    ///
    /// Returns the staging file's final length, synced to disk.
    async fn stream_to_staging(
        &self,
        job: JobId,
        descriptor: &DownloadDescriptor,
        state: &TransferAttempt,
        file: File,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> TransferResult<u64> {
        let url = descriptor.source.as_str();
        let size = descriptor.size;
        let mut offset = state.resume_offset;

        let response = self
            .guarded(url, cancel, self.transport.fetch(url, offset))
            .await?;

        match response.status {
            STATUS_PARTIAL_CONTENT => {}
            STATUS_OK if offset > 0 => {
                warn!(job = %job, offset, "Server ignored range request, restarting blob");
                file.set_len(0).await.map_err(|e| TransferError::WriteFailed {
                    path: state.staging.clone(),
                    source: e,
                })?;
                offset = 0;
            }
            STATUS_OK => {}
            status => {
                return Err(TransferError::UnexpectedStatus {
                    url: url.to_string(),
                    status,
                })
            }
        }

        let mut body = response.body;
        let mut writer = BufWriter::with_capacity(BUFFER_SIZE, file);
        let mut written = offset;
        let mut throttle = ProgressThrottle::new(self.config.progress_interval);

        if throttle.should_report(Instant::now()) {
            sink.progress(job, written, size);
        }

        loop {
            let read = async { Ok::<_, TransferError>(body.next().await) };
            let next = match self.guarded(url, cancel, read).await {
                Ok(next) => next,
                Err(e) => {
                    flush_partial(&mut writer, &state.staging).await;
                    return Err(e);
                }
            };

            let chunk = match next {
                None => break,
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    flush_partial(&mut writer, &state.staging).await;
                    return Err(e);
                }
            };

            let received = written + chunk.len() as u64;
            if received > size {
                flush_partial(&mut writer, &state.staging).await;
                return Err(TransferError::SizeOverflow {
                    expected: size,
                    received,
                });
            }

            writer
                .write_all(&chunk)
                .await
                .map_err(|e| TransferError::WriteFailed {
                    path: state.staging.clone(),
                    source: e,
                })?;
            written = received;

            if throttle.should_report(Instant::now()) {
                sink.progress(job, written, size);
            }
        }

        let write_failed = |e: std::io::Error| TransferError::WriteFailed {
            path: state.staging.clone(),
            source: e,
        };
        writer.flush().await.map_err(write_failed)?;
        writer.into_inner().sync_all().await.map_err(write_failed)?;

        if written < size {
            return Err(TransferError::ShortBody {
                expected: size,
                received: written,
            });
        }
        Ok(written)
    }

    /// Await `fut`, bounded by the request timeout and aborted by `cancel`.
    async fn guarded<T>(
        &self,
        url: &str,
        cancel: &CancellationToken,
        fut: impl Future<Output = TransferResult<T>>,
    ) -> TransferResult<T> {
        let timeout = self.config.request_timeout;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransferError::Cancelled),
            result = tokio::time::timeout(timeout, fut) => match result {
                Ok(inner) => inner,
                Err(_) => Err(TransferError::Timeout {
                    url: url.to_string(),
                    timeout,
                }),
            },
        }
    }
}

/// Create the staging directory and open the staging file for append.
async fn prepare_staging(staging: &Path) -> TransferResult<File> {
    if let Some(parent) = staging.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| TransferError::CreateDirFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(staging)
        .await
        .map_err(|e| TransferError::OpenStagingFailed {
            path: staging.to_path_buf(),
            source: e,
        })
}

/// Push buffered bytes to the staging file after an interrupted stream.
///
/// Only whole chunks sit in the buffer, so whatever reaches disk is still a
/// prefix of the blob.
async fn flush_partial(writer: &mut BufWriter<File>, staging: &Path) {
    if let Err(e) = writer.flush().await {
        warn!(staging = %staging.display(), error = %e, "Failed to flush partial staging file");
    }
}

/// Atomically move the staging file to its destination.
async fn commit(staging: &Path, destination: &Path) -> TransferResult<()> {
    fs::rename(staging, destination)
        .await
        .map_err(|e| TransferError::CommitFailed {
            staging: staging.to_path_buf(),
            destination: destination.to_path_buf(),
            source: e,
        })
}
