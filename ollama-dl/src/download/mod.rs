//! Resumable, concurrent blob download engine.
//!
//! This module provides:
//! - Single blob transfers with resume and atomic commit (`transfer`)
//! - Bounded fan-out over many blobs (`orchestrator`)
//! - Attempt bounds and backoff (`retry`)
//! - Push-based progress reporting (`progress`)
//! - The HTTP seam (`transport`)
//!
//! # Architecture
//!
//! ```text
//! JobOrchestrator
//!         │
//!         ├── precheck (skip existing, reject duplicates)
//!         │
//!         ├── sliding window of tokio tasks (max_concurrent)
//!         │       └── BlobTransfer (one per descriptor)
//!         │               ├── RetryPolicy
//!         │               ├── BlobTransport (trait)
//!         │               │       └── ReqwestTransport
//!         │               └── ProgressThrottle ──► ProgressSink
//!         │
//!         └── DownloadReport
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ollama_dl::download::{FetchConfig, JobOrchestrator, NoopProgress, ReqwestTransport};
//! use tokio_util::sync::CancellationToken;
//!
//! let transport = Arc::new(ReqwestTransport::new()?);
//! let orchestrator = JobOrchestrator::new(transport, FetchConfig::default());
//! let report = orchestrator
//!     .run(descriptors, Arc::new(NoopProgress), CancellationToken::new())
//!     .await;
//! println!("{} completed, {} failed", report.completed(), report.failed());
//! ```

mod config;
mod descriptor;
mod orchestrator;
mod progress;
mod report;
mod retry;
mod transfer;
mod transport;

pub use config::{FetchConfig, DEFAULT_MAX_CONCURRENT, DEFAULT_REQUEST_TIMEOUT};
pub use descriptor::{staging_path_for, DownloadDescriptor, JobId, DEFAULT_STAGING_SUFFIX};
pub use orchestrator::JobOrchestrator;
pub use progress::{
    NoopProgress, ProgressEvent, ProgressSink, ProgressThrottle,
    RecordingProgress, DEFAULT_PROGRESS_INTERVAL,
};
pub use report::{DownloadReport, JobOutcome, JobReport};
pub use retry::RetryPolicy;
pub use transfer::{BlobTransfer, TransferAttempt};
pub use transport::{
    BlobResponse, BlobTransport, BodyStream, BoxFuture, ReqwestTransport, DEFAULT_CONNECT_TIMEOUT,
    STATUS_OK, STATUS_PARTIAL_CONTENT,
};
