//! Error types for manifest resolution and blob transfers.
//!
//! Errors are split along the line that decides what the engine does next:
//!
//! - [`ResolveError`] aborts the whole run before any job is dispatched.
//! - [`TransferError`] is scoped to a single job. Its [`TransferError::is_retryable`]
//!   classification tells the transfer unit whether to spend another attempt
//!   or give up on the job immediately.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type for resolver operations.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Result type for transfer operations.
pub type TransferResult<T> = Result<T, TransferError>;

/// Errors raised while turning a model reference into download descriptors.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The model reference could not be parsed.
    #[error("invalid model reference '{reference}': {reason}")]
    InvalidReference { reference: String, reason: String },

    /// The manifest request did not complete.
    #[error("failed to fetch manifest from {url}: {reason}")]
    ManifestFetch { url: String, reason: String },

    /// The registry answered with a non-200 status.
    #[error("failed to get manifest from {url}: HTTP {status}")]
    ManifestStatus { url: String, status: u16 },

    /// The manifest body was not valid JSON for the expected schema.
    #[error("failed to parse manifest from {url}: {reason}")]
    ManifestParse { url: String, reason: String },

    /// The manifest uses a media type this tool does not understand.
    #[error("unexpected media type for manifest: {0}")]
    UnsupportedManifest(String),

    /// A layer digest does not have the `sha256:<hex>` shape.
    #[error("unexpected digest: {0}")]
    InvalidDigest(String),

    /// The HTTP client could not be constructed.
    #[error("failed to create HTTP client: {0}")]
    HttpClient(String),
}

/// Errors raised by a single blob transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Connection, TLS or mid-stream read failure.
    #[error("transport error for {url}: {reason}")]
    Transport { url: String, reason: String },

    /// No response or no body chunk arrived within the request timeout.
    #[error("request to {url} timed out after {}s", timeout.as_secs())]
    Timeout { url: String, timeout: Duration },

    /// The server answered with something other than 200 or 206.
    #[error("unexpected status code: {status}")]
    UnexpectedStatus { url: String, status: u16 },

    /// The stream delivered more bytes than the descriptor promised.
    #[error("received {received} bytes for a blob of {expected} bytes")]
    SizeOverflow { expected: u64, received: u64 },

    /// The stream ended cleanly before the expected size was reached.
    #[error("stream ended after {received} of {expected} bytes")]
    ShortBody { expected: u64, received: u64 },

    /// A staging file left on disk is already longer than the blob.
    ///
    /// Retrying cannot fix this; the file has to be removed by hand.
    #[error("staging file {} holds {len} bytes, more than the expected {expected}", path.display())]
    StagingOversized { path: PathBuf, len: u64, expected: u64 },

    /// The staging file's parent directory could not be created.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDirFailed { path: PathBuf, source: io::Error },

    /// The staging file could not be opened or inspected.
    #[error("failed to open staging file {}: {source}", path.display())]
    OpenStagingFailed { path: PathBuf, source: io::Error },

    /// Appending to the staging file failed.
    #[error("failed to write {}: {source}", path.display())]
    WriteFailed { path: PathBuf, source: io::Error },

    /// The atomic rename from staging to destination failed.
    #[error("failed to commit {} -> {}: {source}", staging.display(), destination.display())]
    CommitFailed {
        staging: PathBuf,
        destination: PathBuf,
        source: io::Error,
    },

    /// The job was cancelled by a shutdown request.
    #[error("download cancelled")]
    Cancelled,

    /// Another descriptor in the same run already targets this path.
    #[error("duplicate destination {}", .0.display())]
    DuplicateDestination(PathBuf),

    /// The task running the transfer panicked.
    #[error("transfer task panicked: {0}")]
    TaskPanicked(String),

    /// Every attempt failed with a retryable error.
    #[error("max retries reached after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        last_error: Box<TransferError>,
    },
}

impl TransferError {
    /// Whether another attempt may succeed.
    ///
    /// Network-side failures are retryable. Local filesystem failures are not
    /// expected to heal by themselves and end the job straight away.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::Timeout { .. }
                | Self::UnexpectedStatus { .. }
                | Self::SizeOverflow { .. }
                | Self::ShortBody { .. }
        )
    }

    /// Whether this error is a local resource failure.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::CreateDirFailed { .. }
                | Self::StagingOversized { .. }
                | Self::OpenStagingFailed { .. }
                | Self::WriteFailed { .. }
                | Self::CommitFailed { .. }
        )
    }
}
