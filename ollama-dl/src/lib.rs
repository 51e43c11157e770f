//! ollama-dl - Resumable model downloads from an Ollama registry
//!
//! This library resolves a model reference into its manifest layers and
//! downloads every layer blob concurrently, with byte-range resume, bounded
//! retries and atomic commit of each file.
//!
//! - [`registry`]: reference parsing, manifest fetch, descriptor mapping
//! - [`download`]: transfer units, orchestrator, progress sinks
//! - [`config`]: `~/.ollama-dl/config.ini`
//! - [`logging`]: tracing subscriber setup

pub mod config;
pub mod download;
pub mod error;
pub mod logging;
pub mod registry;

pub use download::{
    DownloadDescriptor, DownloadReport, FetchConfig, JobId, JobOrchestrator, JobOutcome,
    ProgressSink, RetryPolicy,
};
pub use error::{ResolveError, TransferError};
pub use registry::{ModelReference, RegistryResolver};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
