//! The `pull` command: resolve a model and download its blobs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use console::style;
use ollama_dl::config::{format_size, ConfigFile};
use ollama_dl::download::{
    DownloadReport, FetchConfig, JobOrchestrator, JobOutcome, ReqwestTransport,
};
use ollama_dl::logging::{init_logging, LoggingConfig};
use ollama_dl::{ModelReference, RegistryResolver};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::CliError;
use crate::progress::TerminalProgress;

/// Options shared by `pull` and the bare `ollama-dl <NAME>` form.
#[derive(Debug, Clone, Default, Args)]
pub struct PullOptions {
    /// Registry base URL (overrides registry.url)
    #[arg(long)]
    pub registry: Option<String>,

    /// Destination directory (default: <namespace>-<name>-<tag>)
    #[arg(short = 'd', long = "dir")]
    pub dir: Option<PathBuf>,

    /// Maximum concurrent blob downloads (overrides download.parallel)
    #[arg(long)]
    pub parallel: Option<usize>,

    /// Attempts per blob (overrides download.retries)
    #[arg(long)]
    pub retries: Option<u32>,

    /// Per-request timeout in seconds (overrides download.timeout)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Show debug logs on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

/// Arguments of the `pull` subcommand.
#[derive(Debug, Clone, Args)]
pub struct PullArgs {
    /// Model reference, e.g. llama3, llama3:8b or namespace/name:tag
    pub name: String,

    #[command(flatten)]
    pub options: PullOptions,
}

/// Effective settings after merging CLI options over config.ini.
#[derive(Debug, Clone)]
pub struct PullSettings {
    pub registry: String,
    pub destination: PathBuf,
    pub fetch: FetchConfig,
}

impl PullSettings {
    /// CLI values win over the config file, which wins over built-in defaults.
    pub fn resolve(
        reference: &ModelReference,
        options: &PullOptions,
        config: &ConfigFile,
    ) -> Result<Self, CliError> {
        let mut fetch = config.to_fetch_config();

        if let Some(parallel) = options.parallel {
            if parallel == 0 {
                return Err(CliError::Config("--parallel must be at least 1".to_string()));
            }
            fetch = fetch.with_max_concurrent(parallel);
        }
        if let Some(retries) = options.retries {
            if retries == 0 {
                return Err(CliError::Config("--retries must be at least 1".to_string()));
            }
            fetch = fetch.with_max_attempts(retries);
        }
        if let Some(timeout) = options.timeout {
            if timeout == 0 {
                return Err(CliError::Config("--timeout must be at least 1".to_string()));
            }
            fetch = fetch.with_request_timeout(Duration::from_secs(timeout));
        }

        Ok(Self {
            registry: options
                .registry
                .clone()
                .unwrap_or_else(|| config.registry.url.clone()),
            destination: options
                .dir
                .clone()
                .unwrap_or_else(|| reference.default_destination()),
            fetch,
        })
    }
}

/// Run the pull command.
pub fn run(name: &str, options: PullOptions) -> Result<(), CliError> {
    let config = ConfigFile::load()?;
    let reference = ModelReference::parse(name)?;
    let settings = PullSettings::resolve(&reference, &options, &config)?;

    let logging = init_logging(
        LoggingConfig::new(Some(config.logging.directory.clone())).with_verbose(options.verbose),
    )?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Setup(format!("Failed to start async runtime: {}", e)))?;

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("Received interrupt, stopping downloads...");
        handler_token.cancel();
    })
    .map_err(|e| CliError::Setup(format!("Failed to set signal handler: {}", e)))?;

    println!("Model:       {}", reference);
    println!("Registry:    {}", settings.registry);
    println!("Destination: {}", settings.destination.display());
    if let Some(path) = logging.log_file() {
        println!("Log:         {}", path.display());
    }
    println!();

    let report = runtime.block_on(download(&reference, &settings, cancel))?;

    print_summary(&report);
    exit_status(&report)
}

async fn download(
    reference: &ModelReference,
    settings: &PullSettings,
    cancel: CancellationToken,
) -> Result<DownloadReport, CliError> {
    let resolver = RegistryResolver::new(settings.registry.clone(), settings.fetch.request_timeout)?;

    let descriptors = tokio::select! {
        resolved = resolver.resolve(reference, &settings.destination) => resolved?,
        _ = cancel.cancelled() => return Err(CliError::Cancelled),
    };

    let total: u64 = descriptors.iter().map(|d| d.size).sum();
    println!(
        "Downloading {} blobs ({}) with up to {} in parallel",
        descriptors.len(),
        format_size(total),
        settings.fetch.max_concurrent
    );
    info!(model = %reference, blobs = descriptors.len(), total_bytes = total, "Starting pull");

    let transport = ReqwestTransport::with_connect_timeout(settings.fetch.request_timeout)
        .map_err(|e| CliError::Setup(format!("Failed to create HTTP client: {}", e)))?;
    let orchestrator = JobOrchestrator::new(Arc::new(transport), settings.fetch.clone());

    Ok(orchestrator
        .run(descriptors, Arc::new(TerminalProgress::new()), cancel)
        .await)
}

fn print_summary(report: &DownloadReport) {
    println!();
    println!("Summary");
    println!("───────");

    for job in &report.jobs {
        let name = job
            .destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| job.destination.display().to_string());

        match &job.outcome {
            JobOutcome::Completed { bytes, attempts } => {
                let retried = if *attempts > 1 {
                    format!(" after {} attempts", attempts)
                } else {
                    String::new()
                };
                println!(
                    "  {} {} ({}){}",
                    style("✓").green(),
                    name,
                    format_size(*bytes),
                    retried
                );
            }
            JobOutcome::Skipped => {
                println!("  {} {} (already present)", style("-").dim(), name);
            }
            JobOutcome::Failed { reason, .. } => {
                println!("  {} {}: {}", style("✗").red(), name, reason);
            }
        }
    }

    println!();
    println!(
        "  {} completed, {} skipped, {} failed, {} downloaded",
        report.completed(),
        report.skipped(),
        report.failed(),
        format_size(report.bytes_transferred())
    );
}

fn exit_status(report: &DownloadReport) -> Result<(), CliError> {
    if report.was_cancelled {
        return Err(CliError::Cancelled);
    }
    if report.has_failures() {
        return Err(CliError::JobsFailed {
            failed: report.failed(),
            total: report.jobs.len(),
        });
    }
    Ok(())
}
