//! Terminal progress rendering with one `indicatif` bar per blob.

use std::collections::HashMap;
use std::sync::Mutex;

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use ollama_dl::download::{DownloadDescriptor, JobId, JobOutcome, ProgressSink};

const BAR_TEMPLATE: &str =
    "{msg:<28} [{bar:30.cyan/blue}] {bytes:>10}/{total_bytes:<10} {bytes_per_sec:>12} {eta:>4}";

/// [`ProgressSink`] drawing a bar per running job.
pub struct TerminalProgress {
    multi: MultiProgress,
    bars: Mutex<HashMap<JobId, ProgressBar>>,
    style: ProgressStyle,
}

impl TerminalProgress {
    /// Draw to stderr, or nowhere when stderr is not a terminal.
    pub fn new() -> Self {
        let target = if console::Term::stderr().is_term() {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        Self::with_draw_target(target)
    }

    pub fn with_draw_target(target: ProgressDrawTarget) -> Self {
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: Mutex::new(HashMap::new()),
            style,
        }
    }

    fn bars(&self) -> std::sync::MutexGuard<'_, HashMap<JobId, ProgressBar>> {
        self.bars.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of bars still drawn.
    pub fn active(&self) -> usize {
        self.bars().len()
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for TerminalProgress {
    fn job_started(&self, job: JobId, descriptor: &DownloadDescriptor) {
        let bar = self.multi.add(ProgressBar::new(descriptor.size));
        bar.set_style(self.style.clone());
        let name = descriptor
            .destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| descriptor.digest.short().to_string());
        bar.set_message(name);
        self.bars().insert(job, bar);
    }

    fn progress(&self, job: JobId, bytes: u64, total: u64) {
        if let Some(bar) = self.bars().get(&job) {
            bar.set_length(total);
            bar.set_position(bytes);
        }
    }

    fn job_finished(&self, job: JobId, outcome: &JobOutcome) {
        let Some(bar) = self.bars().remove(&job) else {
            return;
        };
        match outcome {
            JobOutcome::Completed { .. } => bar.finish(),
            JobOutcome::Failed { .. } => {
                bar.abandon_with_message(format!("{} {}", style("failed").red(), bar.message()));
            }
            JobOutcome::Skipped => bar.finish_and_clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ollama_dl::error::TransferError;
    use ollama_dl::registry::{Digest, LayerKind};

    fn descriptor() -> DownloadDescriptor {
        DownloadDescriptor::new(
            Digest::parse("sha256:0123456789abcdef").unwrap(),
            "http://r/blob",
            "/tmp/model-0123456789ab.gguf",
            1000,
            LayerKind::Model,
        )
    }

    #[test]
    fn test_bars_follow_job_lifecycle() {
        let progress = TerminalProgress::with_draw_target(ProgressDrawTarget::hidden());
        progress.job_started(JobId(0), &descriptor());
        progress.job_started(JobId(1), &descriptor());
        progress.progress(JobId(0), 500, 1000);
        assert_eq!(progress.active(), 2);

        progress.job_finished(JobId(0), &JobOutcome::Completed { bytes: 1000, attempts: 1 });
        progress.job_finished(
            JobId(1),
            &JobOutcome::Failed {
                reason: TransferError::Cancelled,
                attempts: 1,
            },
        );
        assert_eq!(progress.active(), 0);
    }

    #[test]
    fn test_unknown_job_is_ignored() {
        let progress = TerminalProgress::with_draw_target(ProgressDrawTarget::hidden());
        progress.progress(JobId(7), 1, 2);
        progress.job_finished(JobId(7), &JobOutcome::Skipped);
        assert_eq!(progress.active(), 0);
    }
}
