//! Per-job structured events.

use std::path::{Path, PathBuf};

use tracing::{error, info, warn, Span};

use mderiv_media::GenerationOutcome;

use crate::error::WorkerError;

/// Emits the lifecycle events of one job with its ID, kind and input.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    kind: &'static str,
    input: PathBuf,
}

impl JobLogger {
    pub fn new(job_id: &str, kind: &'static str, input: &Path) -> Self {
        Self {
            job_id: job_id.to_string(),
            kind,
            input: input.to_path_buf(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Span wrapping every event of the job.
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            kind = self.kind,
            input = %self.input.display()
        )
    }

    pub fn started(&self) {
        info!(job_id = %self.job_id, kind = self.kind, "Job started");
    }

    /// An artifact was published or already present.
    pub fn generated(&self, outcome: &GenerationOutcome) {
        info!(
            job_id = %self.job_id,
            kind = self.kind,
            outcome = outcome.as_str(),
            output = %outcome.path().display(),
            "Job finished"
        );
    }

    pub fn fingerprinted(&self, hash: u64) {
        info!(
            job_id = %self.job_id,
            kind = self.kind,
            fingerprint = %format!("{:016x}", hash),
            "Job finished"
        );
    }

    /// Cancellation is logged as a warning, everything else as an error.
    pub fn failed(&self, err: &WorkerError) {
        if err.is_cancellation() {
            warn!(job_id = %self.job_id, kind = self.kind, error = %err, "Job cancelled");
        } else {
            error!(job_id = %self.job_id, kind = self.kind, error = %err, "Job failed");
        }
    }
}
