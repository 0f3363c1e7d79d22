//! Output gatekeeper: skip existing outputs, otherwise generate into a
//! private temp file and publish it with an atomic rename.

use std::future::Future;
use std::path::{Path, PathBuf};

use tempfile::Builder;
use tokio::fs;
use tracing::debug;

use mderiv_models::OverwritePolicy;

use crate::cancel::CancelToken;
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{file_nonempty, TEMP_PREFIX};
use crate::lock::{LockHandle, LockManager};

/// Terminal success states of one generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// A non-empty output already existed; no work was done
    Skipped(PathBuf),
    /// A new output was published at this path
    Published(PathBuf),
}

impl GenerationOutcome {
    pub fn path(&self) -> &Path {
        match self {
            GenerationOutcome::Skipped(path) | GenerationOutcome::Published(path) => path,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationOutcome::Skipped(_) => "skipped",
            GenerationOutcome::Published(_) => "published",
        }
    }
}

/// Serialises writers per output path and owns the temp-then-publish step.
#[derive(Clone, Default)]
pub struct OutputGate {
    locks: LockManager,
}

impl OutputGate {
    /// Create a gate with its own output-lock registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a gate that registers output locks in `locks`.
    pub fn with_locks(locks: LockManager) -> Self {
        Self { locks }
    }

    /// The registry holding output locks.
    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// Make sure `output` exists, generating it under `source` if needed.
    ///
    /// `generate` receives the cancellation context and the temp path it must
    /// write. The temp file lives next to `output` and keeps its extension.
    /// On any failure the temp file is removed and `output` is left untouched.
    pub async fn ensure_generated<F, Fut>(
        &self,
        source: &LockHandle,
        output: &Path,
        policy: OverwritePolicy,
        generate: F,
    ) -> MediaResult<GenerationOutcome>
    where
        F: FnOnce(CancelToken, PathBuf) -> Fut,
        Fut: Future<Output = MediaResult<()>>,
    {
        let output_lock = self.locks.write_lock(source.context(), output).await?;
        debug!(output = %output.display(), "Locked");

        if policy == OverwritePolicy::SkipIfExists && file_nonempty(output).await {
            debug!(output = %output.display(), "Output exists, skipping");
            return Ok(GenerationOutcome::Skipped(output.to_path_buf()));
        }

        let dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).await?;

        let suffix = output
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        // Dropping the TempPath deletes the file, which covers every early return below.
        let temp = Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(&suffix)
            .tempfile_in(&dir)?
            .into_temp_path();

        debug!(output = %output.display(), temp = %temp.display(), "Generating");
        if let Err(e) = generate(output_lock.context().clone(), temp.to_path_buf()).await {
            debug!(output = %output.display(), error = %e, "Generation failed, cleaning up");
            return Err(e);
        }

        let len = fs::metadata(&temp).await.map(|m| m.len()).unwrap_or(0);
        if len == 0 {
            debug!(output = %output.display(), "Generated file is empty, cleaning up");
            return Err(MediaError::EmptyOutput(output.to_path_buf()));
        }

        let from = temp.to_path_buf();
        temp.persist(output).map_err(|e| MediaError::PublishFailed {
            from,
            to: output.to_path_buf(),
            source: e.error,
        })?;

        debug!(output = %output.display(), bytes = len, "Published");
        Ok(GenerationOutcome::Published(output.to_path_buf()))
    }
}
