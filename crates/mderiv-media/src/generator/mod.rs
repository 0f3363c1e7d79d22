//! Artifact generators.
//!
//! Every artifact kind is an [`ArtifactPolicy`] that names its output and
//! builds one FFmpeg descriptor. [`Generator::generate`] is the shared
//! locate-or-generate-then-publish template:
//!
//! `NotStarted -> Locked -> (Skipped | Generating) -> (Published | Failed)`
//!
//! The source read lock is released on every terminal state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use mderiv_models::{ArtifactKind, OverwritePolicy, TranscodeConfig};

use crate::cancel::CancelToken;
use crate::command::{FfmpegCommand, FrameProcessor};
use crate::error::MediaResult;
use crate::gate::{GenerationOutcome, OutputGate};
use crate::hwaccel::{DetectedHwCodecs, HardwareCodecs};
use crate::lock::LockManager;
use crate::metrics;
use crate::paths::ArtifactPaths;

pub mod preview;
pub mod screenshot;
pub mod webp;

pub use preview::PreviewClip;
pub use screenshot::Screenshot;
pub use webp::AnimatedThumbnail;

/// One artifact kind: where it goes and how FFmpeg makes it.
pub trait ArtifactPolicy: Send + Sync {
    fn kind(&self) -> ArtifactKind;

    fn output_path(&self, paths: &dyn ArtifactPaths, hash: &str) -> MediaResult<PathBuf>;

    /// Descriptor writing the artifact of `input` to `output`.
    fn descriptor(
        &self,
        input: &Path,
        output: &Path,
        config: &TranscodeConfig,
        hw: &dyn HardwareCodecs,
    ) -> FfmpegCommand;
}

/// Generates derived artifacts for source videos.
#[derive(Clone)]
pub struct Generator {
    processor: Arc<dyn FrameProcessor>,
    locks: LockManager,
    gate: OutputGate,
    paths: Arc<dyn ArtifactPaths>,
    hw_codecs: Arc<dyn HardwareCodecs>,
    config: TranscodeConfig,
    overwrite: OverwritePolicy,
}

impl Generator {
    /// Software-only generator that skips existing outputs.
    pub fn new(processor: Arc<dyn FrameProcessor>, paths: Arc<dyn ArtifactPaths>) -> Self {
        let locks = LockManager::new();
        Self {
            processor,
            gate: OutputGate::with_locks(locks.clone()),
            locks,
            paths,
            hw_codecs: Arc::new(DetectedHwCodecs::none()),
            config: TranscodeConfig::default(),
            overwrite: OverwritePolicy::default(),
        }
    }

    pub fn with_config(mut self, config: TranscodeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_hardware_codecs(mut self, hw_codecs: Arc<dyn HardwareCodecs>) -> Self {
        self.hw_codecs = hw_codecs;
        self
    }

    pub fn with_overwrite(mut self, policy: OverwritePolicy) -> Self {
        self.overwrite = policy;
        self
    }

    /// Share a lock registry with other generators or with code that
    /// mutates source files.
    pub fn with_locks(mut self, locks: LockManager) -> Self {
        self.gate = OutputGate::with_locks(locks.clone());
        self.locks = locks;
        self
    }

    /// Lock registry for sources and outputs.
    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    pub fn config(&self) -> &TranscodeConfig {
        &self.config
    }

    /// MP4 preview of `[seconds, min(seconds + 20, end_seconds)]`.
    pub async fn preview_clip(
        &self,
        cancel: &CancelToken,
        input: &Path,
        hash: &str,
        seconds: f64,
        end_seconds: Option<f64>,
        include_audio: bool,
    ) -> MediaResult<GenerationOutcome> {
        let policy = PreviewClip {
            seconds,
            end_seconds,
            include_audio,
        };
        self.generate(cancel, input, hash, &policy).await
    }

    /// Five-second looping WebP starting at `seconds`.
    pub async fn animated_thumbnail(
        &self,
        cancel: &CancelToken,
        input: &Path,
        hash: &str,
        seconds: f64,
    ) -> MediaResult<GenerationOutcome> {
        self.generate(cancel, input, hash, &AnimatedThumbnail { seconds }).await
    }

    /// JPEG still at `seconds`, scaled to `width`.
    pub async fn screenshot(
        &self,
        cancel: &CancelToken,
        input: &Path,
        hash: &str,
        seconds: f64,
        width: u32,
    ) -> MediaResult<GenerationOutcome> {
        self.generate(cancel, input, hash, &Screenshot { seconds, width }).await
    }

    /// Produce the artifact described by `policy` unless it already exists.
    pub async fn generate(
        &self,
        cancel: &CancelToken,
        input: &Path,
        hash: &str,
        policy: &dyn ArtifactPolicy,
    ) -> MediaResult<GenerationOutcome> {
        let kind = policy.kind();
        let output = match policy.output_path(self.paths.as_ref(), hash) {
            Ok(output) => output,
            Err(e) => {
                metrics::record_artifact(kind.as_str(), "failed");
                warn!(kind = %kind, hash = %hash, error = %e, "Rejected output path");
                return Err(e);
            }
        };

        let result = self.locate_or_generate(cancel, input, &output, policy).await;

        let outcome = match &result {
            Ok(outcome) => outcome.as_str(),
            Err(_) => "failed",
        };
        metrics::record_artifact(kind.as_str(), outcome);

        match &result {
            Ok(GenerationOutcome::Published(path)) => {
                info!(kind = %kind, output = %path.display(), "Created {}", kind)
            }
            Ok(GenerationOutcome::Skipped(path)) => {
                debug!(kind = %kind, output = %path.display(), "Already exists")
            }
            Err(e) if e.is_cancellation() => {
                debug!(kind = %kind, output = %output.display(), "Generation cancelled")
            }
            Err(e) => {
                warn!(kind = %kind, output = %output.display(), error = %e, "Generation failed")
            }
        }

        result
    }

    async fn locate_or_generate(
        &self,
        cancel: &CancelToken,
        input: &Path,
        output: &Path,
        policy: &dyn ArtifactPolicy,
    ) -> MediaResult<GenerationOutcome> {
        let source = self.locks.read_lock(cancel, input).await?;

        let result = self
            .gate
            .ensure_generated(&source, output, self.overwrite, |ctx, temp| {
                let cmd = policy.descriptor(input, &temp, &self.config, self.hw_codecs.as_ref());
                let processor = Arc::clone(&self.processor);
                async move { processor.run(&cmd, &ctx).await }
            })
            .await;

        source.cancel();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediaError;
    use crate::paths::MarkerPaths;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Writes a few bytes to the descriptor's output and counts calls.
    #[derive(Default)]
    struct WritingProcessor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FrameProcessor for WritingProcessor {
        async fn run(&self, cmd: &FfmpegCommand, _cancel: &CancelToken) -> MediaResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let path = cmd
                .output_path()
                .ok_or_else(|| MediaError::internal("no output path"))?;
            tokio::fs::write(path, cmd.build_args().join(" ")).await?;
            Ok(())
        }

        async fn output(&self, _cmd: &FfmpegCommand, _cancel: &CancelToken) -> MediaResult<Vec<u8>> {
            Err(MediaError::internal("not used"))
        }
    }

    fn generator(root: &Path, processor: Arc<WritingProcessor>) -> Generator {
        Generator::new(processor, Arc::new(MarkerPaths::new(root)))
    }

    #[tokio::test]
    async fn test_each_kind_publishes_to_its_path() {
        let dir = TempDir::new().unwrap();
        let processor = Arc::new(WritingProcessor::default());
        let generator = generator(dir.path(), processor.clone());
        let cancel = CancelToken::new();
        let input = Path::new("/videos/a.mp4");

        let clip = generator
            .preview_clip(&cancel, input, "h1", 30.7, None, true)
            .await
            .unwrap();
        let webp = generator.animated_thumbnail(&cancel, input, "h1", 30.7).await.unwrap();
        let shot = generator.screenshot(&cancel, input, "h1", 30.7, 640).await.unwrap();

        assert_eq!(clip, GenerationOutcome::Published(dir.path().join("h1/30.mp4")));
        assert_eq!(webp, GenerationOutcome::Published(dir.path().join("h1/30.webp")));
        assert_eq!(shot, GenerationOutcome::Published(dir.path().join("h1/30_640.jpg")));
        assert_eq!(processor.calls.load(Ordering::SeqCst), 3);

        let written = tokio::fs::read_to_string(dir.path().join("h1/30.mp4")).await.unwrap();
        assert!(written.contains("-c:v libx264"));
        assert!(written.contains("-c:a aac"));
    }

    #[tokio::test]
    async fn test_second_call_is_skipped() {
        let dir = TempDir::new().unwrap();
        let processor = Arc::new(WritingProcessor::default());
        let generator = generator(dir.path(), processor.clone());
        let cancel = CancelToken::new();
        let input = Path::new("/videos/a.mp4");

        let first = generator.screenshot(&cancel, input, "h", 3.0, 320).await.unwrap();
        let second = generator.screenshot(&cancel, input, "h", 3.0, 320).await.unwrap();

        assert!(matches!(first, GenerationOutcome::Published(_)));
        assert!(matches!(second, GenerationOutcome::Skipped(_)));
        assert_eq!(processor.calls.load(Ordering::SeqCst), 1);
        assert_eq!(generator.locks().active_keys(), 0);
    }

    #[tokio::test]
    async fn test_overwrite_regenerates() {
        let dir = TempDir::new().unwrap();
        let processor = Arc::new(WritingProcessor::default());
        let generator =
            generator(dir.path(), processor.clone()).with_overwrite(OverwritePolicy::Overwrite);
        let cancel = CancelToken::new();
        let input = Path::new("/videos/a.mp4");

        generator.animated_thumbnail(&cancel, input, "h", 3.0).await.unwrap();
        let again = generator.animated_thumbnail(&cancel, input, "h", 3.0).await.unwrap();

        assert!(matches!(again, GenerationOutcome::Published(_)));
        assert_eq!(processor.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_context_does_no_work() {
        let dir = TempDir::new().unwrap();
        let processor = Arc::new(WritingProcessor::default());
        let generator = generator(dir.path(), processor.clone());
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = generator
            .preview_clip(&cancel, Path::new("/videos/a.mp4"), "h", 0.0, None, false)
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::LockAcquisitionFailed { .. }));
        assert_eq!(processor.calls.load(Ordering::SeqCst), 0);
        assert!(!dir.path().join("h").exists());
    }

    #[tokio::test]
    async fn test_hash_outside_root_is_rejected() {
        let dir = TempDir::new().unwrap();
        let processor = Arc::new(WritingProcessor::default());
        let generator = generator(&dir.path().join("markers"), processor.clone());
        let cancel = CancelToken::new();
        let input = Path::new("/videos/a.mp4");
        let outside = dir.path().join("outside");

        let absolute = generator
            .screenshot(&cancel, input, &outside.to_string_lossy(), 1.0, 320)
            .await
            .unwrap_err();
        let parent = generator
            .preview_clip(&cancel, input, "..", 1.0, None, false)
            .await
            .unwrap_err();

        assert!(matches!(absolute, MediaError::InvalidHash { .. }));
        assert!(matches!(parent, MediaError::InvalidHash { .. }));
        assert_eq!(processor.calls.load(Ordering::SeqCst), 0);
        assert!(!outside.exists());
        assert!(!dir.path().join("1.mp4").exists());
        assert_eq!(generator.locks().active_keys(), 0);
    }
}
