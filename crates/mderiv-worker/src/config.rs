//! Worker configuration.

use std::path::PathBuf;

use mderiv_models::encoding::parse_flag;
use mderiv_models::{OverwritePolicy, TranscodeConfig};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Root directory for marker artifacts
    pub generated_dir: PathBuf,
    /// Regenerate artifacts that already exist
    pub overwrite: bool,
    /// Explicit FFmpeg binary; PATH lookup when unset
    pub ffmpeg: Option<PathBuf>,
    /// Explicit FFprobe binary; PATH lookup when unset
    pub ffprobe: Option<PathBuf>,
    /// Write a Prometheus text snapshot here after the batch
    pub metrics_file: Option<PathBuf>,
    /// Transcode settings shared by every generator
    pub transcode: TranscodeConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            generated_dir: PathBuf::from("./generated/markers"),
            overwrite: false,
            ffmpeg: None,
            ffprobe: None,
            metrics_file: None,
            transcode: TranscodeConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: std::env::var("MDERIV_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            generated_dir: std::env::var("MDERIV_GENERATED_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.generated_dir),
            overwrite: std::env::var("MDERIV_OVERWRITE")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            ffmpeg: std::env::var("MDERIV_FFMPEG").ok().map(PathBuf::from),
            ffprobe: std::env::var("MDERIV_FFPROBE").ok().map(PathBuf::from),
            metrics_file: std::env::var("MDERIV_METRICS_FILE").ok().map(PathBuf::from),
            transcode: TranscodeConfig::from_env(),
        }
    }

    pub fn overwrite_policy(&self) -> OverwritePolicy {
        OverwritePolicy::from_overwrite(self.overwrite)
    }
}
