//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during derivative generation.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("Failed to acquire lock on {}: {reason}", .key.display())]
    LockAcquisitionFailed { key: PathBuf, reason: String },

    #[error("FFmpeg command failed: {message}{}", stderr_suffix(.stderr))]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Decoding image: {0}")]
    DecodeFailed(String),

    #[error("Insufficient samples: expected {expected}, got {actual}: {reason}")]
    InsufficientSamples {
        expected: usize,
        actual: usize,
        reason: String,
    },

    #[error("Moving {} to {}: {source}", .from.display(), .to.display())]
    PublishFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("FFmpeg command produced no output: {0}")]
    EmptyOutput(PathBuf),

    #[error("Invalid content hash {hash:?}: {reason}")]
    InvalidHash { hash: String, reason: String },

    #[error("Invalid composite: {0}")]
    InvalidComposite(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a lock acquisition failure error.
    pub fn lock_failed(key: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::LockAcquisitionFailed {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create an insufficient samples error.
    pub fn insufficient_samples(expected: usize, actual: usize, reason: impl Into<String>) -> Self {
        Self::InsufficientSamples {
            expected,
            actual,
            reason: reason.into(),
        }
    }

    /// Create a decode failure error.
    pub fn invalid_hash(hash: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidHash {
            hash: hash.into(),
            reason: reason.into(),
        }
    }

    pub fn decode_failed(message: impl Into<String>) -> Self {
        Self::DecodeFailed(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the failure came from cancellation rather than the work itself.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::LockAcquisitionFailed { .. })
    }
}

fn stderr_suffix(stderr: &Option<String>) -> String {
    match stderr.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => format!(": {}", s),
        _ => String::new(),
    }
}

impl From<image::ImageError> for MediaError {
    fn from(e: image::ImageError) -> Self {
        Self::DecodeFailed(e.to_string())
    }
}
