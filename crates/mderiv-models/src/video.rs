//! Source video models.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A source video as known to the external catalog.
///
/// Read-only to the generation core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoFile {
    /// Location of the source file
    pub path: PathBuf,
    /// Total duration in seconds
    pub duration: f64,
    /// Stable content fingerprint used to name outputs
    #[serde(default)]
    pub hash: String,
}

impl VideoFile {
    pub fn new(path: impl AsRef<Path>, duration: f64, hash: impl Into<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            duration,
            hash: hash.into(),
        }
    }

    /// Whether the duration can be sampled at all.
    pub fn has_duration(&self) -> bool {
        self.duration.is_finite() && self.duration > 0.0
    }
}
