//! Output path naming.

use std::path::{Component, Path, PathBuf};

use mderiv_models::ArtifactKind;

use crate::error::{MediaError, MediaResult};

/// Deterministic final paths for derived artifacts.
///
/// Implementations reject hashes that would name a path outside their root.
pub trait ArtifactPaths: Send + Sync {
    fn preview_clip(&self, hash: &str, seconds: f64) -> MediaResult<PathBuf>;

    fn animated_thumbnail(&self, hash: &str, seconds: f64) -> MediaResult<PathBuf>;

    fn screenshot(&self, hash: &str, seconds: f64, width: u32) -> MediaResult<PathBuf>;
}

/// Check that `hash` is exactly one plain path component.
pub fn validate_hash(hash: &str) -> MediaResult<()> {
    if hash.is_empty() {
        return Err(MediaError::invalid_hash(hash, "empty"));
    }
    if hash.contains(['/', '\\']) {
        return Err(MediaError::invalid_hash(hash, "contains a path separator"));
    }
    let mut components = Path::new(hash).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(MediaError::invalid_hash(hash, "not a plain file name")),
    }
}

/// Scene-marker layout: `<root>/<hash>/<seconds>.<ext>`.
#[derive(Debug, Clone)]
pub struct MarkerPaths {
    root: PathBuf,
}

impl MarkerPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, hash: &str, stem: String, kind: ArtifactKind) -> MediaResult<PathBuf> {
        validate_hash(hash)?;
        Ok(self
            .root
            .join(hash)
            .join(format!("{}.{}", stem, kind.extension())))
    }
}

/// Whole seconds, truncated toward zero.
fn whole_seconds(seconds: f64) -> i64 {
    seconds.trunc() as i64
}

impl ArtifactPaths for MarkerPaths {
    fn preview_clip(&self, hash: &str, seconds: f64) -> MediaResult<PathBuf> {
        self.path(hash, whole_seconds(seconds).to_string(), ArtifactKind::PreviewClip)
    }

    fn animated_thumbnail(&self, hash: &str, seconds: f64) -> MediaResult<PathBuf> {
        self.path(hash, whole_seconds(seconds).to_string(), ArtifactKind::AnimatedThumbnail)
    }

    fn screenshot(&self, hash: &str, seconds: f64, width: u32) -> MediaResult<PathBuf> {
        self.path(
            hash,
            format!("{}_{}", whole_seconds(seconds), width),
            ArtifactKind::Screenshot,
        )
    }
}
