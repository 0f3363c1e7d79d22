//! Artifact kind and overwrite policy definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Derived artifacts produced from a source video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Short MP4 preview clip
    PreviewClip,
    /// Looping animated WebP
    AnimatedThumbnail,
    /// Single still JPEG
    Screenshot,
}

impl ArtifactKind {
    pub const ALL: &'static [ArtifactKind] = &[
        ArtifactKind::PreviewClip,
        ArtifactKind::AnimatedThumbnail,
        ArtifactKind::Screenshot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::PreviewClip => "preview_clip",
            ArtifactKind::AnimatedThumbnail => "animated_thumbnail",
            ArtifactKind::Screenshot => "screenshot",
        }
    }

    /// File extension of the published artifact.
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::PreviewClip => "mp4",
            ArtifactKind::AnimatedThumbnail => "webp",
            ArtifactKind::Screenshot => "jpg",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = ArtifactKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "preview_clip" | "preview" => Ok(ArtifactKind::PreviewClip),
            "animated_thumbnail" | "webp" => Ok(ArtifactKind::AnimatedThumbnail),
            "screenshot" => Ok(ArtifactKind::Screenshot),
            _ => Err(ArtifactKindParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown artifact kind: {0}")]
pub struct ArtifactKindParseError(String);

/// What to do when the output already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverwritePolicy {
    /// Leave an existing non-empty output untouched
    #[default]
    SkipIfExists,
    /// Always regenerate
    Overwrite,
}

impl OverwritePolicy {
    /// Map the generator-wide overwrite flag to a policy.
    pub fn from_overwrite(overwrite: bool) -> Self {
        if overwrite {
            OverwritePolicy::Overwrite
        } else {
            OverwritePolicy::SkipIfExists
        }
    }
}
