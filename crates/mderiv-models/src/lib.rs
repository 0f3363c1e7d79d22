//! Shared data models for media derivative generation.
//!
//! This crate provides Serde-serializable types for:
//! - Source videos and their identity hash
//! - Artifact kinds and overwrite policy
//! - Encoding constants and transcode configuration

pub mod artifact;
pub mod encoding;
pub mod video;

// Re-export common types
pub use artifact::{ArtifactKind, OverwritePolicy};
pub use encoding::TranscodeConfig;
pub use video::VideoFile;
