#![deny(unreachable_patterns)]
//! Derived media generation on top of the FFmpeg CLI.
//!
//! This crate provides:
//! - Advisory per-path locks with cancellation
//! - An output gatekeeper that publishes through private temp files
//! - Type-safe FFmpeg command building and a cancellable runner
//! - Preview clip, animated thumbnail and screenshot generators
//! - A perceptual video fingerprint built from a sampled frame sprite

pub mod cancel;
pub mod command;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod gate;
pub mod generator;
pub mod hwaccel;
pub mod lock;
pub mod metrics;
pub mod paths;
pub mod phash;
pub mod probe;
pub mod sampler;
pub mod sprite;
pub mod transcode;

pub use cancel::CancelToken;
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner, FrameProcessor};
pub use error::{MediaError, MediaResult};
pub use fs_utils::sweep_temp_files;
pub use gate::{GenerationOutcome, OutputGate};
pub use generator::{AnimatedThumbnail, ArtifactPolicy, Generator, PreviewClip, Screenshot};
pub use hwaccel::{select_preview_codec, CodecChoice, DetectedHwCodecs, HardwareCodecs};
pub use lock::{LockHandle, LockManager};
pub use paths::{ArtifactPaths, MarkerPaths};
pub use phash::{generate_fingerprint, hamming_distance, DctHasher, Fingerprinter, PerceptualHasher};
pub use probe::{probe_video, VideoInfo};
pub use sampler::{FrameSampler, Sample, SampleTarget};
pub use sprite::assemble;
