//! Metrics recorded by the generation pipeline.
//!
//! Only the `metrics` facade is used here; installing a recorder is up to
//! the embedding binary.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const ARTIFACTS_TOTAL: &str = "mderiv_artifacts_total";
    pub const FINGERPRINTS_TOTAL: &str = "mderiv_fingerprints_total";
    pub const FFMPEG_DURATION_SECONDS: &str = "mderiv_ffmpeg_duration_seconds";
}

/// Record a terminal generator state (`published`, `skipped`, `failed`).
pub fn record_artifact(kind: &str, outcome: &str) {
    let labels = [("kind", kind.to_string()), ("outcome", outcome.to_string())];
    counter!(names::ARTIFACTS_TOTAL, &labels).increment(1);
}

/// Record a fingerprint attempt (`computed`, `failed`).
pub fn record_fingerprint(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::FINGERPRINTS_TOTAL, &labels).increment(1);
}

/// Record how long one FFmpeg invocation ran.
pub fn record_ffmpeg_duration(status: &str, duration_secs: f64) {
    let labels = [("status", status.to_string())];
    histogram!(names::FFMPEG_DURATION_SECONDS, &labels).record(duration_secs);
}
