//! Encoding constants and transcode configuration.

use serde::{Deserialize, Serialize};

/// Software video codec for preview clips (H.264)
pub const PREVIEW_VIDEO_CODEC: &str = "libx264";
/// Audio codec for preview clips
pub const PREVIEW_AUDIO_CODEC: &str = "aac";
/// Audio bitrate for preview clips
pub const PREVIEW_AUDIO_BITRATE: &str = "64k";
/// Preview clip scale width
pub const PREVIEW_WIDTH: u32 = 640;
/// Upper bound on preview clip length in seconds
pub const MAX_PREVIEW_DURATION: f64 = 20.0;
/// Software encoder quality (CRF)
pub const PREVIEW_CRF: u8 = 24;
/// Software encoder preset
pub const PREVIEW_PRESET: &str = "veryslow";
/// Hardware encoder constant quality (`-cq`)
pub const PREVIEW_HW_CQ: u8 = 21;

/// Animated thumbnail codec
pub const WEBP_VIDEO_CODEC: &str = "libwebp";
/// Animated thumbnail length in seconds
pub const WEBP_DURATION: f64 = 5.0;
/// Animated thumbnail frame rate
pub const WEBP_FPS: u32 = 12;
/// Animated thumbnail scale width
pub const WEBP_WIDTH: u32 = 640;

/// JPEG quality (`-q:v`) for still screenshots
pub const SCREENSHOT_QUALITY: u8 = 2;

/// Width of every fingerprint sample frame
pub const PHASH_SAMPLE_WIDTH: u32 = 160;
/// Fingerprint sprite grid columns
pub const PHASH_COLUMNS: u32 = 5;
/// Fingerprint sprite grid rows
pub const PHASH_ROWS: u32 = 5;

/// Decode-acceleration hint used by the non-encoding paths.
pub const HWACCEL_DECODE_ARGS: [&str; 2] = ["-hwaccel", "cuda"];

/// Transcode configuration shared by every generator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscodeConfig {
    /// Use hardware acceleration when available
    #[serde(default)]
    pub hardware_acceleration: bool,

    /// Additional FFmpeg arguments placed before `-i`
    #[serde(default)]
    pub input_args: Vec<String>,

    /// Additional FFmpeg arguments placed before the output
    #[serde(default)]
    pub output_args: Vec<String>,
}

impl TranscodeConfig {
    /// Create a new transcode configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            hardware_acceleration: std::env::var("MDERIV_HWACCEL")
                .ok()
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            input_args: std::env::var("MDERIV_TRANSCODE_INPUT_ARGS")
                .map(|v| split_args(&v))
                .unwrap_or_default(),
            output_args: std::env::var("MDERIV_TRANSCODE_OUTPUT_ARGS")
                .map(|v| split_args(&v))
                .unwrap_or_default(),
        }
    }

    /// Enable hardware acceleration.
    pub fn with_hardware_acceleration(mut self) -> Self {
        self.hardware_acceleration = true;
        self
    }
}

/// Parse a boolean-ish environment value.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn split_args(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}
