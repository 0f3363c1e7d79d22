//! Single-frame sampling against the frame-processing capability.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, ImageFormat};
use tracing::debug;

use mderiv_models::encoding::HWACCEL_DECODE_ARGS;

use crate::cancel::CancelToken;
use crate::command::{FfmpegCommand, FrameProcessor};
use crate::error::{MediaError, MediaResult};
use crate::transcode::{screenshot_time, ScreenshotOptions, ScreenshotOutput};

/// Where a sampled frame goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleTarget {
    /// Written by FFmpeg as an image file
    File { path: PathBuf, quality: Option<u8> },
    /// Streamed back and decoded in memory
    Decoded,
}

/// A sampled frame.
#[derive(Debug, Clone)]
pub enum Sample {
    Written(PathBuf),
    Image(DynamicImage),
}

impl Sample {
    pub fn into_image(self) -> Option<DynamicImage> {
        match self {
            Sample::Image(img) => Some(img),
            Sample::Written(_) => None,
        }
    }
}

/// Issues single-frame extraction requests.
///
/// Offsets are not clamped: callers keep them within `[0, duration)`.
#[derive(Clone)]
pub struct FrameSampler {
    processor: Arc<dyn FrameProcessor>,
    hardware_acceleration: bool,
}

impl FrameSampler {
    pub fn new(processor: Arc<dyn FrameProcessor>) -> Self {
        Self {
            processor,
            hardware_acceleration: false,
        }
    }

    /// Prepend the decode-acceleration hint to every request.
    ///
    /// Availability is not checked; failures surface from FFmpeg.
    pub fn with_hardware_acceleration(mut self, enabled: bool) -> Self {
        self.hardware_acceleration = enabled;
        self
    }

    /// Build the descriptor for one frame of `input` at `seconds`.
    pub fn command(&self, input: &Path, seconds: f64, width: u32, target: &SampleTarget) -> FfmpegCommand {
        let (output, quality) = match target {
            SampleTarget::File { path, quality } => (ScreenshotOutput::Image2(path.clone()), *quality),
            SampleTarget::Decoded => (ScreenshotOutput::Bmp, None),
        };

        screenshot_time(
            input,
            seconds,
            ScreenshotOptions {
                output,
                quality,
                width: Some(width),
                extra_input_args: self.decode_args(),
            },
        )
    }

    /// Extract one frame of `input` at `seconds`, scaled to `width`.
    pub async fn sample_at(
        &self,
        cancel: &CancelToken,
        input: &Path,
        seconds: f64,
        width: u32,
        target: SampleTarget,
    ) -> MediaResult<Sample> {
        let cmd = self.command(input, seconds, width, &target);
        debug!(input = %input.display(), seconds, width, "Sampling frame");

        match target {
            SampleTarget::File { path, .. } => {
                self.processor.run(&cmd, cancel).await?;
                Ok(Sample::Written(path))
            }
            SampleTarget::Decoded => {
                let data = self.processor.output(&cmd, cancel).await?;
                decode_frame(&data).map(Sample::Image)
            }
        }
    }

    fn decode_args(&self) -> Vec<String> {
        if self.hardware_acceleration {
            HWACCEL_DECODE_ARGS.iter().map(|s| s.to_string()).collect()
        } else {
            Vec::new()
        }
    }
}

/// Decode the BMP bytes FFmpeg streamed back.
pub fn decode_frame(data: &[u8]) -> MediaResult<DynamicImage> {
    if data.is_empty() {
        return Err(MediaError::decode_failed("no frame data returned"));
    }
    image::load_from_memory_with_format(data, ImageFormat::Bmp).map_err(MediaError::from)
}
