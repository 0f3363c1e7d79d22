//! Still JPEG screenshot.

use std::path::{Path, PathBuf};

use mderiv_models::encoding::{HWACCEL_DECODE_ARGS, SCREENSHOT_QUALITY};
use mderiv_models::{ArtifactKind, TranscodeConfig};

use super::ArtifactPolicy;
use crate::command::FfmpegCommand;
use crate::error::MediaResult;
use crate::hwaccel::HardwareCodecs;
use crate::paths::ArtifactPaths;
use crate::transcode::{screenshot_time, ScreenshotOptions, ScreenshotOutput};

#[derive(Debug, Clone, PartialEq)]
pub struct Screenshot {
    pub seconds: f64,
    pub width: u32,
}

impl ArtifactPolicy for Screenshot {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Screenshot
    }

    fn output_path(&self, paths: &dyn ArtifactPaths, hash: &str) -> MediaResult<PathBuf> {
        paths.screenshot(hash, self.seconds, self.width)
    }

    fn descriptor(
        &self,
        input: &Path,
        output: &Path,
        config: &TranscodeConfig,
        _hw: &dyn HardwareCodecs,
    ) -> FfmpegCommand {
        let extra_input_args = if config.hardware_acceleration {
            HWACCEL_DECODE_ARGS.iter().map(|s| s.to_string()).collect()
        } else {
            Vec::new()
        };

        screenshot_time(
            input,
            self.seconds,
            ScreenshotOptions {
                output: ScreenshotOutput::Image2(output.to_path_buf()),
                quality: Some(SCREENSHOT_QUALITY),
                width: Some(self.width),
                extra_input_args,
            },
        )
    }
}
