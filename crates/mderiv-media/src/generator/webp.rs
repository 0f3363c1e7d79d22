//! Looping animated WebP thumbnail.

use std::path::{Path, PathBuf};

use mderiv_models::encoding::{
    HWACCEL_DECODE_ARGS, WEBP_DURATION, WEBP_FPS, WEBP_VIDEO_CODEC, WEBP_WIDTH,
};
use mderiv_models::{ArtifactKind, TranscodeConfig};

use super::ArtifactPolicy;
use crate::command::FfmpegCommand;
use crate::error::MediaResult;
use crate::filters::VideoFilter;
use crate::hwaccel::HardwareCodecs;
use crate::paths::ArtifactPaths;
use crate::transcode::{transcode, TranscodeOptions};

#[derive(Debug, Clone, PartialEq)]
pub struct AnimatedThumbnail {
    pub seconds: f64,
}

const WEBP_ARGS: &[&str] = &[
    "-lossless", "1",
    "-q:v", "70",
    "-compression_level", "6",
    "-preset", "default",
    "-loop", "0",
    "-threads", "4",
];

impl ArtifactPolicy for AnimatedThumbnail {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::AnimatedThumbnail
    }

    fn output_path(&self, paths: &dyn ArtifactPaths, hash: &str) -> MediaResult<PathBuf> {
        paths.animated_thumbnail(hash, self.seconds)
    }

    /// No hardware encoder exists for WebP; acceleration only adds a decode hint.
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

        transcode(
            input,
            TranscodeOptions {
                start_time: self.seconds,
                duration: WEBP_DURATION,
                output_path: output.to_path_buf(),
                video_codec: WEBP_VIDEO_CODEC.to_string(),
                video_filter: VideoFilter::new().scale_width(WEBP_WIDTH).fps(WEBP_FPS),
                video_args: WEBP_ARGS.iter().map(|s| s.to_string()).collect(),
                audio_codec: None,
                audio_bitrate: None,
                extra_input_args,
                extra_output_args: config.output_args.clone(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hwaccel::DetectedHwCodecs;

    #[test]
    fn test_webp_descriptor() {
        let config = TranscodeConfig {
            input_args: vec!["-ignored".to_string()],
            ..Default::default()
        };
        let cmd = AnimatedThumbnail { seconds: 42.0 }.descriptor(
            Path::new("/v/in.mp4"),
            Path::new("/tmp/t.webp"),
            &config,
            &DetectedHwCodecs::none(),
        );

        assert_eq!(
            cmd.build_args(),
            vec![
                "-y", "-v", "error", "-ss", "42.000", "-i", "/v/in.mp4", "-t", "5.000",
                "-vf", "scale=640:-2,fps=12", "-c:v", "libwebp", "-lossless", "1", "-q:v", "70",
                "-compression_level", "6", "-preset", "default", "-loop", "0", "-threads", "4",
                "-an", "/tmp/t.webp",
            ]
        );
    }

    #[test]
    fn test_webp_hardware_only_hints_decode() {
        let config = TranscodeConfig::new().with_hardware_acceleration();
        let cmd = AnimatedThumbnail { seconds: 1.0 }.descriptor(
            Path::new("/v/in.mp4"),
            Path::new("/tmp/t.webp"),
            &config,
            &DetectedHwCodecs::none(),
        );

        assert_eq!(cmd.extra_input_args(), ["-hwaccel", "cuda"]);
        assert_eq!(cmd.codec(), Some("libwebp"));
    }
}
