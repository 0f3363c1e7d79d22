//! MP4 preview clip.

use std::path::{Path, PathBuf};

use mderiv_models::encoding::{
    MAX_PREVIEW_DURATION, PREVIEW_AUDIO_BITRATE, PREVIEW_AUDIO_CODEC, PREVIEW_CRF,
    PREVIEW_HW_CQ, PREVIEW_PRESET, PREVIEW_WIDTH,
};
use mderiv_models::{ArtifactKind, TranscodeConfig};

use super::ArtifactPolicy;
use crate::command::FfmpegCommand;
use crate::error::MediaResult;
use crate::filters::VideoFilter;
use crate::hwaccel::{select_preview_codec, CodecChoice, HardwareCodecs};
use crate::paths::ArtifactPaths;
use crate::transcode::{transcode, TranscodeOptions};

/// Preview clip starting at `seconds`, at most [`MAX_PREVIEW_DURATION`] long.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewClip {
    pub seconds: f64,
    pub end_seconds: Option<f64>,
    pub include_audio: bool,
}

impl PreviewClip {
    /// Length of the clip: the marker span when shorter than the maximum.
    pub fn duration(&self) -> f64 {
        match self.end_seconds {
            Some(end) if end - self.seconds < MAX_PREVIEW_DURATION => end - self.seconds,
            _ => MAX_PREVIEW_DURATION,
        }
    }
}

fn software_args() -> Vec<String> {
    let crf = PREVIEW_CRF.to_string();
    [
        "-pix_fmt", "yuv420p",
        "-profile:v", "high",
        "-level", "4.2",
        "-preset", PREVIEW_PRESET,
        "-crf", crf.as_str(),
        "-movflags", "+faststart",
        "-threads", "4",
        "-sws_flags", "lanczos",
        "-strict", "-2",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn hardware_args() -> Vec<String> {
    let cq = PREVIEW_HW_CQ.to_string();
    ["-rc", "vbr", "-cq", cq.as_str(), "-movflags", "+faststart"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl ArtifactPolicy for PreviewClip {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::PreviewClip
    }

    fn output_path(&self, paths: &dyn ArtifactPaths, hash: &str) -> MediaResult<PathBuf> {
        paths.preview_clip(hash, self.seconds)
    }

    fn descriptor(
        &self,
        input: &Path,
        output: &Path,
        config: &TranscodeConfig,
        hw: &dyn HardwareCodecs,
    ) -> FfmpegCommand {
        let codec = select_preview_codec(config, hw);
        let mut filter = VideoFilter::new().scale_width(PREVIEW_WIDTH);

        let (video_args, extra_input_args) = match &codec {
            CodecChoice::Hardware(hw_codec) => {
                // Scale on the CPU, then hand frames to the device.
                if let Some(upload) = hw.filter_init(hw_codec) {
                    filter = filter.append(upload);
                }
                let mut input_args = hw.device_init(hw_codec);
                input_args.extend(config.input_args.iter().cloned());
                (hardware_args(), input_args)
            }
            CodecChoice::Software => (software_args(), config.input_args.clone()),
        };

        let (audio_codec, audio_bitrate) = if self.include_audio {
            (
                Some(PREVIEW_AUDIO_CODEC.to_string()),
                Some(PREVIEW_AUDIO_BITRATE.to_string()),
            )
        } else {
            (None, None)
        };

        transcode(
            input,
            TranscodeOptions {
                start_time: self.seconds,
                duration: self.duration(),
                output_path: output.to_path_buf(),
                video_codec: codec.name().to_string(),
                video_filter: filter,
                video_args,
                audio_codec,
                audio_bitrate,
                extra_input_args,
                extra_output_args: config.output_args.clone(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hwaccel::{DetectedHwCodecs, HwApi, HwCodec};

    fn clip(end_seconds: Option<f64>, include_audio: bool) -> PreviewClip {
        PreviewClip {
            seconds: 10.0,
            end_seconds,
            include_audio,
        }
    }

    fn has_pair(args: &[String], a: &str, b: &str) -> bool {
        args.windows(2).any(|w| w[0] == a && w[1] == b)
    }

    #[test]
    fn test_duration_window() {
        assert_eq!(clip(None, false).duration(), 20.0);
        assert_eq!(clip(Some(15.0), false).duration(), 5.0);
        assert_eq!(clip(Some(100.0), false).duration(), 20.0);
    }

    #[test]
    fn test_software_descriptor() {
        let config = TranscodeConfig {
            input_args: vec!["-fflags".to_string(), "+genpts".to_string()],
            output_args: vec!["-map_metadata".to_string(), "-1".to_string()],
            ..Default::default()
        };
        let cmd = clip(Some(22.5), false).descriptor(
            Path::new("/v/in.mp4"),
            Path::new("/tmp/.mderiv-tmp-1.mp4"),
            &config,
            &DetectedHwCodecs::none(),
        );

        let args = cmd.build_args();
        assert_eq!(cmd.codec(), Some("libx264"));
        assert_eq!(&args[3..5], ["-fflags", "+genpts"]);
        assert!(has_pair(&args, "-t", "12.500"));
        assert!(has_pair(&args, "-vf", "scale=640:-2"));
        assert!(has_pair(&args, "-crf", "24"));
        assert!(has_pair(&args, "-sws_flags", "lanczos"));
        assert!(args.contains(&"-an".to_string()));
        assert_eq!(
            args[args.len() - 3..],
            ["-map_metadata", "-1", "/tmp/.mderiv-tmp-1.mp4"]
        );
    }

    #[test]
    fn test_hardware_descriptor_with_audio() {
        let config = TranscodeConfig {
            hardware_acceleration: true,
            input_args: vec!["-threads".to_string(), "2".to_string()],
            ..Default::default()
        };
        let hw = DetectedHwCodecs::from_codecs(vec![HwCodec {
            name: "h264_nvenc".to_string(),
            api: HwApi::Nvenc,
        }]);
        let cmd = clip(None, true).descriptor(
            Path::new("/v/in.mp4"),
            Path::new("/tmp/out.mp4"),
            &config,
            &hw,
        );

        let args = cmd.build_args();
        assert_eq!(cmd.codec(), Some("h264_nvenc"));
        assert_eq!(&args[3..7], ["-hwaccel_device", "0", "-threads", "2"]);
        assert!(has_pair(&args, "-vf", "scale=640:-2,hwupload_cuda"));
        assert!(has_pair(&args, "-cq", "21"));
        assert!(!args.contains(&"-crf".to_string()));
        assert!(has_pair(&args, "-c:a", "aac"));
        assert!(has_pair(&args, "-b:a", "64k"));
    }

    #[test]
    fn test_hardware_requested_but_unavailable() {
        let config = TranscodeConfig::new().with_hardware_acceleration();
        let cmd = clip(None, false).descriptor(
            Path::new("/v/in.mp4"),
            Path::new("/tmp/out.mp4"),
            &config,
            &DetectedHwCodecs::none(),
        );
        assert_eq!(cmd.codec(), Some("libx264"));
        assert!(!cmd.build_args().contains(&"-hwaccel".to_string()));
    }
}
