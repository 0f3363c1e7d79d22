//! Hardware codec query and preview codec selection.

use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use mderiv_models::encoding::PREVIEW_VIDEO_CODEC;
use mderiv_models::TranscodeConfig;

use crate::command::FfmpegRunner;
use crate::error::{MediaError, MediaResult};

/// Hardware API behind an encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HwApi {
    Nvenc,
    Qsv,
    Vaapi,
    VideoToolbox,
    V4l2m2m,
}

impl HwApi {
    /// Arguments that initialise the device, placed before `-i`.
    pub fn device_init_args(&self) -> Vec<String> {
        let args: &[&str] = match self {
            HwApi::Nvenc => &["-hwaccel_device", "0"],
            HwApi::Qsv => &["-init_hw_device", "qsv=hw", "-filter_hw_device", "hw"],
            HwApi::Vaapi => &["-vaapi_device", "/dev/dri/renderD128"],
            HwApi::VideoToolbox | HwApi::V4l2m2m => &[],
        };
        args.iter().map(|s| s.to_string()).collect()
    }

    /// Filter that moves software frames onto the device.
    pub fn upload_filter(&self) -> Option<&'static str> {
        match self {
            HwApi::Nvenc => Some("hwupload_cuda"),
            HwApi::Qsv => Some("hwupload=extra_hw_frames=64,format=qsv"),
            HwApi::Vaapi => Some("format=nv12,hwupload"),
            HwApi::VideoToolbox | HwApi::V4l2m2m => None,
        }
    }
}

/// A hardware encoder known to FFmpeg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HwCodec {
    pub name: String,
    pub api: HwApi,
}

/// H.264 hardware encoders, in order of preference.
pub const MP4_HW_ENCODERS: &[(&str, HwApi)] = &[
    ("h264_nvenc", HwApi::Nvenc),
    ("h264_qsv", HwApi::Qsv),
    ("h264_vaapi", HwApi::Vaapi),
    ("h264_videotoolbox", HwApi::VideoToolbox),
    ("h264_v4l2m2m", HwApi::V4l2m2m),
];

/// The hardware-codec query capability.
pub trait HardwareCodecs: Send + Sync {
    /// A hardware encoder producing MP4-compatible video, if any.
    fn mp4_compatible(&self) -> Option<HwCodec>;

    /// Device initialisation arguments for `codec`.
    fn device_init(&self, codec: &HwCodec) -> Vec<String> {
        codec.api.device_init_args()
    }

    /// Per-frame filter-chain snippet for `codec`.
    fn filter_init(&self, codec: &HwCodec) -> Option<String> {
        codec.api.upload_filter().map(str::to_string)
    }
}

/// Hardware encoders discovered from `ffmpeg -encoders`.
#[derive(Debug, Clone, Default)]
pub struct DetectedHwCodecs {
    codecs: Vec<HwCodec>,
}

impl DetectedHwCodecs {
    /// No hardware encoders.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_codecs(codecs: Vec<HwCodec>) -> Self {
        Self { codecs }
    }

    /// Query the FFmpeg binary behind `runner`.
    pub async fn detect(runner: &FfmpegRunner) -> MediaResult<Self> {
        let output = Command::new(runner.binary())
            .args(["-hide_banner", "-encoders"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => MediaError::FfmpegNotFound,
                _ => MediaError::Io(e),
            })?;

        if !output.status.success() {
            return Err(MediaError::ffmpeg_failed(
                "Listing encoders failed",
                Some(String::from_utf8_lossy(&output.stderr).to_string()),
                output.status.code(),
            ));
        }

        let detected = Self::from_encoder_list(&String::from_utf8_lossy(&output.stdout));
        info!(
            "Detected hardware encoders: [{}]",
            detected
                .codecs
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(detected)
    }

    /// Parse the text printed by `ffmpeg -encoders`.
    ///
    /// Encoder lines look like ` V....D h264_nvenc   NVIDIA NVENC H.264 encoder`.
    pub fn from_encoder_list(text: &str) -> Self {
        let available: Vec<&str> = text
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let flags = fields.next()?;
                let name = fields.next()?;
                flags.starts_with('V').then_some(name)
            })
            .collect();

        let codecs = MP4_HW_ENCODERS
            .iter()
            .filter(|(name, _)| available.contains(name))
            .map(|(name, api)| HwCodec {
                name: name.to_string(),
                api: *api,
            })
            .collect();

        Self { codecs }
    }

    pub fn codecs(&self) -> &[HwCodec] {
        &self.codecs
    }
}

impl HardwareCodecs for DetectedHwCodecs {
    fn mp4_compatible(&self) -> Option<HwCodec> {
        self.codecs.first().cloned()
    }
}

/// Video codec chosen for a preview clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecChoice {
    /// `libx264`
    Software,
    Hardware(HwCodec),
}

impl CodecChoice {
    pub fn name(&self) -> &str {
        match self {
            CodecChoice::Software => PREVIEW_VIDEO_CODEC,
            CodecChoice::Hardware(codec) => &codec.name,
        }
    }

    pub fn is_hardware(&self) -> bool {
        matches!(self, CodecChoice::Hardware(_))
    }
}

/// Pick the preview codec: hardware only when configured and available.
pub fn select_preview_codec(config: &TranscodeConfig, query: &dyn HardwareCodecs) -> CodecChoice {
    if config.hardware_acceleration {
        if let Some(codec) = query.mp4_compatible() {
            debug!("Using hardware codec for preview clip: {}", codec.name);
            return CodecChoice::Hardware(codec);
        }
    }
    CodecChoice::Software
}
