//! Descriptor builders for time-ranged transcodes and single-frame screenshots.

use std::path::{Path, PathBuf};

use crate::command::FfmpegCommand;
use crate::filters::VideoFilter;

/// Options for a time-ranged transcode.
#[derive(Debug, Clone, Default)]
pub struct TranscodeOptions {
    pub start_time: f64,
    pub duration: f64,
    pub output_path: PathBuf,
    pub video_codec: String,
    pub video_filter: VideoFilter,
    pub video_args: Vec<String>,
    /// `None` drops audio
    pub audio_codec: Option<String>,
    pub audio_bitrate: Option<String>,
    pub extra_input_args: Vec<String>,
    pub extra_output_args: Vec<String>,
}

/// Build a transcode of `[start_time, start_time + duration]` of `input`.
pub fn transcode(input: impl AsRef<Path>, options: TranscodeOptions) -> FfmpegCommand {
    let cmd = FfmpegCommand::new(input, &options.output_path)
        .input_args(options.extra_input_args)
        .seek(options.start_time)
        .duration(options.duration)
        .video_filter(options.video_filter)
        .video_codec(options.video_codec)
        .video_args(options.video_args);

    let cmd = match options.audio_codec {
        Some(codec) => cmd.audio(codec, options.audio_bitrate.unwrap_or_default()),
        None => cmd.no_audio(),
    };

    cmd.output_args(options.extra_output_args)
}

/// How a screenshot is delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenshotOutput {
    /// Encoded image file, container inferred by FFmpeg (`-f image2`)
    Image2(PathBuf),
    /// Uncompressed BMP streamed over stdout
    Bmp,
}

/// Options for a single-frame screenshot.
#[derive(Debug, Clone)]
pub struct ScreenshotOptions {
    pub output: ScreenshotOutput,
    /// `-q:v`, omitted when `None`
    pub quality: Option<u8>,
    /// Scale width, original size when `None`
    pub width: Option<u32>,
    pub extra_input_args: Vec<String>,
}

/// Build a screenshot of `input` at `seconds`.
///
/// The offset is passed through unchanged; out-of-range offsets surface as
/// FFmpeg errors or empty output.
pub fn screenshot_time(input: impl AsRef<Path>, seconds: f64, options: ScreenshotOptions) -> FfmpegCommand {
    let cmd = match &options.output {
        ScreenshotOutput::Image2(path) => FfmpegCommand::new(&input, path),
        ScreenshotOutput::Bmp => FfmpegCommand::piped(&input),
    };

    let mut cmd = cmd
        .input_args(options.extra_input_args)
        .seek(seconds)
        .single_frame();

    if let Some(quality) = options.quality {
        cmd = cmd.video_args(["-q:v".to_string(), quality.to_string()]);
    }

    if let Some(width) = options.width {
        cmd = cmd.video_filter(VideoFilter::new().scale_width(width));
    }

    match options.output {
        ScreenshotOutput::Image2(_) => cmd.format("image2"),
        ScreenshotOutput::Bmp => cmd.video_codec("bmp").format("rawvideo"),
    }
}
