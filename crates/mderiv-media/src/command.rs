//! FFmpeg command descriptor and runner.
//!
//! [`FfmpegCommand`] is the fully resolved instruction set for one request;
//! [`FrameProcessor`] is the capability that executes it. [`FfmpegRunner`]
//! is the process-backed implementation.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::error::{MediaError, MediaResult};
use crate::filters::VideoFilter;
use crate::metrics;

/// Where FFmpeg writes its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Write to a file
    File(PathBuf),
    /// Stream to stdout (`-`)
    Pipe,
}

/// Audio handling for the output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum AudioOutput {
    /// Leave FFmpeg's defaults alone
    #[default]
    Unspecified,
    /// Drop audio (`-an`)
    Disabled,
    /// Encode audio with a codec and arguments
    Encode { codec: String, args: Vec<String> },
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Output target
    output: OutputTarget,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Seek offset in seconds (before -i)
    start: Option<f64>,
    /// Output duration in seconds
    duration: Option<f64>,
    video_filter: Option<VideoFilter>,
    video_codec: Option<String>,
    /// Codec-specific video arguments
    video_args: Vec<String>,
    audio: AudioOutput,
    /// Extra output arguments (before the format)
    output_args: Vec<String>,
    /// Container/format arguments
    format: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command writing to a file.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self::with_target(input, OutputTarget::File(output.as_ref().to_path_buf()))
    }

    /// Create a new FFmpeg command streaming its output to stdout.
    pub fn piped(input: impl AsRef<Path>) -> Self {
        Self::with_target(input, OutputTarget::Pipe)
    }

    fn with_target(input: impl AsRef<Path>, output: OutputTarget) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output,
            input_args: Vec::new(),
            start: None,
            duration: None,
            video_filter: None,
            video_codec: None,
            video_args: Vec::new(),
            audio: AudioOutput::Unspecified,
            output_args: Vec::new(),
            format: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add input arguments (before -i).
    pub fn input_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set seek position (before input).
    pub fn seek(mut self, seconds: f64) -> Self {
        self.start = Some(seconds);
        self
    }

    /// Set output duration.
    pub fn duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    /// Set video filter chain. Empty chains are ignored.
    pub fn video_filter(mut self, filter: VideoFilter) -> Self {
        self.video_filter = (!filter.is_empty()).then_some(filter);
        self
    }

    /// Set video codec.
    pub fn video_codec(mut self, codec: impl Into<String>) -> Self {
        self.video_codec = Some(codec.into());
        self
    }

    /// Add codec-specific video arguments.
    pub fn video_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.video_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Extract a single frame.
    pub fn single_frame(self) -> Self {
        self.video_args(["-frames:v", "1"])
    }

    /// Encode audio with the given codec and bitrate.
    pub fn audio(mut self, codec: impl Into<String>, bitrate: impl Into<String>) -> Self {
        self.audio = AudioOutput::Encode {
            codec: codec.into(),
            args: vec!["-b:a".to_string(), bitrate.into()],
        };
        self
    }

    /// Drop all audio streams.
    pub fn no_audio(mut self) -> Self {
        self.audio = AudioOutput::Disabled;
        self
    }

    /// Add extra output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Force the output format (`-f`).
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = vec!["-f".to_string(), format.into()];
        self
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &OutputTarget {
        &self.output
    }

    /// Output file, if this command writes one.
    pub fn output_path(&self) -> Option<&Path> {
        match &self.output {
            OutputTarget::File(path) => Some(path),
            OutputTarget::Pipe => None,
        }
    }

    pub fn start(&self) -> Option<f64> {
        self.start
    }

    pub fn output_duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn codec(&self) -> Option<&str> {
        self.video_codec.as_deref()
    }

    pub fn filter(&self) -> Option<&VideoFilter> {
        self.video_filter.as_ref()
    }

    pub fn extra_input_args(&self) -> &[String] {
        &self.input_args
    }

    pub fn codec_args(&self) -> &[String] {
        &self.video_args
    }

    pub fn extra_output_args(&self) -> &[String] {
        &self.output_args
    }

    /// Audio codec, when audio is encoded.
    pub fn audio_codec(&self) -> Option<&str> {
        match &self.audio {
            AudioOutput::Encode { codec, .. } => Some(codec),
            _ => None,
        }
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        // Overwrite flag
        if self.overwrite {
            args.push("-y".to_string());
        }

        // Log level
        args.push("-v".to_string());
        args.push(self.log_level.clone());

        // Input args
        args.extend(self.input_args.iter().cloned());

        if let Some(start) = self.start {
            args.push("-ss".to_string());
            args.push(format!("{:.3}", start));
        }

        // Input file
        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        if let Some(duration) = self.duration {
            args.push("-t".to_string());
            args.push(format!("{:.3}", duration));
        }

        if let Some(filter) = &self.video_filter {
            args.push("-vf".to_string());
            args.push(filter.to_string());
        }

        if let Some(codec) = &self.video_codec {
            args.push("-c:v".to_string());
            args.push(codec.clone());
        }
        args.extend(self.video_args.iter().cloned());

        match &self.audio {
            AudioOutput::Unspecified => {}
            AudioOutput::Disabled => args.push("-an".to_string()),
            AudioOutput::Encode { codec, args: audio_args } => {
                args.push("-c:a".to_string());
                args.push(codec.clone());
                args.extend(audio_args.iter().cloned());
            }
        }

        args.extend(self.output_args.iter().cloned());
        args.extend(self.format.iter().cloned());

        // Output
        match &self.output {
            OutputTarget::File(path) => args.push(path.to_string_lossy().to_string()),
            OutputTarget::Pipe => args.push("-".to_string()),
        }

        args
    }
}

/// The external frame-processing capability.
#[async_trait]
pub trait FrameProcessor: Send + Sync {
    /// Execute a command that writes its output file.
    async fn run(&self, cmd: &FfmpegCommand, cancel: &CancelToken) -> MediaResult<()>;

    /// Execute a command and return what it wrote to stdout.
    async fn output(&self, cmd: &FfmpegCommand, cancel: &CancelToken) -> MediaResult<Vec<u8>>;
}

/// Runner for FFmpeg commands with cancellation.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    binary: PathBuf,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegRunner {
    /// Create a runner using `ffmpeg` from PATH at spawn time.
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
        }
    }

    /// Create a runner for an explicit binary.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Resolve `ffmpeg` in PATH up front.
    pub fn locate() -> MediaResult<Self> {
        check_ffmpeg().map(Self::with_binary)
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    async fn execute(
        &self,
        cmd: &FfmpegCommand,
        cancel: &CancelToken,
        capture_stdout: bool,
    ) -> MediaResult<Vec<u8>> {
        if cancel.is_cancelled() {
            return Err(MediaError::Cancelled);
        }

        let args = cmd.build_args();
        debug!("Running FFmpeg: {} {}", self.binary.display(), args.join(" "));

        let stdout = if capture_stdout {
            Stdio::piped()
        } else {
            Stdio::null()
        };

        let child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => MediaError::FfmpegNotFound,
                _ => MediaError::Io(e),
            })?;

        let started = Instant::now();

        // Dropping the wait future drops the child, which kills it.
        let output = tokio::select! {
            output = child.wait_with_output() => output?,
            _ = cancel.cancelled() => {
                info!("FFmpeg cancelled, killing process");
                metrics::record_ffmpeg_duration("cancelled", started.elapsed().as_secs_f64());
                return Err(MediaError::Cancelled);
            }
        };

        let status = if output.status.success() { "success" } else { "failed" };
        metrics::record_ffmpeg_duration(status, started.elapsed().as_secs_f64());

        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some(String::from_utf8_lossy(&output.stderr).to_string()),
                output.status.code(),
            ))
        }
    }
}

#[async_trait]
impl FrameProcessor for FfmpegRunner {
    async fn run(&self, cmd: &FfmpegCommand, cancel: &CancelToken) -> MediaResult<()> {
        self.execute(cmd, cancel, false).await.map(|_| ())
    }

    async fn output(&self, cmd: &FfmpegCommand, cancel: &CancelToken) -> MediaResult<Vec<u8>> {
        self.execute(cmd, cancel, true).await
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("input.mp4", "output.mp4")
            .seek(10.0)
            .duration(20.0)
            .video_filter(VideoFilter::new().scale_width(640))
            .video_codec("libx264")
            .video_args(["-crf", "24"])
            .no_audio();

        let args = cmd.build_args();
        assert_eq!(
            args,
            vec![
                "-y", "-v", "error", "-ss", "10.000", "-i", "input.mp4", "-t", "20.000", "-vf",
                "scale=640:-2", "-c:v", "libx264", "-crf", "24", "-an", "output.mp4",
            ]
        );
    }

    #[test]
    fn test_input_args_precede_seek_and_input() {
        let cmd = FfmpegCommand::new("in.mp4", "out.jpg")
            .input_args(["-hwaccel", "cuda"])
            .seek(1.5);
        let args = cmd.build_args();
        let hw = args.iter().position(|a| a == "-hwaccel").unwrap();
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(hw < ss && ss < input);
    }

    #[test]
    fn test_piped_output_and_audio() {
        let cmd = FfmpegCommand::piped("in.mp4")
            .audio("aac", "64k")
            .format("rawvideo");
        let args = cmd.build_args();
        assert_eq!(args.last().map(String::as_str), Some("-"));
        assert!(args.windows(2).any(|w| w == ["-c:a", "aac"]));
        assert!(args.windows(2).any(|w| w == ["-b:a", "64k"]));
        assert!(args.windows(2).any(|w| w == ["-f", "rawvideo"]));
        assert_eq!(cmd.output_path(), None);
        assert_eq!(cmd.audio_codec(), Some("aac"));
    }

    #[test]
    fn test_empty_filter_is_omitted() {
        let cmd = FfmpegCommand::new("in.mp4", "out.mp4").video_filter(VideoFilter::new());
        assert!(!cmd.build_args().contains(&"-vf".to_string()));
        assert!(cmd.filter().is_none());
    }

    #[tokio::test]
    async fn test_runner_refuses_cancelled_context() {
        let runner = FfmpegRunner::with_binary("/nonexistent/ffmpeg");
        let cancel = CancelToken::new();
        cancel.cancel();

        let cmd = FfmpegCommand::new("in.mp4", "out.mp4");
        let err = runner.run(&cmd, &cancel).await.unwrap_err();
        assert!(matches!(err, MediaError::Cancelled));
    }

    #[tokio::test]
    async fn test_runner_missing_binary() {
        let runner = FfmpegRunner::with_binary("/nonexistent/ffmpeg");
        let cmd = FfmpegCommand::new("in.mp4", "out.mp4");
        let err = runner.run(&cmd, &CancelToken::new()).await.unwrap_err();
        assert!(matches!(err, MediaError::FfmpegNotFound));
    }
}
