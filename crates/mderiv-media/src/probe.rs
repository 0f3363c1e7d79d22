//! FFprobe duration lookup for fingerprint jobs.

use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use mderiv_models::VideoFile;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// What fingerprinting needs to know about a source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    /// Container duration in seconds, 0 when ffprobe reports none
    pub duration: f64,
}

impl VideoInfo {
    /// Describe `path` for fingerprinting.
    pub fn to_video_file(&self, path: impl AsRef<Path>, hash: impl Into<String>) -> VideoFile {
        VideoFile::new(path, self.duration, hash)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeReport {
    #[serde(default)]
    format: Option<ProbeFormat>,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
}

/// Probe a video file with `ffprobe` from PATH.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let ffprobe = check_ffprobe()?;
    probe_video_with(ffprobe, path).await
}

/// Probe a video file with an explicit `ffprobe` binary.
pub async fn probe_video_with(ffprobe: impl AsRef<Path>, path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let output = Command::new(ffprobe.as_ref())
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "format=duration:stream=codec_type",
            "-print_format",
            "json",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => MediaError::FfprobeNotFound,
            _ => MediaError::Io(e),
        })?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("FFprobe failed on {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    let info = parse_probe_output(&output.stdout)?;
    debug!(input = %path.display(), duration = info.duration, "Probed");
    Ok(info)
}

/// Parse the JSON printed by the duration query.
pub fn parse_probe_output(json: &[u8]) -> MediaResult<VideoInfo> {
    let report: ProbeReport = serde_json::from_slice(json)?;

    if !report
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("video"))
    {
        return Err(MediaError::InvalidVideo("No video stream found".to_string()));
    }

    // A missing duration stays 0 so fingerprinting rejects it.
    let duration = report
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite())
        .unwrap_or(0.0);

    Ok(VideoInfo { duration })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        let json = br#"{
            "streams": [{"codec_type": "video"}],
            "format": {"duration": "125.480000"}
        }"#;

        let info = parse_probe_output(json).unwrap();
        assert!((info.duration - 125.48).abs() < 1e-9);

        let video = info.to_video_file("/v/a.mp4", "abc");
        assert_eq!(video.hash, "abc");
        assert!(video.has_duration());
    }

    #[test]
    fn test_missing_duration_is_zero() {
        let json = br#"{"streams": [{"codec_type": "video"}], "format": {}}"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.duration, 0.0);
        assert!(!info.to_video_file("/v/a.mp4", "").has_duration());
    }

    #[test]
    fn test_rejects_output_without_video() {
        let json = br#"{"format": {"duration": "3.0"}, "streams": []}"#;
        assert!(matches!(parse_probe_output(json), Err(MediaError::InvalidVideo(_))));
    }

    #[tokio::test]
    async fn test_missing_file_is_reported() {
        let err = probe_video_with("ffprobe", "/definitely/not/here.mp4").await.unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
