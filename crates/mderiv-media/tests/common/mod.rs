//! Fake frame processors shared by the integration tests.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use tokio::sync::Notify;

use mderiv_media::{CancelToken, FfmpegCommand, FrameProcessor, MediaError, MediaResult};

fn output_path(cmd: &FfmpegCommand) -> MediaResult<&std::path::Path> {
    cmd.output_path()
        .ok_or_else(|| MediaError::internal("descriptor has no output file"))
}

/// Sleeps, then writes its descriptor to the output. Tracks peak concurrency.
#[derive(Default)]
pub struct SlowProcessor {
    pub delay: Duration,
    pub calls: AtomicUsize,
    active: AtomicUsize,
    pub peak: AtomicUsize,
    pub started: Notify,
}

impl SlowProcessor {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Default::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameProcessor for SlowProcessor {
    async fn run(&self, cmd: &FfmpegCommand, cancel: &CancelToken) -> MediaResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.started.notify_one();

        let result = tokio::select! {
            _ = tokio::time::sleep(self.delay) => {
                let path = output_path(cmd)?;
                tokio::fs::write(path, cmd.build_args().join(" ")).await?;
                Ok(())
            }
            _ = cancel.cancelled() => Err(MediaError::Cancelled),
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn output(&self, _cmd: &FfmpegCommand, _cancel: &CancelToken) -> MediaResult<Vec<u8>> {
        Err(MediaError::internal("not a sampling fake"))
    }
}

/// Writes part of the output, then reports an FFmpeg failure.
#[derive(Default)]
pub struct FailingProcessor {
    pub calls: AtomicUsize,
}

#[async_trait]
impl FrameProcessor for FailingProcessor {
    async fn run(&self, cmd: &FfmpegCommand, _cancel: &CancelToken) -> MediaResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(output_path(cmd)?, b"\x00\x00\x00\x18ftypmp42").await?;
        Err(MediaError::ffmpeg_failed(
            "FFmpeg exited with non-zero status",
            Some("Conversion failed!".to_string()),
            Some(1),
        ))
    }

    async fn output(&self, _cmd: &FfmpegCommand, _cancel: &CancelToken) -> MediaResult<Vec<u8>> {
        Err(MediaError::internal("not a sampling fake"))
    }
}

/// Returns a synthetic BMP frame whose content depends on the seek offset.
#[derive(Default)]
pub struct FrameSource {
    pub seeks: Mutex<Vec<f64>>,
    pub garbage: bool,
}

impl FrameSource {
    pub fn seeks(&self) -> Vec<f64> {
        self.seeks.lock().unwrap().clone()
    }
}

pub fn bmp_frame(width: u32, height: u32, seconds: f64) -> Vec<u8> {
    let shift = (seconds * 7.0) as u32;
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            ((x + shift) * 255 / (width + shift)) as u8,
            ((y * 3 + shift) % 256) as u8,
            (shift % 256) as u8,
        ])
    });
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Bmp)
        .unwrap();
    buf.into_inner()
}

#[async_trait]
impl FrameProcessor for FrameSource {
    async fn run(&self, _cmd: &FfmpegCommand, _cancel: &CancelToken) -> MediaResult<()> {
        Err(MediaError::internal("not a writing fake"))
    }

    async fn output(&self, cmd: &FfmpegCommand, cancel: &CancelToken) -> MediaResult<Vec<u8>> {
        if cancel.is_cancelled() {
            return Err(MediaError::Cancelled);
        }
        let seconds = cmd.start().unwrap_or_default();
        self.seeks.lock().unwrap().push(seconds);
        if self.garbage {
            return Ok(b"not a bitmap".to_vec());
        }
        Ok(bmp_frame(160, 90, seconds))
    }
}
