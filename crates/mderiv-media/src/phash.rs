//! Video perceptual hash.
//!
//! Samples `columns * rows` frames between 5% and 95% of the duration, tiles
//! them into one sprite and reduces the sprite to a 64-bit DCT hash.

use std::sync::Arc;

use image::{DynamicImage, RgbaImage};
use image_hasher::{HashAlg, HasherConfig};
use tracing::{debug, info};

use mderiv_models::encoding::{PHASH_COLUMNS, PHASH_ROWS, PHASH_SAMPLE_WIDTH};
use mderiv_models::{TranscodeConfig, VideoFile};

use crate::cancel::CancelToken;
use crate::command::FrameProcessor;
use crate::error::{MediaError, MediaResult};
use crate::metrics;
use crate::sampler::{FrameSampler, SampleTarget};
use crate::sprite::assemble;

/// Side of the hash grid; 8x8 bits fill one `u64`.
const HASH_SIDE: u32 = 8;

/// Reduces an image to a 64-bit perceptual code.
pub trait PerceptualHasher: Send + Sync {
    fn hash(&self, img: &DynamicImage) -> MediaResult<u64>;
}

/// DCT-based perceptual hash backed by `image_hasher`.
///
/// The 8 hash bytes are packed big-endian, so the first byte ends up in the
/// top bits of the code.
#[derive(Debug, Clone, Copy, Default)]
pub struct DctHasher;

impl PerceptualHasher for DctHasher {
    fn hash(&self, img: &DynamicImage) -> MediaResult<u64> {
        if img.width() == 0 || img.height() == 0 {
            return Err(MediaError::InvalidComposite(format!(
                "cannot hash a {}x{} image",
                img.width(),
                img.height()
            )));
        }

        let hasher = HasherConfig::new()
            .hash_size(HASH_SIDE, HASH_SIDE)
            .hash_alg(HashAlg::Mean)
            .preproc_dct()
            .to_hasher();
        let hash = hasher.hash_image(img);

        let bytes: [u8; 8] = hash.as_bytes().try_into().map_err(|_| {
            MediaError::internal(format!(
                "expected an 8-byte hash, got {} bytes",
                hash.as_bytes().len()
            ))
        })?;
        Ok(u64::from_be_bytes(bytes))
    }
}

/// Number of differing bits between two fingerprints.
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// Sample offsets for a fingerprint of a video lasting `duration` seconds.
///
/// `offset = 5%`, `step = 90% / count`, sample `i` at `offset + i * step`.
pub fn sample_times(duration: f64, count: usize) -> MediaResult<Vec<f64>> {
    if !(duration.is_finite() && duration > 0.0) {
        return Err(MediaError::insufficient_samples(
            count,
            0,
            format!("video duration {} is not positive", duration),
        ));
    }

    let offset = 0.05 * duration;
    let step = (0.9 * duration) / count as f64;
    Ok((0..count).map(|i| offset + i as f64 * step).collect())
}

/// Fingerprint generator over a frame-processing capability.
#[derive(Clone)]
pub struct Fingerprinter {
    sampler: FrameSampler,
    hasher: Arc<dyn PerceptualHasher>,
    columns: u32,
    rows: u32,
    sample_width: u32,
}

impl Fingerprinter {
    /// Default 5x5 grid of 160px samples with the DCT hasher.
    pub fn new(processor: Arc<dyn FrameProcessor>, config: Option<&TranscodeConfig>) -> Self {
        let hardware = config.is_some_and(|c| c.hardware_acceleration);
        Self {
            sampler: FrameSampler::new(processor).with_hardware_acceleration(hardware),
            hasher: Arc::new(DctHasher),
            columns: PHASH_COLUMNS,
            rows: PHASH_ROWS,
            sample_width: PHASH_SAMPLE_WIDTH,
        }
    }

    /// Replace the reducer.
    pub fn with_hasher(mut self, hasher: Arc<dyn PerceptualHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Change the sprite grid.
    pub fn with_grid(mut self, columns: u32, rows: u32) -> Self {
        self.columns = columns;
        self.rows = rows;
        self
    }

    /// Sample the video and tile the frames into one sprite.
    pub async fn sprite(&self, cancel: &CancelToken, video: &VideoFile) -> MediaResult<RgbaImage> {
        info!("Generating phash sprite for {}", video.path.display());

        let count = (self.columns * self.rows) as usize;
        let times = sample_times(video.duration, count)?;

        let mut images = Vec::with_capacity(count);
        for time in times {
            let sample = self
                .sampler
                .sample_at(cancel, &video.path, time, self.sample_width, SampleTarget::Decoded)
                .await?;
            if let Some(img) = sample.into_image() {
                images.push(img);
            }
        }

        if images.len() < count {
            return Err(MediaError::insufficient_samples(
                count,
                images.len(),
                format!("failed to generate phash sprite for {}", video.path.display()),
            ));
        }

        assemble(&images, self.columns, self.rows)
    }

    /// Compute the fingerprint of `video`.
    pub async fn generate(&self, cancel: &CancelToken, video: &VideoFile) -> MediaResult<u64> {
        let result = self.generate_inner(cancel, video).await;
        let outcome = if result.is_ok() { "computed" } else { "failed" };
        metrics::record_fingerprint(outcome);
        result
    }

    async fn generate_inner(&self, cancel: &CancelToken, video: &VideoFile) -> MediaResult<u64> {
        let sprite = self.sprite(cancel, video).await?;
        let hash = self.hasher.hash(&DynamicImage::ImageRgba8(sprite))?;
        debug!("Computed phash {:016x} for {}", hash, video.path.display());
        Ok(hash)
    }
}

/// Compute the fingerprint of `video` with the default grid.
pub async fn generate_fingerprint(
    processor: Arc<dyn FrameProcessor>,
    video: &VideoFile,
    config: Option<&TranscodeConfig>,
    cancel: &CancelToken,
) -> MediaResult<u64> {
    Fingerprinter::new(processor, config).generate(cancel, video).await
}
