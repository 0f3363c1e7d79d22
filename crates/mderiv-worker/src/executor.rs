//! Job executor.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{info, warn, Instrument};

use mderiv_media::probe::{probe_video_with, VideoInfo};
use mderiv_media::{
    generate_fingerprint, probe_video, sweep_temp_files, CancelToken, DetectedHwCodecs,
    FfmpegRunner, FrameProcessor, GenerationOutcome, Generator, HardwareCodecs, MarkerPaths,
};
use mderiv_models::VideoFile;

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::job::{Job, JobReport, JobRequest, JobStatus};
use crate::logging::JobLogger;
use crate::metrics;

enum JobOutput {
    Generated(GenerationOutcome),
    Fingerprint(u64),
}

/// Runs batches of generation jobs with bounded concurrency.
#[derive(Clone)]
pub struct JobExecutor {
    config: Arc<WorkerConfig>,
    generator: Generator,
    processor: Arc<dyn FrameProcessor>,
    job_semaphore: Arc<Semaphore>,
}

impl JobExecutor {
    /// Resolve FFmpeg, detect hardware encoders and prepare the output root.
    pub async fn initialize(config: WorkerConfig) -> WorkerResult<Self> {
        let runner = match &config.ffmpeg {
            Some(path) => FfmpegRunner::with_binary(path),
            None => FfmpegRunner::locate().unwrap_or_else(|e| {
                warn!("{}; falling back to `ffmpeg` at spawn time", e);
                FfmpegRunner::new()
            }),
        };

        let hw_codecs = if config.transcode.hardware_acceleration {
            DetectedHwCodecs::detect(&runner).await.unwrap_or_else(|e| {
                warn!("Hardware encoder detection failed, using software: {}", e);
                DetectedHwCodecs::none()
            })
        } else {
            DetectedHwCodecs::none()
        };

        tokio::fs::create_dir_all(&config.generated_dir).await?;

        Ok(Self::with_processor(
            config,
            Arc::new(runner),
            Arc::new(hw_codecs),
        ))
    }

    /// Build an executor around an existing frame processor.
    pub fn with_processor(
        config: WorkerConfig,
        processor: Arc<dyn FrameProcessor>,
        hw_codecs: Arc<dyn HardwareCodecs>,
    ) -> Self {
        let paths = Arc::new(MarkerPaths::new(&config.generated_dir));
        let generator = Generator::new(Arc::clone(&processor), paths)
            .with_config(config.transcode.clone())
            .with_hardware_codecs(hw_codecs)
            .with_overwrite(config.overwrite_policy());
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));

        Self {
            config: Arc::new(config),
            generator,
            processor,
            job_semaphore,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    /// Run every job and return one report per job, in input order.
    ///
    /// Leftover temp files under the output root are swept first. Each job
    /// runs under a child of `cancel`.
    pub async fn run(&self, jobs: Vec<JobRequest>, cancel: &CancelToken) -> Vec<JobReport> {
        match sweep_temp_files(&self.config.generated_dir).await {
            Ok(0) => {}
            Ok(n) => info!("Removed {} leftover temp files", n),
            Err(e) => warn!("Temp file sweep failed: {}", e),
        }

        info!(
            "Running {} jobs with {} max concurrent",
            jobs.len(),
            self.config.max_concurrent_jobs
        );

        let mut handles = Vec::with_capacity(jobs.len());
        for request in jobs {
            let job_id = request.job_id();
            let kind = request.job.kind();
            let executor = self.clone();
            let ctx = cancel.child();
            let id = job_id.clone();

            let handle = tokio::spawn(async move {
                let started_at = Utc::now();
                let _permit = match Arc::clone(&executor.job_semaphore).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return JobReport::failed(id, kind, JobStatus::Failed, e, started_at)
                    }
                };
                executor.execute(id, request.job, &ctx).await
            });
            handles.push((job_id, kind, handle));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for (job_id, kind, handle) in handles {
            let report = match handle.await {
                Ok(report) => report,
                Err(e) => JobReport::failed(
                    job_id,
                    kind,
                    JobStatus::Failed,
                    format!("job task panicked: {}", e),
                    Utc::now(),
                ),
            };
            metrics::record_job(&report);
            reports.push(report);
        }
        reports
    }

    /// Run one job to a report.
    pub async fn execute(&self, job_id: String, job: Job, cancel: &CancelToken) -> JobReport {
        let logger = JobLogger::new(&job_id, job.kind(), job.input());
        let started_at = Utc::now();

        let result = async {
            logger.started();
            self.dispatch(&job, cancel).await
        }
        .instrument(logger.span())
        .await;

        match result {
            Ok(JobOutput::Generated(outcome)) => {
                logger.generated(&outcome);
                JobReport::generated(job_id, job.kind(), outcome, started_at)
            }
            Ok(JobOutput::Fingerprint(hash)) => {
                logger.fingerprinted(hash);
                JobReport::fingerprint(job_id, hash, started_at)
            }
            Err(e) => {
                logger.failed(&e);
                let status = if e.is_cancellation() {
                    JobStatus::Cancelled
                } else {
                    JobStatus::Failed
                };
                JobReport::failed(job_id, job.kind(), status, e, started_at)
            }
        }
    }

    async fn dispatch(&self, job: &Job, cancel: &CancelToken) -> WorkerResult<JobOutput> {
        let outcome = match job {
            Job::PreviewClip {
                input,
                hash,
                seconds,
                end_seconds,
                include_audio,
            } => {
                self.generator
                    .preview_clip(cancel, input, hash, *seconds, *end_seconds, *include_audio)
                    .await?
            }
            Job::AnimatedThumbnail {
                input,
                hash,
                seconds,
            } => {
                self.generator
                    .animated_thumbnail(cancel, input, hash, *seconds)
                    .await?
            }
            Job::Screenshot {
                input,
                hash,
                seconds,
                width,
            } => {
                self.generator
                    .screenshot(cancel, input, hash, *seconds, *width)
                    .await?
            }
            Job::Fingerprint { input, duration } => {
                let video = match duration {
                    Some(d) => VideoFile::new(input, *d, String::new()),
                    None => self.probe_input(input).await?.to_video_file(input, String::new()),
                };
                let hash = generate_fingerprint(
                    Arc::clone(&self.processor),
                    &video,
                    Some(self.generator.config()),
                    cancel,
                )
                .await?;
                return Ok(JobOutput::Fingerprint(hash));
            }
        };
        Ok(JobOutput::Generated(outcome))
    }

    async fn probe_input(&self, input: &Path) -> WorkerResult<VideoInfo> {
        let info = match &self.config.ffprobe {
            Some(ffprobe) => probe_video_with(ffprobe, input).await?,
            None => probe_video(input).await?,
        };
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use async_trait::async_trait;
    use mderiv_media::{FfmpegCommand, MediaError, MediaResult};

    /// Writes the descriptor's arguments to its output file.
    struct WritingProcessor;

    #[async_trait]
    impl FrameProcessor for WritingProcessor {
        async fn run(&self, cmd: &FfmpegCommand, _cancel: &CancelToken) -> MediaResult<()> {
            let path = cmd
                .output_path()
                .ok_or_else(|| MediaError::internal("no output path"))?;
            tokio::fs::write(path, cmd.build_args().join(" ")).await?;
            Ok(())
        }

        async fn output(&self, _cmd: &FfmpegCommand, _cancel: &CancelToken) -> MediaResult<Vec<u8>> {
            Err(MediaError::internal("sampling not supported"))
        }
    }

    fn executor(root: &Path) -> JobExecutor {
        let config = WorkerConfig {
            generated_dir: root.to_path_buf(),
            max_concurrent_jobs: 2,
            ffprobe: Some(PathBuf::from("/nonexistent/ffprobe")),
            ..Default::default()
        };
        JobExecutor::with_processor(
            config,
            Arc::new(WritingProcessor),
            Arc::new(DetectedHwCodecs::none()),
        )
    }

    fn screenshot(id: &str) -> JobRequest {
        JobRequest {
            id: Some(id.to_string()),
            job: Job::Screenshot {
                input: PathBuf::from("/library/a.mp4"),
                hash: "abc".to_string(),
                seconds: 12.0,
                width: 320,
            },
        }
    }

    #[tokio::test]
    async fn test_reports_keep_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor(dir.path());

        let mut jobs = vec![screenshot("first")];
        jobs.push(JobRequest {
            id: Some("second".to_string()),
            job: Job::AnimatedThumbnail {
                input: PathBuf::from("/library/a.mp4"),
                hash: "abc".to_string(),
                seconds: 12.0,
            },
        });

        let reports = executor.run(jobs, &CancelToken::new()).await;

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].job_id, "first");
        assert_eq!(reports[0].status, JobStatus::Published);
        assert_eq!(reports[0].output, Some(dir.path().join("abc/12_320.jpg")));
        assert_eq!(reports[1].job_id, "second");
        assert_eq!(reports[1].output, Some(dir.path().join("abc/12.webp")));
    }

    #[tokio::test]
    async fn test_missing_ffprobe_fails_fingerprint_job() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor(dir.path());

        let job = Job::Fingerprint {
            input: PathBuf::from("/library/a.mp4"),
            duration: None,
        };
        let report = executor
            .execute("fp".to_string(), job, &CancelToken::new())
            .await;

        assert_eq!(report.status, JobStatus::Failed);
        assert!(report.error.is_some());
        assert!(report.fingerprint.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_fingerprint_duration_comes_from_ffprobe() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("a.mp4");
        tokio::fs::write(&input, b"video").await.unwrap();

        let ffprobe = dir.path().join("ffprobe");
        tokio::fs::write(
            &ffprobe,
            "#!/bin/sh\necho '{\"streams\":[{\"codec_type\":\"video\"}],\"format\":{\"duration\":\"100.0\"}}'\n",
        )
        .await
        .unwrap();
        std::fs::set_permissions(&ffprobe, std::fs::Permissions::from_mode(0o755)).unwrap();

        let config = WorkerConfig {
            generated_dir: dir.path().join("generated"),
            ffprobe: Some(ffprobe),
            ..Default::default()
        };
        let executor = JobExecutor::with_processor(
            config,
            Arc::new(WritingProcessor),
            Arc::new(DetectedHwCodecs::none()),
        );

        let job = Job::Fingerprint { input, duration: None };
        let report = executor
            .execute("fp".to_string(), job, &CancelToken::new())
            .await;

        // The duration was accepted, so the job got as far as frame sampling.
        assert_eq!(report.status, JobStatus::Failed);
        assert!(report.error.unwrap().contains("sampling not supported"));
    }

    #[tokio::test]
    async fn test_cancelled_batch_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let executor = executor(dir.path());
        let cancel = CancelToken::new();
        cancel.cancel();

        let reports = executor.run(vec![screenshot("s")], &cancel).await;

        assert_eq!(reports[0].status, JobStatus::Cancelled);
        assert!(reports[0].is_failure());
        assert!(!dir.path().join("abc/12_320.jpg").exists());
    }

    #[tokio::test]
    async fn test_escaping_hash_fails_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("markers");
        let executor = executor(&root);

        let job = Job::Screenshot {
            input: PathBuf::from("/library/a.mp4"),
            hash: "../outside".to_string(),
            seconds: 1.0,
            width: 320,
        };
        let report = executor
            .execute("bad".to_string(), job, &CancelToken::new())
            .await;

        assert_eq!(report.status, JobStatus::Failed);
        assert!(report.error.unwrap().contains("Invalid content hash"));
        assert!(!dir.path().join("outside").exists());
    }
}
