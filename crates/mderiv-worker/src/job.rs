//! Generation jobs and their reports.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mderiv_media::GenerationOutcome;
use mderiv_models::ArtifactKind;

/// One unit of work, tagged by `type` in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Job {
    PreviewClip {
        input: PathBuf,
        hash: String,
        seconds: f64,
        #[serde(default)]
        end_seconds: Option<f64>,
        #[serde(default)]
        include_audio: bool,
    },
    AnimatedThumbnail {
        input: PathBuf,
        hash: String,
        seconds: f64,
    },
    Screenshot {
        input: PathBuf,
        hash: String,
        seconds: f64,
        width: u32,
    },
    Fingerprint {
        input: PathBuf,
        /// Probed with ffprobe when absent
        #[serde(default)]
        duration: Option<f64>,
    },
}

impl Job {
    /// Operation name used in logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Job::PreviewClip { .. } => ArtifactKind::PreviewClip.as_str(),
            Job::AnimatedThumbnail { .. } => ArtifactKind::AnimatedThumbnail.as_str(),
            Job::Screenshot { .. } => ArtifactKind::Screenshot.as_str(),
            Job::Fingerprint { .. } => "fingerprint",
        }
    }

    pub fn input(&self) -> &Path {
        match self {
            Job::PreviewClip { input, .. }
            | Job::AnimatedThumbnail { input, .. }
            | Job::Screenshot { input, .. }
            | Job::Fingerprint { input, .. } => input,
        }
    }
}

/// A job with an optional caller-chosen ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub job: Job,
}

impl JobRequest {
    pub fn new(job: Job) -> Self {
        Self { id: None, job }
    }

    /// The caller's ID, or a fresh one.
    pub fn job_id(&self) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| format!("job-{}", Uuid::new_v4()))
    }
}

/// Parse a batch: either a JSON array of jobs or one job per line.
pub fn parse_jobs(text: &str) -> serde_json::Result<Vec<JobRequest>> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed);
    }
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(serde_json::from_str)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Published,
    Skipped,
    Fingerprint,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Published => "published",
            JobStatus::Skipped => "skipped",
            JobStatus::Fingerprint => "fingerprint",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

/// Result of one job, printed as one JSON line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: String,
    pub kind: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    /// 64-bit fingerprint as 16 hex digits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl JobReport {
    fn base(job_id: String, kind: &str, status: JobStatus, started_at: DateTime<Utc>) -> Self {
        Self {
            job_id,
            kind: kind.to_string(),
            status,
            output: None,
            fingerprint: None,
            error: None,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn generated(
        job_id: String,
        kind: &str,
        outcome: GenerationOutcome,
        started_at: DateTime<Utc>,
    ) -> Self {
        let status = match outcome {
            GenerationOutcome::Published(_) => JobStatus::Published,
            GenerationOutcome::Skipped(_) => JobStatus::Skipped,
        };
        Self {
            output: Some(outcome.path().to_path_buf()),
            ..Self::base(job_id, kind, status, started_at)
        }
    }

    pub fn fingerprint(job_id: String, hash: u64, started_at: DateTime<Utc>) -> Self {
        Self {
            fingerprint: Some(format!("{:016x}", hash)),
            ..Self::base(job_id, "fingerprint", JobStatus::Fingerprint, started_at)
        }
    }

    pub fn failed(
        job_id: String,
        kind: &str,
        status: JobStatus,
        error: impl ToString,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::base(job_id, kind, status, started_at)
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, JobStatus::Failed | JobStatus::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_job_array() {
        let jobs = parse_jobs(
            r#"[
                {"type": "preview_clip", "input": "/v/a.mp4", "hash": "abc", "seconds": 12.5,
                 "end_seconds": 20.0, "include_audio": true},
                {"id": "shot-1", "type": "screenshot", "input": "/v/a.mp4", "hash": "abc",
                 "seconds": 3, "width": 640},
                {"type": "fingerprint", "input": "/v/a.mp4"}
            ]"#,
        )
        .unwrap();

        assert_eq!(jobs.len(), 3);
        assert_eq!(
            jobs[0].job,
            Job::PreviewClip {
                input: PathBuf::from("/v/a.mp4"),
                hash: "abc".to_string(),
                seconds: 12.5,
                end_seconds: Some(20.0),
                include_audio: true,
            }
        );
        assert_eq!(jobs[1].job_id(), "shot-1");
        assert_eq!(jobs[1].job.kind(), "screenshot");
        assert_eq!(
            jobs[2].job,
            Job::Fingerprint {
                input: PathBuf::from("/v/a.mp4"),
                duration: None,
            }
        );
        assert!(jobs[2].job_id().starts_with("job-"));
    }

    #[test]
    fn test_parse_json_lines() {
        let jobs = parse_jobs(
            "{\"type\": \"animated_thumbnail\", \"input\": \"/v/b.mp4\", \"hash\": \"h\", \"seconds\": 1}\n\n\
             {\"type\": \"fingerprint\", \"input\": \"/v/b.mp4\", \"duration\": 61.5}\n",
        )
        .unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].job.input(), Path::new("/v/b.mp4"));
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(parse_jobs(r#"[{"type": "gif", "input": "/v/a.mp4"}]"#).is_err());
    }

    #[test]
    fn test_report_serialization() {
        let report = JobReport::fingerprint("j".to_string(), 0xff, Utc::now());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "fingerprint");
        assert_eq!(json["fingerprint"], "00000000000000ff");
        assert!(json.get("error").is_none());
        assert!(!report.is_failure());
    }
}
