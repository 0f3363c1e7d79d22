//! Batch worker for derived media.
//!
//! This crate provides:
//! - Job parsing and per-job reports
//! - A bounded-concurrency executor over the media generators
//! - Structured job logging and a Prometheus snapshot

pub mod config;
pub mod error;
pub mod executor;
pub mod job;
pub mod logging;
pub mod metrics;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use job::{parse_jobs, Job, JobReport, JobRequest, JobStatus};
pub use logging::JobLogger;
