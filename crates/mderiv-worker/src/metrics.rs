//! Prometheus recorder for the worker process.
//!
//! There is no scrape endpoint: the worker renders a text snapshot after
//! the batch instead.

use std::path::Path;

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::error::{WorkerError, WorkerResult};
use crate::job::JobReport;

pub mod names {
    pub const JOBS_TOTAL: &str = "mderiv_jobs_total";
}

/// Install the global Prometheus recorder.
pub fn init_metrics() -> WorkerResult<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| WorkerError::config_error(format!("metrics recorder: {}", e)))
}

/// Count one finished job by kind and status.
pub fn record_job(report: &JobReport) {
    let labels = [
        ("kind", report.kind.clone()),
        ("status", report.status.as_str().to_string()),
    ];
    counter!(names::JOBS_TOTAL, &labels).increment(1);
}

/// Write the rendered exposition text to `path`.
pub async fn write_snapshot(handle: &PrometheusHandle, path: &Path) -> WorkerResult<()> {
    tokio::fs::write(path, handle.render()).await?;
    Ok(())
}
