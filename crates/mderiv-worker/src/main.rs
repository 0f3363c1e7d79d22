//! Derived media worker binary.
//!
//! Reads a batch of jobs (JSON array or JSON lines) from the file named by
//! the first argument, or stdin when absent or `-`, and prints one JSON
//! report per job to stdout.

use tokio::io::AsyncReadExt;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mderiv_media::CancelToken;
use mderiv_worker::metrics::{init_metrics, write_snapshot};
use mderiv_worker::{parse_jobs, JobExecutor, WorkerConfig};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries the reports
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("mderiv=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting mderiv-worker");

    let metrics_handle = match init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("{}", e);
            None
        }
    };

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let source = std::env::args().nth(1);
    let text = match read_batch(source.as_deref()).await {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to read jobs: {}", e);
            std::process::exit(2);
        }
    };

    let jobs = match parse_jobs(&text) {
        Ok(jobs) => jobs,
        Err(e) => {
            error!("Failed to parse jobs: {}", e);
            std::process::exit(2);
        }
    };

    let executor = match JobExecutor::initialize(config.clone()).await {
        Ok(executor) => executor,
        Err(e) => {
            error!("Failed to create job executor: {}", e);
            std::process::exit(1);
        }
    };

    // Ctrl-C cancels every in-flight job
    let root = CancelToken::new();
    let signal_token = root.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            signal_token.cancel();
        }
    });

    let reports = executor.run(jobs, &root).await;

    let mut failed = 0usize;
    for report in &reports {
        if report.is_failure() {
            failed += 1;
        }
        match serde_json::to_string(report) {
            Ok(line) => println!("{}", line),
            Err(e) => error!("Failed to serialize report {}: {}", report.job_id, e),
        }
    }

    if let (Some(handle), Some(path)) = (&metrics_handle, &config.metrics_file) {
        if let Err(e) = write_snapshot(handle, path).await {
            warn!("Failed to write metrics to {}: {}", path.display(), e);
        }
    }

    info!("Batch complete: {} jobs, {} failed", reports.len(), failed);

    if failed > 0 {
        std::process::exit(1);
    }
}

async fn read_batch(source: Option<&str>) -> std::io::Result<String> {
    match source {
        None | Some("-") => {
            let mut text = String::new();
            tokio::io::stdin().read_to_string(&mut text).await?;
            Ok(text)
        }
        Some(path) => tokio::fs::read_to_string(path).await,
    }
}
