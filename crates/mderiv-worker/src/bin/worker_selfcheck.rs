use std::path::Path;
use std::process::Command;

use mderiv_media::{check_ffmpeg, check_ffprobe, DetectedHwCodecs, FfmpegRunner, HardwareCodecs};
use mderiv_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    println!(
        "worker-selfcheck: starting with generated_dir={}",
        config.generated_dir.display()
    );
    ensure_generated_dir(&config.generated_dir).await?;

    let ffmpeg = match &config.ffmpeg {
        Some(path) => path.clone(),
        None => check_ffmpeg()?,
    };
    ensure_runs(&ffmpeg)?;

    let ffprobe = match &config.ffprobe {
        Some(path) => path.clone(),
        None => check_ffprobe()?,
    };
    ensure_runs(&ffprobe)?;

    let detected = DetectedHwCodecs::detect(&FfmpegRunner::with_binary(&ffmpeg)).await?;
    match detected.mp4_compatible() {
        Some(codec) => println!("worker-selfcheck: hardware encoder {}", codec.name),
        None => println!("worker-selfcheck: no hardware encoder, software only"),
    }

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_generated_dir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}

fn ensure_runs(binary: &Path) -> anyhow::Result<()> {
    let output = Command::new(binary)
        .arg("-version")
        .output()
        .map_err(|e| anyhow::anyhow!("{} not available: {}", binary.display(), e))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "{} -version failed: {:?}",
            binary.display(),
            output.status
        ));
    }
    Ok(())
}
