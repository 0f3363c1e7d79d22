//! Filesystem helpers for the temp-then-publish protocol.

use std::path::Path;

use tokio::fs;

use crate::error::MediaResult;

/// Prefix of every private temp file created next to an output.
pub const TEMP_PREFIX: &str = ".mderiv-tmp-";

/// Whether `path` exists and holds at least one byte.
pub async fn file_nonempty(path: impl AsRef<Path>) -> bool {
    match fs::metadata(path.as_ref()).await {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}

/// Whether a file name belongs to a temp artifact.
pub fn is_temp_file(name: &str) -> bool {
    name.starts_with(TEMP_PREFIX)
}

/// Remove leftover temp files anywhere under `dir`.
///
/// Meant to run when no generation is in flight (after a crash, before a
/// batch). A missing `dir` counts as clean. Returns how many files were removed.
pub async fn sweep_temp_files(dir: impl AsRef<Path>) -> MediaResult<usize> {
    let mut pending = vec![dir.as_ref().to_path_buf()];
    let mut removed = 0;

    while let Some(current) = pending.pop() {
        let mut entries = match fs::read_dir(&current).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            let path = entry.path();

            if file_type.is_dir() {
                pending.push(path);
            } else if is_temp_file(&entry.file_name().to_string_lossy()) {
                match fs::remove_file(&path).await {
                    Ok(()) => {
                        tracing::debug!("Removed stale temp file {}", path.display());
                        removed += 1;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to remove stale temp file {}: {}", path.display(), e);
                    }
                }
            }
        }
    }

    Ok(removed)
}
