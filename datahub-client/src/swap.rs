//! Atomic install of a freshly-extracted staging directory over the
//! dataset's target directory (spec §4.6 step 8).

use std::path::{Path, PathBuf};

use rand::Rng;

use crate::error::ClientError;

/// Renames `current` aside, renames `staging` into its place, then
/// removes the old copy. On any failure after the first rename, the
/// old copy is restored so the target directory is never left
/// missing or half-swapped.
pub async fn swap_in(staging: &Path, target: &Path) -> Result<(), ClientError> {
    let old_path = sibling_with_suffix(target, "old");

    let had_previous = tokio::fs::metadata(target).await.is_ok();
    if had_previous {
        tokio::fs::rename(target, &old_path)
            .await
            .map_err(|source| ClientError::SwapFailed {
                target: target.to_path_buf(),
                source,
            })?;
    }

    if let Err(source) = tokio::fs::rename(staging, target).await {
        if had_previous {
            let _ = tokio::fs::rename(&old_path, target).await;
        }
        return Err(ClientError::SwapFailed {
            target: target.to_path_buf(),
            source,
        });
    }

    if had_previous {
        // Best-effort cleanup; leaving a stale `.old-*` directory
        // behind is harmless and would just be cleared by a future
        // sync of the same dataset.
        tokio::spawn(async move {
            if let Err(err) = tokio::fs::remove_dir_all(&old_path).await {
                tracing::warn!(path = %old_path.display(), error = %err, "failed to clean up retired directory");
            }
        });
    }

    Ok(())
}

fn sibling_with_suffix(path: &Path, label: &str) -> PathBuf {
    let rand_suffix: u32 = rand::thread_rng().gen();
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{label}-{rand_suffix:08x}"));
    path.with_file_name(name)
}
