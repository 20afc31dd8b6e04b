//! Archive production with single-flight coalescing and retention
//! (spec §4.2).

use std::collections::HashMap;
use std::fs;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use datahub_contracts::DatasetName;
use futures::future::{FutureExt, Shared};
use tracing::{info, warn};
use zip::write::FileOptions;
use zip::ZipWriter;

use crate::error::CoreError;

#[derive(Debug, Clone)]
pub struct PackageResult {
    pub archive_path: PathBuf,
    pub file_count: u64,
    pub uncompressed_size: u64,
    pub compressed_size: u64,
}

type PackagingOutcome = Result<PackageResult, Arc<CoreError>>;
type PackagingFuture = Shared<Pin<Box<dyn Future<Output = PackagingOutcome> + Send>>>;

/// Coalesces concurrent packaging triggers for the same dataset into
/// one archive-build operation; the in-flight map only ever holds an
/// entry while a build is actually running.
#[derive(Debug, Default)]
pub struct Packager {
    inflight: tokio::sync::Mutex<HashMap<String, PackagingFuture>>,
}

impl Packager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn package(
        &self,
        name: &DatasetName,
        source_path: PathBuf,
        cache_dir: PathBuf,
        majority_minute: DateTime<FixedOffset>,
        keep_versions: usize,
    ) -> Result<PackageResult, CoreError> {
        let key = name.as_str().to_string();

        let shared = {
            let mut guard = self.inflight.lock().await;
            if let Some(existing) = guard.get(&key) {
                existing.clone()
            } else {
                let name = name.clone();
                let task: Pin<Box<dyn Future<Output = PackagingOutcome> + Send>> =
                    Box::pin(async move {
                        build_archive(&name, &source_path, &cache_dir, majority_minute)
                            .map_err(Arc::new)
                    });
                let shared = task.shared();
                guard.insert(key.clone(), shared.clone());
                shared
            }
        };

        let outcome = shared.await;

        {
            let mut guard = self.inflight.lock().await;
            guard.remove(&key);
        }

        match outcome {
            Ok(result) => {
                if let Err(err) = enforce_retention(name, &result.archive_path, keep_versions) {
                    warn!(dataset = name.as_str(), error = %err, "retention pass failed, continuing");
                }
                Ok(result)
            }
            Err(shared_err) => Err(match Arc::try_unwrap(shared_err) {
                Ok(owned) => owned,
                Err(arc) => CoreError::Packaging {
                    dataset: name.as_str().to_string(),
                    source: io::Error::new(io::ErrorKind::Other, arc.to_string()),
                },
            }),
        }
    }
}

/// Builds the archive synchronously on the calling task. Packaging is
/// CPU/IO-bound disk work, not socket work, so it runs directly rather
/// than via `spawn_blocking` — the Scheduler is the only caller and
/// already runs on its own dedicated task (spec §4.3, §5).
fn build_archive(
    name: &DatasetName,
    source_path: &Path,
    cache_dir: &Path,
    majority_minute: DateTime<FixedOffset>,
) -> Result<PackageResult, CoreError> {
    fs::create_dir_all(cache_dir).map_err(|source| CoreError::Packaging {
        dataset: name.as_str().to_string(),
        source,
    })?;

    let stamp = majority_minute.format("%Y%m%d_%H%M%S");
    let final_path = cache_dir.join(format!("{}_{}.zip", name.as_str(), stamp));
    let tmp_path = cache_dir.join(format!("{}_{}.zip.tmp", name.as_str(), stamp));

    let entries = crate::detector::collect_observations(source_path);

    let file = fs::File::create(&tmp_path).map_err(|source| CoreError::Packaging {
        dataset: name.as_str().to_string(),
        source,
    })?;
    let mut writer = ZipWriter::new(file);
    let mut uncompressed_size = 0u64;

    for entry in &entries {
        let options: FileOptions = FileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .last_modified_time(to_zip_datetime(entry.mtime));

        let basename = entry
            .relative_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unnamed.csv")
            .to_string();

        writer
            .start_file(basename, options)
            .map_err(|source| CoreError::Zip {
                dataset: name.as_str().to_string(),
                source,
            })?;

        let mut source_file = fs::File::open(source_path.join(&entry.relative_path)).map_err(|source| {
            CoreError::Packaging {
                dataset: name.as_str().to_string(),
                source,
            }
        })?;
        let written = io::copy(&mut source_file, &mut writer).map_err(|source| CoreError::Packaging {
            dataset: name.as_str().to_string(),
            source,
        })?;
        uncompressed_size += written;
    }

    let file = writer.finish().map_err(|source| CoreError::Zip {
        dataset: name.as_str().to_string(),
        source,
    })?;
    let compressed_size = file.metadata().map(|m| m.len()).unwrap_or(0);
    drop(file);

    fs::rename(&tmp_path, &final_path).map_err(|source| CoreError::Packaging {
        dataset: name.as_str().to_string(),
        source,
    })?;

    info!(
        dataset = name.as_str(),
        path = %final_path.display(),
        files = entries.len(),
        "archive published"
    );

    Ok(PackageResult {
        archive_path: final_path,
        file_count: entries.len() as u64,
        uncompressed_size,
        compressed_size,
    })
}

fn to_zip_datetime(dt: DateTime<FixedOffset>) -> zip::DateTime {
    zip::DateTime::from_date_and_time(
        dt.format("%Y").to_string().parse().unwrap_or(1980),
        dt.format("%m").to_string().parse().unwrap_or(1),
        dt.format("%d").to_string().parse().unwrap_or(1),
        dt.format("%H").to_string().parse().unwrap_or(0),
        dt.format("%M").to_string().parse().unwrap_or(0),
        dt.format("%S").to_string().parse().unwrap_or(0),
    )
    .unwrap_or_default()
}

/// Whether `filename` is exactly `{name}_{YYYYMMDD}_{HHMMSS}.zip` for
/// the given dataset `name` — a plain `starts_with({name}_)` check
/// would also match another dataset's archives whenever one name is a
/// prefix of the other (e.g. `trades` vs. `trades_archive`), letting
/// retention delete archives that do not belong to it.
fn is_archive_for_dataset(name: &str, filename: &str) -> bool {
    let Some(stem) = filename.strip_suffix(".zip") else {
        return false;
    };
    let Some(rest) = stem.strip_prefix(name).and_then(|r| r.strip_prefix('_')) else {
        return false;
    };
    let bytes = rest.as_bytes();
    bytes.len() == 15
        && bytes[..8].iter().all(u8::is_ascii_digit)
        && bytes[8] == b'_'
        && bytes[9..].iter().all(u8::is_ascii_digit)
}

/// Keeps the newest `keep_versions + 1` archives (the current one plus
/// `keep_versions` older versions, per invariant I3) and removes the
/// rest. Errors are logged, never fatal (spec §4.2).
fn enforce_retention(name: &DatasetName, just_written: &Path, keep_versions: usize) -> io::Result<()> {
    let cache_dir = just_written
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "archive has no parent directory"))?;

    let mut candidates: Vec<PathBuf> = fs::read_dir(cache_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| is_archive_for_dataset(name.as_str(), n))
                .unwrap_or(false)
        })
        .collect();

    candidates.sort_by(|a, b| b.file_name().cmp(&a.file_name()));

    let keep = keep_versions + 1;
    for stale in candidates.into_iter().skip(keep) {
        if let Err(err) = fs::remove_file(&stale) {
            warn!(path = %stale.display(), error = %err, "failed to remove retired archive");
        } else {
            info!(path = %stale.display(), "retired archive removed");
        }
    }

    Ok(())
}
