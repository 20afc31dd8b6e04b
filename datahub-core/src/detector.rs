//! Freshness detection over filesystem modification times.
//!
//! A dataset is "fresh" when enough of its files carry a modification
//! time newer than the dataset's currently published version. The
//! detector only ever reads the filesystem; it never mutates state and
//! never fails the pipeline — unreadable entries are logged and
//! excluded rather than propagated.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Local, Timelike};
use tracing::warn;

/// Only files with this extension are considered part of a dataset.
pub const RECOGNIZED_EXTENSION: &str = "csv";

#[derive(Debug, Clone)]
pub struct FileObservation {
    pub relative_path: PathBuf,
    pub mtime: DateTime<FixedOffset>,
}

/// Result of a single scan pass over a dataset's source directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    pub total: usize,
    pub newer_count: usize,
    pub newer_ratio: f64,
    /// The truncated mtime occurring most often across all observed
    /// files, ties broken toward the later timestamp. `None` only
    /// when `total == 0`.
    pub majority_minute: Option<DateTime<FixedOffset>>,
}

impl ScanResult {
    fn empty() -> Self {
        Self {
            total: 0,
            newer_count: 0,
            newer_ratio: 0.0,
            majority_minute: None,
        }
    }

    /// Spec §4.1 step 5: fresh iff `newer_ratio >= threshold`, and a
    /// dataset with zero observed files is never fresh.
    pub fn is_fresh(&self, threshold: f64) -> bool {
        self.total > 0 && self.newer_ratio >= threshold
    }

    /// Spec §4.1 debounce: two scans agree when `newer_ratio` matches
    /// within ±0.01 and the majority-minute is identical.
    pub fn agrees_with(&self, other: &ScanResult) -> bool {
        (self.newer_ratio - other.newer_ratio).abs() <= 0.01
            && self.majority_minute == other.majority_minute
    }
}

/// Truncate a timestamp to the configured granularity. Only `"minute"`
/// is implemented (spec §9).
fn truncate_to_minute(dt: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    dt.with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt)
}

/// Recursively enumerate regular `.csv` files under `source_path` and
/// read their truncated mtimes. Returns an empty vector, with a
/// warning logged, if `source_path` itself cannot be read — per spec
/// §4.1 an unreadable source directory yields *not fresh*, not an
/// error the caller must propagate.
pub fn collect_observations(source_path: &Path) -> Vec<FileObservation> {
    let mut observations = Vec::new();
    let mut dirs = vec![source_path.to_path_buf()];

    while let Some(dir) = dirs.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(path = %dir.display(), error = %err, "unreadable dataset source directory");
                continue;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    warn!(path = %dir.display(), error = %err, "unreadable directory entry");
                    continue;
                }
            };
            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(ft) => ft,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "cannot stat directory entry");
                    continue;
                }
            };

            if file_type.is_dir() {
                dirs.push(path);
                continue;
            }
            if !file_type.is_file() {
                continue;
            }
            let is_recognized = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case(RECOGNIZED_EXTENSION))
                .unwrap_or(false);
            if !is_recognized {
                continue;
            }

            let metadata = match fs::metadata(&path) {
                Ok(m) => m,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "unreadable file, excluded from scan");
                    continue;
                }
            };
            let modified = match metadata.modified() {
                Ok(m) => m,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "mtime unavailable, excluded from scan");
                    continue;
                }
            };
            let mtime: DateTime<Local> = modified.into();
            let mtime = truncate_to_minute(mtime.fixed_offset());
            let relative_path = path
                .strip_prefix(source_path)
                .unwrap_or(&path)
                .to_path_buf();
            observations.push(FileObservation { relative_path, mtime });
        }
    }

    observations
}

/// Majority-minute: the truncated mtime occurring most often, ties
/// broken toward the later timestamp (spec §4.1 step 4).
fn majority_minute(observations: &[FileObservation]) -> Option<DateTime<FixedOffset>> {
    let mut counts: HashMap<DateTime<FixedOffset>, usize> = HashMap::new();
    for obs in observations {
        *counts.entry(obs.mtime).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|(a_time, a_count), (b_time, b_count)| {
            a_count.cmp(b_count).then(a_time.cmp(b_time))
        })
        .map(|(time, _)| time)
}

/// Absent `last_updated` is treated as the Unix epoch (spec §4.1).
fn unix_epoch() -> DateTime<FixedOffset> {
    DateTime::<chrono::Utc>::from_timestamp(0, 0)
        .expect("epoch is representable")
        .fixed_offset()
}

/// Run one detector scan over `source_path`, comparing every file's
/// truncated mtime against `last_updated` (absent is treated as the
/// Unix epoch, per spec §4.1).
pub fn scan(source_path: &Path, last_updated: Option<DateTime<FixedOffset>>) -> ScanResult {
    let observations = collect_observations(source_path);
    let total = observations.len();
    if total == 0 {
        return ScanResult::empty();
    }

    let baseline = last_updated.unwrap_or_else(unix_epoch);
    let newer_count = observations.iter().filter(|o| o.mtime > baseline).count();
    let newer_ratio = newer_count as f64 / total as f64;

    ScanResult {
        total,
        newer_count,
        newer_ratio,
        majority_minute: majority_minute(&observations),
    }
}
