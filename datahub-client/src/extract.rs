//! Archive extraction into a fresh staging directory, with zip-slip
//! defense (spec §4.6 step 7).

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ClientError;

/// Extracts every entry of the zip at `archive_path` into `staging_dir`,
/// rejecting any entry whose resolved path would escape the staging
/// root (absolute paths, `..` segments, or a symlink-style escape via
/// `Component::ParentDir`).
pub fn extract_archive(archive_path: &Path, staging_dir: &Path) -> Result<(), ClientError> {
    fs::create_dir_all(staging_dir)?;
    let file = fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|source| ClientError::ArchiveInvalid {
        path: archive_path.to_path_buf(),
        source,
    })?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|source| ClientError::ArchiveInvalid {
                path: archive_path.to_path_buf(),
                source,
            })?;

        let raw_name = entry.name().to_string();
        let target = safe_join(staging_dir, &raw_name)?;

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out_file = fs::File::create(&target)?;
        std::io::copy(&mut entry, &mut out_file)?;
    }

    Ok(())
}

/// Joins `raw_name` onto `root`, rejecting absolute paths and any
/// `..` component — the zip-slip defense spec §4.6 requires.
fn safe_join(root: &Path, raw_name: &str) -> Result<PathBuf, ClientError> {
    let candidate = Path::new(raw_name);
    if candidate.is_absolute() {
        return Err(ClientError::ZipSlipDetected {
            entry: raw_name.to_string(),
        });
    }
    for component in candidate.components() {
        match component {
            std::path::Component::Normal(_) | std::path::Component::CurDir => {}
            _ => {
                return Err(ClientError::ZipSlipDetected {
                    entry: raw_name.to_string(),
                })
            }
        }
    }
    Ok(root.join(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn build_archive(entries: &[(&str, &[u8])]) -> tempfile::TempPath {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut writer = zip::ZipWriter::new(file.reopen().unwrap());
        for (name, contents) in entries {
            writer
                .start_file(*name, zip::write::FileOptions::default())
                .unwrap();
            writer.write_all(contents).unwrap();
        }
        writer.finish().unwrap();
        file.into_temp_path()
    }

    #[test]
    fn extracts_flat_entries() {
        let archive = build_archive(&[("trades.csv", b"a,b\n1,2\n")]);
        let staging = tempfile::tempdir().unwrap();
        extract_archive(&archive, staging.path()).unwrap();
        assert!(staging.path().join("trades.csv").exists());
    }

    #[test]
    fn rejects_parent_dir_traversal() {
        let archive = build_archive(&[("../escape.csv", b"x")]);
        let staging = tempfile::tempdir().unwrap();
        let result = extract_archive(&archive, staging.path());
        assert!(matches!(result, Err(ClientError::ZipSlipDetected { .. })));
    }

    #[test]
    fn rejects_absolute_entry_path() {
        let archive = build_archive(&[("/etc/passwd", b"x")]);
        let staging = tempfile::tempdir().unwrap();
        let result = extract_archive(&archive, staging.path());
        assert!(matches!(result, Err(ClientError::ZipSlipDetected { .. })));
    }
}
