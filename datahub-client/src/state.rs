//! Client-side persisted state: a mapping from dataset name to its
//! last successfully installed `last_updated` (spec §4.6, §6.5).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use datahub_contracts::DatasetName;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientState(HashMap<String, DateTime<FixedOffset>>);

impl ClientState {
    pub async fn load(path: &Path) -> Result<Self, ClientError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn last_updated(&self, name: &DatasetName) -> Option<DateTime<FixedOffset>> {
        self.0.get(name.as_str()).copied()
    }

    pub fn set(&mut self, name: &DatasetName, last_updated: DateTime<FixedOffset>) {
        self.0.insert(name.as_str().to_string(), last_updated);
    }

    /// Write-to-temp-then-rename, mirroring the hub's state store so
    /// a reader of this file (a human, or a subsequent run) never
    /// observes a half-written document.
    pub async fn persist(&self, path: &Path) -> Result<(), ClientError> {
        let bytes = serde_json::to_vec_pretty(&self.0)?;
        let tmp_path = tmp_sibling(path);
        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, path).await?;
        Ok(())
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
