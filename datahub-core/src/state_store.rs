//! Durable per-dataset metadata consumed by the HTTP server (spec
//! §4.4, §6.4).
//!
//! The document is a single JSON file keyed by dataset name. Writers
//! serialize the whole document and replace the file atomically
//! (write-to-temp, rename); readers take a snapshot of an in-memory
//! copy guarded by a `RwLock`, so a reader never observes a torn
//! write even while the Scheduler is mid-update.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use datahub_contracts::DatasetName;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::CoreError;

/// One dataset's row in the persisted document (spec §3, §6.4).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetState {
    pub last_updated: DateTime<FixedOffset>,
    pub file_count: u64,
    pub total_size: u64,
    pub package_ready: bool,
    pub package_size: u64,
    pub package_path: PathBuf,
    pub last_trigger_at: DateTime<FixedOffset>,
}

/// Fields written after a successful packaging run (spec §4.3 step 7).
#[derive(Debug, Clone)]
pub struct DatasetStateUpdate {
    pub last_updated: DateTime<FixedOffset>,
    pub file_count: u64,
    pub total_size: u64,
    pub package_size: u64,
    pub package_path: PathBuf,
    pub last_trigger_at: DateTime<FixedOffset>,
}

type Document = HashMap<String, DatasetState>;

/// A snapshot of the whole document at one instant, safe to hand to a
/// concurrent HTTP handler without holding any lock.
#[derive(Debug, Clone)]
pub struct StateSnapshot(Arc<Document>);

impl StateSnapshot {
    pub fn get(&self, name: &DatasetName) -> Option<&DatasetState> {
        self.0.get(name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DatasetState)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    document: RwLock<Arc<Document>>,
}

impl StateStore {
    /// Load an existing document from `path`, or start empty if it
    /// does not yet exist (first hub boot, spec §3 lifecycles).
    pub async fn load(path: PathBuf) -> Result<Self, CoreError> {
        let document = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| CoreError::StateParse {
                path: path.clone(),
                source,
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Document::new(),
            Err(err) => {
                return Err(CoreError::StateWrite {
                    path: path.clone(),
                    source: err,
                })
            }
        };

        Ok(Self {
            path,
            document: RwLock::new(Arc::new(document)),
        })
    }

    pub async fn get(&self, name: &DatasetName) -> Option<DatasetState> {
        self.document.read().await.get(name.as_str()).cloned()
    }

    pub async fn snapshot(&self) -> StateSnapshot {
        StateSnapshot(Arc::clone(&*self.document.read().await))
    }

    /// Apply a successful packaging result, upholding invariants
    /// (I1)–(I3): `last_updated` never regresses and the document is
    /// replaced on disk atomically before the in-memory copy is
    /// swapped in.
    pub async fn update(
        &self,
        name: &DatasetName,
        fields: DatasetStateUpdate,
    ) -> Result<(), CoreError> {
        let mut guard = self.document.write().await;
        let mut next = (**guard).clone();

        if let Some(existing) = next.get(name.as_str()) {
            if fields.last_updated < existing.last_updated {
                tracing::warn!(
                    dataset = name.as_str(),
                    "refusing state update: last_updated would regress"
                );
                return Ok(());
            }
        }

        next.insert(
            name.as_str().to_string(),
            DatasetState {
                last_updated: fields.last_updated,
                file_count: fields.file_count,
                total_size: fields.total_size,
                package_ready: true,
                package_size: fields.package_size,
                package_path: fields.package_path,
                last_trigger_at: fields.last_trigger_at,
            },
        );

        self.persist(&next).await?;
        *guard = Arc::new(next);
        Ok(())
    }

    async fn persist(&self, document: &Document) -> Result<(), CoreError> {
        let bytes = serde_json::to_vec_pretty(document).map_err(|source| CoreError::StateParse {
            path: self.path.clone(),
            source,
        })?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &bytes)
            .await
            .map_err(|source| CoreError::StateWrite {
                path: tmp_path.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|source| CoreError::StateWrite {
                path: self.path.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_update(when: DateTime<FixedOffset>) -> DatasetStateUpdate {
        DatasetStateUpdate {
            last_updated: when,
            file_count: 3,
            total_size: 1024,
            package_size: 512,
            package_path: PathBuf::from("/cache/trades_20260101_000000.zip"),
            last_trigger_at: Utc::now().fixed_offset(),
        }
    }

    #[tokio::test]
    async fn update_then_read_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = StateStore::load(path.clone()).await.unwrap();
        let name = DatasetName::new("trades").unwrap();
        let when = Utc::now().fixed_offset();

        store.update(&name, sample_update(when)).await.unwrap();
        let fetched = store.get(&name).await.unwrap();
        assert_eq!(fetched.last_updated, when);
        assert!(fetched.package_ready);

        let reloaded = StateStore::load(path).await.unwrap();
        let fetched_again = reloaded.get(&name).await.unwrap();
        assert_eq!(fetched_again.last_updated, when);
    }

    #[tokio::test]
    async fn update_refuses_to_regress_last_updated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = StateStore::load(path).await.unwrap();
        let name = DatasetName::new("trades").unwrap();
        let later = Utc::now().fixed_offset();
        let earlier = later - chrono::Duration::hours(1);

        store.update(&name, sample_update(later)).await.unwrap();
        store.update(&name, sample_update(earlier)).await.unwrap();

        let fetched = store.get(&name).await.unwrap();
        assert_eq!(fetched.last_updated, later);
    }

    #[tokio::test]
    async fn missing_document_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.json");
        let store = StateStore::load(path).await.unwrap();
        let name = DatasetName::new("trades").unwrap();
        assert!(store.get(&name).await.is_none());
    }
}
