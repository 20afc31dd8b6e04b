//! JSON shapes exchanged over HTTP, per spec §6.1.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::dataset_name::DatasetName;

/// Body of `GET /api/datasets`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetListing {
    pub generated_at: DateTime<FixedOffset>,
    pub datasets: Vec<DatasetEntry>,
}

/// One dataset's row within a [`DatasetListing`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetEntry {
    pub name: DatasetName,
    pub last_updated: DateTime<FixedOffset>,
    pub file_count: u64,
    pub total_size: u64,
    pub package_ready: bool,
    pub package_size: u64,
}

impl DatasetListing {
    pub fn find(&self, name: &DatasetName) -> Option<&DatasetEntry> {
        self.datasets.iter().find(|d| &d.name == name)
    }
}
