use std::path::PathBuf;

use datahub_contracts::HubErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to read dataset source directory {path:?}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build archive for dataset {dataset:?}: {source}")]
    Packaging {
        dataset: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build archive for dataset {dataset:?}: {source}")]
    Zip {
        dataset: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("failed to write state document {path:?}: {source}")]
    StateWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse state document {path:?}: {source}")]
    StateParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl CoreError {
    pub fn kind(&self) -> HubErrorKind {
        match self {
            Self::SourceUnreadable { .. } => HubErrorKind::SourceUnreadable,
            Self::Packaging { .. } | Self::Zip { .. } => HubErrorKind::PackagingFailed,
            Self::StateWrite { .. } | Self::StateParse { .. } => HubErrorKind::StateWriteFailed,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
