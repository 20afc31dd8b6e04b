use std::path::PathBuf;

use datahub_contracts::ClientErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("dataset {0:?} is not known to the hub")]
    DatasetUnknown(String),

    #[error("request to hub failed: {0}")]
    Network(#[source] reqwest::Error),

    /// A 5xx, 408, or 429 response — retried with backoff (spec §4.6).
    #[error("hub returned transient status {status} for {url}")]
    NetworkTransientStatus { status: u16, url: String },

    /// Any other 4xx — terminal for this dataset.
    #[error("hub returned a terminal HTTP status {status} for {url}")]
    NetworkTerminal {
        status: u16,
        url: String,
    },

    #[error("downloaded size {actual} does not match advertised size {expected}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("archive at {path:?} could not be read: {source}")]
    ArchiveInvalid {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("archive entry {entry:?} would extract outside the staging directory")]
    ZipSlipDetected { entry: String },

    #[error("atomic swap into {target:?} failed: {source}")]
    SwapFailed {
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("local filesystem operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("local state document corrupt: {0}")]
    StateCorrupt(#[from] serde_json::Error),
}

impl ClientError {
    pub fn kind(&self) -> ClientErrorKind {
        match self {
            Self::DatasetUnknown(_) => ClientErrorKind::DatasetUnknown,
            Self::Network(_) => ClientErrorKind::NetworkTransient,
            Self::NetworkTransientStatus { .. } => ClientErrorKind::NetworkTransient,
            Self::NetworkTerminal { .. } => ClientErrorKind::NetworkTerminal,
            Self::SizeMismatch { .. } => ClientErrorKind::SizeMismatch,
            Self::ArchiveInvalid { .. } => ClientErrorKind::ArchiveInvalid,
            Self::ZipSlipDetected { .. } => ClientErrorKind::ZipSlipDetected,
            Self::SwapFailed { .. } => ClientErrorKind::SwapFailed,
            Self::Io(_) => ClientErrorKind::SwapFailed,
            Self::StateCorrupt(_) => ClientErrorKind::ConfigInvalid,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}
