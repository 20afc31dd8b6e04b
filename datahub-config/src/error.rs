use std::path::PathBuf;

use thiserror::Error;

/// `ConfigInvalid` from spec §7 — fatal at startup on both hub and
/// client.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("missing required config key {0:?}")]
    MissingKey(&'static str),

    #[error("invalid value for config key {key:?}: {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("invalid dataset name in config: {0}")]
    InvalidDatasetName(#[from] datahub_contracts::DatasetNameError),
}
