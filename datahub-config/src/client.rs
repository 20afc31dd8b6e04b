use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use datahub_contracts::DatasetName;
use serde::Deserialize;
use toml::Value;

use crate::error::ConfigError;

/// Typed, validated client configuration — the recognized-key set of
/// spec §6.3.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub hub: HubConnection,
    pub datasets: Vec<ClientDatasetConfig>,
    pub retries: RetryConfig,
    pub state_file: PathBuf,
    /// `None` means each dataset uses its own `{local_dir}/.scratch`
    /// default rather than a shared scratch root.
    pub scratch_dir: Option<PathBuf>,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct HubConnection {
    pub url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ClientDatasetConfig {
    pub name: DatasetName,
    pub local_dir: PathBuf,
}

impl ClientDatasetConfig {
    /// Staging/partial-download area for this dataset, honoring an
    /// overriding `scratch_dir` from config when set (spec §6.3).
    pub fn scratch_dir(&self, override_root: Option<&Path>) -> PathBuf {
        match override_root {
            Some(root) => root.join(self.name.as_str()),
            None => self.local_dir.join(".scratch"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max: u32,
    pub initial_backoff_seconds: u64,
    /// Not itself a recognized key — spec §4.6 fixes the exponential
    /// backoff ceiling at 60s; kept as a field so the scheduler never
    /// hardcodes it twice.
    pub max_backoff_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max: 3,
            initial_backoff_seconds: 1,
            max_backoff_seconds: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawRoot {
    hub: RawHub,
    datasets: Vec<RawDataset>,
    retries: RawRetries,
    state_file: Option<String>,
    scratch_dir: Option<String>,
    logging: RawLogging,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawHub {
    url: Option<String>,
    timeout: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawDataset {
    name: String,
    local_dir: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawRetries {
    max: Option<u32>,
    initial_backoff_seconds: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawLogging {
    level: Option<String>,
    file: Option<String>,
}

impl ClientConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents, path)
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        warn_unknown_keys(contents, path);

        let raw: RawRoot = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let url = raw.hub.url.ok_or(ConfigError::MissingKey("hub.url"))?;
        let parsed = url::Url::parse(&url).map_err(|source| ConfigError::InvalidValue {
            key: "hub.url",
            reason: format!("{url:?} is not a valid URL: {source}"),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                key: "hub.url",
                reason: format!("{url:?} must use http:// or https://"),
            });
        }
        let timeout = Duration::from_secs(raw.hub.timeout.unwrap_or(300));

        if raw.datasets.is_empty() {
            return Err(ConfigError::MissingKey("datasets"));
        }
        let mut datasets = Vec::with_capacity(raw.datasets.len());
        for raw_ds in raw.datasets {
            datasets.push(ClientDatasetConfig {
                name: DatasetName::new(raw_ds.name)?,
                local_dir: PathBuf::from(raw_ds.local_dir),
            });
        }

        let retries = RetryConfig {
            max: raw.retries.max.unwrap_or(3),
            initial_backoff_seconds: raw.retries.initial_backoff_seconds.unwrap_or(1),
            max_backoff_seconds: 60,
        };
        if retries.max == 0 {
            return Err(ConfigError::InvalidValue {
                key: "retries.max",
                reason: "must be at least 1".to_string(),
            });
        }

        let state_file = raw
            .state_file
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".last_sync.json"));
        let scratch_dir = raw.scratch_dir.map(PathBuf::from);

        let logging = LoggingConfig {
            level: raw.logging.level.unwrap_or_else(|| "info".to_string()),
            file: raw.logging.file.map(PathBuf::from),
        };

        Ok(Self {
            hub: HubConnection { url, timeout },
            datasets,
            retries,
            state_file,
            scratch_dir,
            logging,
        })
    }
}

const RECOGNIZED_TOP_LEVEL: &[&str] =
    &["hub", "datasets", "retries", "state_file", "scratch_dir", "logging"];

fn warn_unknown_keys(contents: &str, path: &Path) {
    let Ok(Value::Table(table)) = contents.parse::<Value>() else {
        return;
    };
    for key in table.keys() {
        if !RECOGNIZED_TOP_LEVEL.contains(&key.as_str()) {
            tracing::warn!(
                "{}: unrecognized top-level config key {:?} ignored",
                path.display(),
                key
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_minimal_config_with_defaults() {
        let toml = r#"
        [hub]
        url = "https://hub.example.com"

        [[datasets]]
        name = "trades"
        local_dir = "/var/lib/datahub/trades"
        "#;
        let cfg = ClientConfig::parse(toml, Path::new("test.toml")).unwrap();
        assert_eq!(cfg.hub.url, "https://hub.example.com");
        assert_eq!(cfg.hub.timeout, Duration::from_secs(300));
        assert_eq!(cfg.retries.max, 3);
        assert_eq!(cfg.datasets.len(), 1);
        assert_eq!(
            cfg.datasets[0].scratch_dir(cfg.scratch_dir.as_deref()),
            PathBuf::from("/var/lib/datahub/trades/.scratch")
        );
    }

    #[test]
    fn rejects_non_http_url() {
        let toml = r#"
        [hub]
        url = "ftp://hub.example.com"

        [[datasets]]
        name = "trades"
        local_dir = "/var/lib/datahub/trades"
        "#;
        assert!(ClientConfig::parse(toml, Path::new("test.toml")).is_err());
    }

    #[test]
    fn rejects_unparseable_url() {
        let toml = r#"
        [hub]
        url = "not a url"

        [[datasets]]
        name = "trades"
        local_dir = "/var/lib/datahub/trades"
        "#;
        assert!(ClientConfig::parse(toml, Path::new("test.toml")).is_err());
    }

    #[test]
    fn rejects_zero_max_retries() {
        let toml = r#"
        [hub]
        url = "https://hub.example.com"

        [[datasets]]
        name = "trades"
        local_dir = "/var/lib/datahub/trades"

        [retries]
        max = 0
        "#;
        assert!(ClientConfig::parse(toml, Path::new("test.toml")).is_err());
    }

    #[test]
    fn shared_scratch_root_overrides_per_dataset_default() {
        let toml = r#"
        [hub]
        url = "https://hub.example.com"

        [[datasets]]
        name = "trades"
        local_dir = "/var/lib/datahub/trades"

        scratch_dir = "/tmp/datahub-scratch"
        "#;
        let cfg = ClientConfig::parse(toml, Path::new("test.toml")).unwrap();
        assert_eq!(
            cfg.datasets[0].scratch_dir(cfg.scratch_dir.as_deref()),
            PathBuf::from("/tmp/datahub-scratch/trades")
        );
    }
}
