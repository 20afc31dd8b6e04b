use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use datahub_contracts::DatasetName;
use serde::Deserialize;
use toml::Value;

use crate::error::ConfigError;

/// Typed, validated hub configuration — the recognized-key set of
/// spec §6.2. Anything in the source file outside this set is logged
/// as a warning by [`HubConfig::load`] rather than silently ignored or
/// treated as fatal.
#[derive(Debug, Clone)]
pub struct HubConfig {
    pub server: ServerConfig,
    pub datasets: Vec<DatasetConfig>,
    pub freshness: FreshnessDefaults,
    pub scheduler: SchedulerConfig,
    pub packaging: PackagingConfig,
    pub state_file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Prefix under which relative `datasets[*].path` entries are
    /// resolved. `server.data_root` and the legacy `hub.data_dir` key
    /// are accepted as synonyms; `server.data_root` wins when both are
    /// present (spec §9).
    pub data_root: PathBuf,
    pub cache_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DatasetConfig {
    pub name: DatasetName,
    pub source_path: PathBuf,
    pub newer_ratio_threshold: f64,
    pub debounce_seconds: u64,
    pub mtime_granularity: MtimeGranularity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MtimeGranularity {
    Minute,
}

#[derive(Debug, Clone)]
pub struct FreshnessDefaults {
    pub debounce_seconds: u64,
    pub mtime_granularity: MtimeGranularity,
}

impl Default for FreshnessDefaults {
    fn default() -> Self {
        Self {
            debounce_seconds: 60,
            mtime_granularity: MtimeGranularity::Minute,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval_minutes: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { interval_minutes: 10 }
    }
}

#[derive(Debug, Clone)]
pub struct PackagingConfig {
    pub format: String,
    pub keep_versions: usize,
}

impl Default for PackagingConfig {
    fn default() -> Self {
        Self {
            format: "zip".to_string(),
            keep_versions: 2,
        }
    }
}

// --- raw TOML shape, deserialized once and then lifted into the typed
// records above so defaulting and cross-key precedence (data_root vs
// data_dir) happen in one place. ---

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawRoot {
    server: RawServer,
    hub: RawHubLegacy,
    datasets: Vec<RawDataset>,
    freshness: RawFreshness,
    scheduler: RawScheduler,
    packaging: RawPackaging,
    state_file: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawServer {
    host: Option<String>,
    port: Option<u16>,
    data_root: Option<String>,
    cache_dir: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawHubLegacy {
    data_dir: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDataset {
    name: String,
    path: String,
    newer_ratio_threshold: Option<f64>,
    debounce_seconds: Option<u64>,
    mtime_granularity: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawFreshness {
    debounce_seconds: Option<u64>,
    mtime_granularity: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawScheduler {
    interval_minutes: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawPackaging {
    format: Option<String>,
    keep_versions: Option<usize>,
}

impl HubConfig {
    /// Load from a TOML file at `path`, applying defaults for absent
    /// optional keys and failing on a missing required key
    /// (`server.host`, `server.port`, at least one dataset).
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

        let host = raw
            .server
            .host
            .ok_or(ConfigError::MissingKey("server.host"))?;
        let port = raw
            .server
            .port
            .ok_or(ConfigError::MissingKey("server.port"))?;

        let data_root = match (raw.server.data_root, raw.hub.data_dir) {
            (Some(root), Some(_legacy)) => {
                tracing::warn!(
                    "both server.data_root and hub.data_dir are set; server.data_root takes precedence"
                );
                PathBuf::from(root)
            }
            (Some(root), None) => PathBuf::from(root),
            (None, Some(legacy)) => PathBuf::from(legacy),
            (None, None) => return Err(ConfigError::MissingKey("server.data_root")),
        };

        let cache_dir = raw
            .server
            .cache_dir
            .map(PathBuf::from)
            .ok_or(ConfigError::MissingKey("server.cache_dir"))?;

        if raw.datasets.is_empty() {
            return Err(ConfigError::MissingKey("datasets"));
        }

        let freshness = FreshnessDefaults {
            debounce_seconds: raw.freshness.debounce_seconds.unwrap_or(60),
            mtime_granularity: parse_granularity(raw.freshness.mtime_granularity.as_deref())?,
        };

        let mut datasets = Vec::with_capacity(raw.datasets.len());
        for raw_ds in raw.datasets {
            let name = DatasetName::new(raw_ds.name)?;
            let source_path = data_root.join(&raw_ds.path);
            let newer_ratio_threshold = raw_ds.newer_ratio_threshold.unwrap_or(0.30);
            if !(0.0..=1.0).contains(&newer_ratio_threshold) {
                return Err(ConfigError::InvalidValue {
                    key: "datasets[*].newer_ratio_threshold",
                    reason: format!("{newer_ratio_threshold} is outside [0.0, 1.0]"),
                });
            }
            let debounce_seconds = raw_ds.debounce_seconds.unwrap_or(freshness.debounce_seconds);
            let mtime_granularity = match raw_ds.mtime_granularity {
                Some(g) => parse_granularity(Some(&g))?,
                None => freshness.mtime_granularity,
            };
            datasets.push(DatasetConfig {
                name,
                source_path,
                newer_ratio_threshold,
                debounce_seconds,
                mtime_granularity,
            });
        }

        let mut seen = BTreeSet::new();
        for ds in &datasets {
            if !seen.insert(ds.name.clone()) {
                return Err(ConfigError::InvalidValue {
                    key: "datasets[*].name",
                    reason: format!("duplicate dataset name {:?}", ds.name.as_str()),
                });
            }
        }

        let packaging = PackagingConfig {
            format: raw.packaging.format.unwrap_or_else(|| "zip".to_string()),
            keep_versions: raw.packaging.keep_versions.unwrap_or(2),
        };
        if packaging.format != "zip" {
            return Err(ConfigError::InvalidValue {
                key: "packaging.format",
                reason: format!("only \"zip\" is supported, got {:?}", packaging.format),
            });
        }

        let state_file = raw
            .state_file
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("datahub-state.json"));

        Ok(Self {
            server: ServerConfig {
                host,
                port,
                data_root,
                cache_dir,
            },
            datasets,
            freshness,
            scheduler: SchedulerConfig {
                interval_minutes: raw.scheduler.interval_minutes.unwrap_or(10),
            },
            packaging,
            state_file,
        })
    }

    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.server.cache_dir)
    }
}

fn parse_granularity(raw: Option<&str>) -> Result<MtimeGranularity, ConfigError> {
    match raw {
        None | Some("minute") => Ok(MtimeGranularity::Minute),
        Some(other) => Err(ConfigError::InvalidValue {
            key: "freshness.mtime_granularity",
            reason: format!("unsupported granularity {other:?}, only \"minute\" is implemented"),
        }),
    }
}

const RECOGNIZED_TOP_LEVEL: &[&str] =
    &["server", "hub", "datasets", "freshness", "scheduler", "packaging", "state_file"];

/// Best-effort warning pass: anything at the top level of the document
/// that isn't one of the recognized sections gets logged, per the
/// "unknown keys warn" remediation in spec §9.
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
