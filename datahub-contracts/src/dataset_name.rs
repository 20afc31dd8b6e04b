use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A validated, URL-safe dataset identifier.
///
/// Dataset names are the only identifier datasets have (spec §3) and are
/// embedded directly into the archive download path
/// (`/package/{name}.zip`), so validation happens once, here, rather than
/// being re-derived by every caller that touches a raw `String`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatasetName(String);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DatasetNameError {
    #[error("dataset name must not be empty")]
    Empty,
    #[error("dataset name {0:?} contains a path separator or traversal segment")]
    PathUnsafe(String),
    #[error("dataset name {0:?} contains a character outside [a-zA-Z0-9_-]")]
    NotUrlSafe(String),
}

impl DatasetName {
    pub fn new(raw: impl Into<String>) -> Result<Self, DatasetNameError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(DatasetNameError::Empty);
        }
        if raw.contains('/') || raw.contains('\\') || raw.split('/').any(|seg| seg == "..") {
            return Err(DatasetNameError::PathUnsafe(raw));
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(DatasetNameError::NotUrlSafe(raw));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The archive filename this dataset is served under, per spec §6.1.
    pub fn archive_filename(&self) -> String {
        format!("{}.zip", self.0)
    }
}

impl TryFrom<String> for DatasetName {
    type Error = DatasetNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DatasetName> for String {
    fn from(value: DatasetName) -> Self {
        value.0
    }
}

impl fmt::Display for DatasetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DatasetName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_url_safe_names() {
        assert!(DatasetName::new("daily_trades-v2").is_ok());
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(DatasetName::new(""), Err(DatasetNameError::Empty));
    }

    #[test]
    fn rejects_path_traversal() {
        assert!(matches!(
            DatasetName::new("../etc"),
            Err(DatasetNameError::PathUnsafe(_))
        ));
        assert!(matches!(
            DatasetName::new("a/b"),
            Err(DatasetNameError::PathUnsafe(_))
        ));
    }

    #[test]
    fn rejects_non_url_safe_characters() {
        assert!(matches!(
            DatasetName::new("weird name!"),
            Err(DatasetNameError::NotUrlSafe(_))
        ));
    }

    #[test]
    fn archive_filename_appends_zip() {
        let name = DatasetName::new("trades").unwrap();
        assert_eq!(name.archive_filename(), "trades.zip");
    }
}
