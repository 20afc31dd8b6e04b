//! Error-kind vocabulary shared across crates (spec §7).
//!
//! These are classification tags, not the concrete error types — each
//! crate defines its own `thiserror` enum for its fallible operations and
//! maps individual variants onto one of these kinds where the
//! classification affects cross-crate behavior (retry policy, exit
//! codes, log level).

use std::fmt;

/// Hub-side error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubErrorKind {
    ConfigInvalid,
    SourceUnreadable,
    PackagingFailed,
    StateWriteFailed,
}

impl fmt::Display for HubErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ConfigInvalid => "config_invalid",
            Self::SourceUnreadable => "source_unreadable",
            Self::PackagingFailed => "packaging_failed",
            Self::StateWriteFailed => "state_write_failed",
        };
        f.write_str(s)
    }
}

/// Client-side error classification, also used to pick the process exit
/// code (spec §6.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientErrorKind {
    ConfigInvalid,
    DatasetUnknown,
    NetworkTransient,
    NetworkTerminal,
    SizeMismatch,
    ArchiveInvalid,
    ZipSlipDetected,
    SwapFailed,
}

impl ClientErrorKind {
    /// Whether a failed operation classified with this kind should be
    /// retried with backoff (spec §4.6, §7).
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::NetworkTransient)
    }
}

impl fmt::Display for ClientErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ConfigInvalid => "config_invalid",
            Self::DatasetUnknown => "dataset_unknown",
            Self::NetworkTransient => "network_transient",
            Self::NetworkTerminal => "network_terminal",
            Self::SizeMismatch => "size_mismatch",
            Self::ArchiveInvalid => "archive_invalid",
            Self::ZipSlipDetected => "zip_slip_detected",
            Self::SwapFailed => "swap_failed",
        };
        f.write_str(s)
    }
}
