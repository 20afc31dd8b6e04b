//! Route handlers for the three endpoints in spec §4.5: the JSON
//! dataset listing, the Range-capable archive download, and health.
//!
//! The download handler's Range handling mirrors the streaming
//! contract a media server needs for seekable playback — parse
//! `Range: bytes=start-end`, honor suffix (`-N`) and prefix (`N-`)
//! forms, reject multi-range requests, and stream via
//! `tokio_util::io::ReaderStream` rather than buffering the file.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use datahub_contracts::{DatasetEntry, DatasetListing, DatasetName};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::errors::ApiError;
use crate::state::AppState;

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn list_datasets(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.store.snapshot().await;
    let mut datasets: Vec<DatasetEntry> = snapshot
        .iter()
        .filter_map(|(name, entry)| {
            let name = DatasetName::new(name.to_string()).ok()?;
            Some(DatasetEntry {
                name,
                last_updated: entry.last_updated,
                file_count: entry.file_count,
                total_size: entry.total_size,
                package_ready: entry.package_ready,
                package_size: entry.package_size,
            })
        })
        .collect();
    datasets.sort_by(|a, b| a.name.as_str().cmp(b.name.as_str()));

    Json(DatasetListing {
        generated_at: Utc::now().fixed_offset(),
        datasets,
    })
}

pub async fn download_package(
    State(state): State<AppState>,
    Path(name_with_ext): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let name_str = name_with_ext
        .strip_suffix(".zip")
        .ok_or(ApiError::InvalidDatasetName)?;
    let name = DatasetName::new(name_str).map_err(|_| ApiError::InvalidDatasetName)?;

    let entry = state
        .store
        .get(&name)
        .await
        .filter(|e| e.package_ready)
        .ok_or(ApiError::DatasetNotReady)?;

    let metadata = tokio::fs::metadata(&entry.package_path)
        .await
        .map_err(|_| ApiError::DatasetNotReady)?;
    let total = metadata.len();

    let byte_range = match headers.get(header::RANGE).and_then(|v| v.to_str().ok()) {
        Some(raw) => Some(parse_range_header(raw, total).ok_or(ApiError::RangeNotSatisfiable)?),
        None => None,
    };

    let file = File::open(&entry.package_path)
        .await
        .map_err(|_| ApiError::DatasetNotReady)?;

    match byte_range {
        None => {
            let body = Body::from_stream(ReaderStream::new(file));
            Ok((
                StatusCode::OK,
                [
                    (header::CONTENT_LENGTH, total.to_string()),
                    (header::ACCEPT_RANGES, "bytes".to_string()),
                ],
                body,
            )
                .into_response())
        }
        Some(range) => {
            let mut file = file;
            file.seek(std::io::SeekFrom::Start(range.start))
                .await
                .map_err(|_| ApiError::RangeNotSatisfiable)?;
            let content_length = range.end - range.start + 1;
            let body = Body::from_stream(ReaderStream::new(file.take(content_length)));
            Ok((
                StatusCode::PARTIAL_CONTENT,
                [
                    (header::CONTENT_LENGTH, content_length.to_string()),
                    (
                        header::CONTENT_RANGE,
                        format!("bytes {}-{}/{}", range.start, range.end, total),
                    ),
                    (header::ACCEPT_RANGES, "bytes".to_string()),
                ],
                body,
            )
                .into_response())
        }
    }
}

struct ByteRange {
    start: u64,
    end: u64,
}

/// Parses a single `Range: bytes=start-end` header value. Returns
/// `None` on anything unsatisfiable (spec §4.5): multi-range,
/// `start > end`, `start >= total`, or an empty/zero-length file.
fn parse_range_header(raw: &str, total: u64) -> Option<ByteRange> {
    let raw = raw.strip_prefix("bytes=")?;
    if raw.contains(',') || total == 0 {
        return None;
    }
    let (start_s, end_s) = raw.split_once('-')?;

    let (start, end) = if start_s.is_empty() {
        let suffix_len: u64 = end_s.parse().ok()?;
        if suffix_len == 0 {
            return None;
        }
        (total.saturating_sub(suffix_len), total - 1)
    } else {
        let start: u64 = start_s.parse().ok()?;
        let end: u64 = if end_s.is_empty() {
            total - 1
        } else {
            end_s.parse().ok()?
        };
        (start, end)
    };

    if start > end || start >= total {
        return None;
    }
    Some(ByteRange {
        start,
        end: end.min(total - 1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_range() {
        let r = parse_range_header("bytes=0-99", 1000).unwrap();
        assert_eq!((r.start, r.end), (0, 99));
    }

    #[test]
    fn missing_end_extends_to_eof() {
        let r = parse_range_header("bytes=900-", 1000).unwrap();
        assert_eq!((r.start, r.end), (900, 999));
    }

    #[test]
    fn suffix_range_returns_last_n_bytes() {
        let r = parse_range_header("bytes=-100", 1000).unwrap();
        assert_eq!((r.start, r.end), (900, 999));
    }

    #[test]
    fn start_past_total_is_rejected() {
        assert!(parse_range_header("bytes=1000-1010", 1000).is_none());
    }

    #[test]
    fn start_after_end_is_rejected() {
        assert!(parse_range_header("bytes=500-100", 1000).is_none());
    }

    #[test]
    fn multi_range_is_rejected() {
        assert!(parse_range_header("bytes=0-10,20-30", 1000).is_none());
    }
}
