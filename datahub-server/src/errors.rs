use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// The only response-level error cases the core HTTP surface
/// generates (spec §4.5, §6.1): 400 for an invalid dataset name, 404
/// for an unknown or not-yet-ready dataset, and 416 for an
/// unsatisfiable or multi-range request. No other status codes are
/// produced by these handlers.
#[derive(Debug)]
pub enum ApiError {
    InvalidDatasetName,
    DatasetNotReady,
    RangeNotSatisfiable,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::InvalidDatasetName => (StatusCode::BAD_REQUEST, "invalid dataset name"),
            Self::DatasetNotReady => (StatusCode::NOT_FOUND, "dataset unknown or not ready"),
            Self::RangeNotSatisfiable => (StatusCode::RANGE_NOT_SATISFIABLE, "range not satisfiable"),
        };
        (status, message).into_response()
    }
}
