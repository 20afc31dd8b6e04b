//! End-to-end exercise of the three endpoints in spec §4.5, built the
//! way the teacher's Axum services are tested: assemble the real
//! `Router` and drive it with `tower::ServiceExt::oneshot` rather than
//! binding a socket.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use datahub_contracts::DatasetName;
use datahub_core::{DatasetStateUpdate, StateStore};
use datahub_server::routes::create_app;
use datahub_server::state::AppState;
use http_body_util::BodyExt;
use tower::ServiceExt;

async fn seeded_app() -> (tempfile::TempDir, axum::Router) {
    let dir = tempfile::tempdir().unwrap();
    let archive_path = dir.path().join("trades_20260101_000000.zip");
    std::fs::write(&archive_path, b"0123456789").unwrap();

    let state_path = dir.path().join("state.json");
    let store = StateStore::load(state_path).await.unwrap();
    let name = DatasetName::new("trades").unwrap();
    store
        .update(
            &name,
            DatasetStateUpdate {
                last_updated: Utc::now().fixed_offset(),
                file_count: 3,
                total_size: 1024,
                package_size: 10,
                package_path: archive_path,
                last_trigger_at: Utc::now().fixed_offset(),
            },
        )
        .await
        .unwrap();

    let app = create_app(AppState {
        store: Arc::new(store),
    });
    (dir, app)
}

#[tokio::test]
async fn health_reports_ok() {
    let (_dir, app) = seeded_app().await;
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body.as_ref(), br#"{"status":"ok"}"#);
}

#[tokio::test]
async fn listing_includes_seeded_dataset() {
    let (_dir, app) = seeded_app().await;
    let response = app
        .oneshot(Request::get("/api/datasets").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let datasets = json["datasets"].as_array().unwrap();
    assert_eq!(datasets.len(), 1);
    assert_eq!(datasets[0]["name"], "trades");
    assert_eq!(datasets[0]["package_ready"], true);
    assert_eq!(datasets[0]["package_size"], 10);
}

#[tokio::test]
async fn download_without_range_streams_whole_file() {
    let (_dir, app) = seeded_app().await;
    let response = app
        .oneshot(
            Request::get("/package/trades.zip")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-length").unwrap(),
        "10"
    );
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body.as_ref(), b"0123456789");
}

#[tokio::test]
async fn download_single_byte_range_returns_206() {
    let (_dir, app) = seeded_app().await;
    let response = app
        .oneshot(
            Request::get("/package/trades.zip")
                .header("range", "bytes=0-0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        response.headers().get("content-range").unwrap(),
        "bytes 0-0/10"
    );
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body.as_ref(), b"0");
}

#[tokio::test]
async fn download_whole_file_via_explicit_range() {
    let (_dir, app) = seeded_app().await;
    let response = app
        .oneshot(
            Request::get("/package/trades.zip")
                .header("range", "bytes=0-9")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body.as_ref(), b"0123456789");
}

#[tokio::test]
async fn download_range_past_end_is_416() {
    let (_dir, app) = seeded_app().await;
    let response = app
        .oneshot(
            Request::get("/package/trades.zip")
                .header("range", "bytes=10-20")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
}

#[tokio::test]
async fn download_multi_range_is_416() {
    let (_dir, app) = seeded_app().await;
    let response = app
        .oneshot(
            Request::get("/package/trades.zip")
                .header("range", "bytes=0-1,4-5")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
}

#[tokio::test]
async fn download_unknown_dataset_is_404() {
    let (_dir, app) = seeded_app().await;
    let response = app
        .oneshot(
            Request::get("/package/unknown.zip")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn download_unsafe_name_is_400() {
    let (_dir, app) = seeded_app().await;
    let response = app
        .oneshot(
            Request::get("/package/weird%20name.zip")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
