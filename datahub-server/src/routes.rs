use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{download_package, health, list_datasets};
use crate::state::AppState;

/// Assembles the three endpoints of spec §4.5 into one router. There
/// is deliberately no versioned `/api/v1` nesting here — the wire
/// protocol (spec §6.1) is a single flat surface with no history to
/// version against yet.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/api/datasets", get(list_datasets))
        .route("/package/:name_ext", get(download_package))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
