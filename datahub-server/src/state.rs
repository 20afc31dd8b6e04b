use std::sync::Arc;

use datahub_core::StateStore;

/// Shared application state handed to every Axum handler (spec §4.5).
/// The server is read-only: it only ever takes a snapshot of the
/// state store, never mutates it — all mutation is confined to the
/// Scheduler running in the same process.
#[derive(Clone, Debug)]
pub struct AppState {
    pub store: Arc<StateStore>,
}
