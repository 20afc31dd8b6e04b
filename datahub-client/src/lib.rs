//! DataHubSync client: timestamp-driven fetch, verified extraction,
//! and atomic install of dataset archives published by the hub.

pub mod download;
pub mod error;
pub mod extract;
pub mod state;
pub mod swap;
pub mod sync;

pub use error::ClientError;
pub use state::ClientState;
pub use sync::{sync_all, sync_dataset, SyncOutcome};
