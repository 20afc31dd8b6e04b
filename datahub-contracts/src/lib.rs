//! Wire types and dataset identifiers shared by the DataHubSync hub and
//! client.
//!
//! Both sides of the system talk about the same handful of concepts —
//! a dataset's name, its declared freshness timestamp, and the shape of
//! the `/api/datasets` listing — so those types live here instead of
//! being duplicated or inferred from JSON on either side.

pub mod dataset_name;
pub mod error;
pub mod wire;

pub use dataset_name::{DatasetName, DatasetNameError};
pub use error::{ClientErrorKind, HubErrorKind};
pub use wire::{DatasetEntry, DatasetListing};
