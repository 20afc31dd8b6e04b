//! Recognized-key configuration records and TOML loaders for the
//! DataHubSync hub and client (spec §6.2, §6.3).
//!
//! Configuration is never dynamically typed past this crate: both
//! binaries parse their TOML file once here, into [`HubConfig`] or
//! [`ClientConfig`], and everything downstream works with plain typed
//! fields instead of re-walking a `toml::Value`.

pub mod client;
pub mod error;
pub mod hub;

pub use client::ClientConfig;
pub use error::ConfigError;
pub use hub::HubConfig;
