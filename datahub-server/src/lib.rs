//! Library surface for the DataHubSync hub's HTTP server, split out
//! from `main.rs` so integration tests can assemble the real `Router`
//! via [`routes::create_app`] without binding a socket (spec §4.5).

pub mod errors;
pub mod handlers;
pub mod routes;
pub mod state;
