// ABOUTME: HTTP server for wikisync: page reads, mutations, and incremental transaction log pulls.
// ABOUTME: Uses Axum with a router built explicitly at startup over shared engine state.

pub mod api;
pub mod app_state;
pub mod config;
pub mod routes;

pub use app_state::{AppState, SharedState};
pub use config::{ConfigError, WikisyncConfig};
pub use routes::create_router;
