// ABOUTME: Route definitions for the wikisync HTTP API.
// ABOUTME: Assembles all endpoints into a single Axum Router with shared state and request tracing.

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::SharedState;

/// Build the complete Axum router with all routes and shared state.
///
/// `/get/recent` is a static segment and takes priority over `/get/{key}`.
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/get/", get(api::pages::list_pages))
        .route("/get/recent", get(api::transactions::recent_transactions))
        .route("/get/{key}", get(api::pages::get_page))
        .route("/post/", post(api::pages::post_page))
        .route("/post/{key}", post(api::pages::post_page_with_key))
        .route("/delete/", get(api::pages::delete_without_key))
        .route("/delete/{key}", get(api::pages::delete_page))
        .route("/reset", get(api::pages::reset))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler. Returns 200 OK with a simple JSON body.
async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}
