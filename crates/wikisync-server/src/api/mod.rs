// ABOUTME: API module containing the HTTP handlers and the JSON status envelope.
// ABOUTME: Every failure renders as an error envelope with a server-error status.

pub mod pages;
pub mod transactions;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use wikisync_core::{ErrorKind, PageSnapshot, WikiError};

use crate::app_state::{AppState, SharedState};

/// The status envelope returned by mutation endpoints and by every failure.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HttpStatus {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<PageSnapshot>,
}

impl HttpStatus {
    pub fn success(page: Option<PageSnapshot>) -> Self {
        Self {
            status: "success",
            error_message: None,
            page,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            status: "error",
            error_message: Some(message),
            page: None,
        }
    }
}

/// A handler failure. Rendered as an error envelope with status 500, which is
/// what existing clients of the wiki expect for every kind of failure.
#[derive(Debug)]
pub enum ApiError {
    Wiki(WikiError),
    Task(String),
}

impl From<WikiError> for ApiError {
    fn from(err: WikiError) -> Self {
        ApiError::Wiki(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match self {
            ApiError::Wiki(err) => {
                match err.kind() {
                    ErrorKind::Storage => tracing::error!("request failed: {}", err),
                    ErrorKind::NotFound | ErrorKind::Decode => {
                        tracing::debug!("request rejected: {}", err)
                    }
                }
                err.to_string()
            }
            ApiError::Task(reason) => {
                tracing::error!("request task failed: {}", reason);
                format!("internal error: {reason}")
            }
        };

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(HttpStatus::error(message)),
        )
            .into_response()
    }
}

/// Run a store-bound operation on the blocking pool so SQLite I/O does not
/// stall the async workers.
pub(crate) async fn run_blocking<T, F>(state: SharedState, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppState) -> Result<T, WikiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || op(&state))
        .await
        .map_err(|e| ApiError::Task(e.to_string()))?
        .map_err(ApiError::from)
}
