// ABOUTME: Transaction log API handler for incremental sync.
// ABOUTME: Clients pass the last transaction key or date they saw and receive everything after it.

use axum::Json;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use wikisync_core::Checkpoint;

use super::{ApiError, run_blocking};
use crate::app_state::SharedState;

/// Query parameters for the recent-transactions endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct RecentParams {
    #[serde(rename = "transactionKey")]
    pub transaction_key: Option<String>,
    #[serde(rename = "sinceDate")]
    pub since_date: Option<String>,
}

/// GET /get/recent?transactionKey=&sinceDate= - Transactions after a checkpoint,
/// oldest first. With neither parameter the whole log is returned.
pub async fn recent_transactions(
    State(state): State<SharedState>,
    Query(params): Query<RecentParams>,
) -> Result<Response, ApiError> {
    let checkpoint = Checkpoint::from_params(
        params.transaction_key.as_deref(),
        params.since_date.as_deref(),
    )?;
    let transactions =
        run_blocking(state, move |state| state.sync.recent_transactions(checkpoint)).await?;
    Ok(Json(transactions).into_response())
}
