// ABOUTME: Page API handlers: read one or all pages, post inserts and updates, delete, and reset.
// ABOUTME: Mutations go through the engine so every page write is paired with a log entry.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use wikisync_core::{InvalidKey, Mutation, PageDraft, TransactionKind, WikiError};

use super::{ApiError, HttpStatus, run_blocking};
use crate::app_state::SharedState;

/// A page as posted by clients. `Key` selects update over insert; any `Date`
/// the client sends is ignored because the server stamps every mutation.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PagePayload {
    pub key: String,
    pub title: String,
    pub body: String,
}

impl PagePayload {
    /// Decode a request body. An empty or malformed body is a decode error.
    pub fn from_body(body: &[u8]) -> Result<Self, WikiError> {
        serde_json::from_slice(body).map_err(|e| WikiError::InvalidPayload(e.to_string()))
    }

    /// Turn the payload into a mutation. The body's key wins over the path's;
    /// with neither, the page is inserted.
    pub fn into_mutation(self, path_key: Option<&str>) -> Result<Mutation, WikiError> {
        let key = Some(self.key.trim())
            .filter(|k| !k.is_empty())
            .or(path_key.map(str::trim).filter(|k| !k.is_empty()));
        let kind = match key {
            Some(_) => TransactionKind::Update,
            None => TransactionKind::Insert,
        };
        Mutation::decode(kind, key, PageDraft::new(self.title, self.body))
    }
}

/// GET /get/ - Every live page as a JSON array.
pub async fn list_pages(State(state): State<SharedState>) -> Result<Response, ApiError> {
    let pages = run_blocking(state, |state| state.pages.all_pages()).await?;
    Ok(Json(pages).into_response())
}

/// GET /get/{key} - A single page.
pub async fn get_page(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let page = run_blocking(state, move |state| state.pages.get_page_str(&key)).await?;
    Ok(Json(page).into_response())
}

/// POST /post/ - Insert a page, or update one if the body carries a key.
pub async fn post_page(State(state): State<SharedState>, body: Bytes) -> Result<Response, ApiError> {
    save_page(state, None, body).await
}

/// POST /post/{key} - Update the page named in the path (unless the body names another).
pub async fn post_page_with_key(
    State(state): State<SharedState>,
    Path(key): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    save_page(state, Some(key), body).await
}

async fn save_page(
    state: SharedState,
    path_key: Option<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let mutation = PagePayload::from_body(&body)?.into_mutation(path_key.as_deref())?;
    let outcome = run_blocking(state, move |state| state.engine.apply(mutation)).await?;
    Ok(Json(HttpStatus::success(Some(outcome.snapshot()))).into_response())
}

/// GET /delete/{key} - Delete a page and record the deletion.
pub async fn delete_page(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let mutation = Mutation::decode(TransactionKind::Delete, Some(&key), PageDraft::default())?;
    let outcome = run_blocking(state, move |state| state.engine.apply(mutation)).await?;
    Ok(Json(HttpStatus::success(Some(outcome.snapshot()))).into_response())
}

/// GET /delete/ - No key given; reported the same way as an undecodable key.
pub async fn delete_without_key() -> ApiError {
    ApiError::from(WikiError::from(InvalidKey(String::new())))
}

/// GET /reset - Remove all pages and transactions. For tests and seeding only.
pub async fn reset(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    run_blocking(state, |state| state.engine.reset()).await?;
    Ok(Json(HttpStatus::success(None)))
}
