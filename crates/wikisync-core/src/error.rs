// ABOUTME: Error taxonomy for page mutations, page reads, and log sync.
// ABOUTME: Every error falls into one of three kinds: not found, decode, or storage.

use thiserror::Error;

use crate::model::{InvalidKey, PageKey, TransactionKey};
use crate::store::StoreError;

/// Coarse classification of a WikiError, used to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Decode,
    Storage,
}

/// Errors returned by the mutation engine and the readers.
#[derive(Debug, Error)]
pub enum WikiError {
    #[error("page not found: {0}")]
    PageNotFound(PageKey),

    #[error("transaction not found: {0}")]
    TransactionNotFound(TransactionKey),

    #[error(transparent)]
    InvalidKey(#[from] InvalidKey),

    #[error("malformed request: {0}")]
    InvalidPayload(String),

    #[error("malformed sinceDate {0:?}: expected DD-MM-YYYY-HH:MM:SS+hhmm")]
    InvalidSinceDate(String),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl WikiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WikiError::PageNotFound(_) | WikiError::TransactionNotFound(_) => ErrorKind::NotFound,
            WikiError::InvalidKey(_)
            | WikiError::InvalidPayload(_)
            | WikiError::InvalidSinceDate(_) => ErrorKind::Decode,
            WikiError::Storage(_) => ErrorKind::Storage,
        }
    }
}
