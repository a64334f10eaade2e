// ABOUTME: Read-only access to the current state of pages.
// ABOUTME: Looks up single pages by key and lists every live page in key order.

use std::sync::Arc;

use crate::error::WikiError;
use crate::model::{Page, PageKey};
use crate::store::RecordStore;

/// Reads pages as of the latest committed mutation.
pub struct PageReader<S> {
    store: Arc<S>,
}

impl<S> Clone for PageReader<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: RecordStore> PageReader<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn get_page(&self, key: &PageKey) -> Result<Page, WikiError> {
        self.store
            .get_page(key)?
            .ok_or(WikiError::PageNotFound(*key))
    }

    /// Decode a raw key and fetch its page.
    pub fn get_page_str(&self, raw: &str) -> Result<Page, WikiError> {
        let key: PageKey = raw.trim().parse()?;
        self.get_page(&key)
    }

    /// Every live page, ordered by key.
    pub fn all_pages(&self) -> Result<Vec<Page>, WikiError> {
        Ok(self.store.list_pages()?)
    }
}
