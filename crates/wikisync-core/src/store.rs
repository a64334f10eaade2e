// ABOUTME: The record store seam: reads, ordered log queries, and the atomic write unit.
// ABOUTME: Backends implement RecordStore; the engine and readers are written against it.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{Page, PageDraft, PageKey, PageSnapshot, Transaction, TransactionKey, TransactionKind};

/// Errors raised by a record store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("write rejected: {0}")]
    Rejected(String),

    #[error("commit failed: {0}")]
    Commit(String),

    #[error("rollback failed after {cause}: {rollback}")]
    Rollback { cause: String, rollback: String },

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// True when the store may hold a partially applied unit. Callers must treat
    /// this as a consistency fault rather than an ordinary failed write.
    pub fn is_consistency_fault(&self) -> bool {
        matches!(self, StoreError::Rollback { .. })
    }
}

/// A position in the transaction log. Queries return entries strictly after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogPosition {
    /// Before the first entry; the whole log.
    Start,
    /// After every entry whose date is at or before the given instant.
    AfterDate(DateTime<Utc>),
    /// After a specific entry, using `(date, sequence)` ordering so entries
    /// that share its date but were committed later are included.
    AfterEntry { date: DateTime<Utc>, sequence: u64 },
}

impl LogPosition {
    /// Whether a transaction lies strictly after this position.
    pub fn precedes(&self, txn: &Transaction) -> bool {
        match *self {
            LogPosition::Start => true,
            LogPosition::AfterDate(date) => txn.date > date,
            LogPosition::AfterEntry { date, sequence } => (txn.date, txn.sequence) > (date, sequence),
        }
    }
}

/// A log entry about to be appended. The store assigns its key and sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub kind: TransactionKind,
    pub page: PageSnapshot,
    pub date: DateTime<Utc>,
}

/// Writes available inside one atomic unit. Nothing written through a unit is
/// visible to readers until the unit commits.
pub trait WriteUnit {
    /// Store a new page under a freshly assigned key.
    fn insert_page(&mut self, draft: &PageDraft, date: DateTime<Utc>) -> Result<Page, StoreError>;

    /// Overwrite an existing page. Returns false if no page has that key.
    fn update_page(&mut self, page: &Page) -> Result<bool, StoreError>;

    /// Remove a page. Returns false if no page has that key.
    fn remove_page(&mut self, key: &PageKey) -> Result<bool, StoreError>;

    /// The date of the newest entry in the transaction log, if any.
    fn latest_log_date(&mut self) -> Result<Option<DateTime<Utc>>, StoreError>;

    /// Append an entry to the transaction log.
    fn append_transaction(&mut self, entry: &NewTransaction) -> Result<Transaction, StoreError>;

    /// Remove every page and every transaction.
    fn clear(&mut self) -> Result<(), StoreError>;
}

/// A key-value store holding pages and the transaction log.
pub trait RecordStore: Send + Sync {
    fn get_page(&self, key: &PageKey) -> Result<Option<Page>, StoreError>;

    /// Every live page, ordered by key.
    fn list_pages(&self) -> Result<Vec<Page>, StoreError>;

    fn get_transaction(&self, key: &TransactionKey) -> Result<Option<Transaction>, StoreError>;

    /// Every transaction strictly after `position`, ordered by `(date, sequence)`.
    fn transactions_after(&self, position: LogPosition) -> Result<Vec<Transaction>, StoreError>;

    /// Run `work` as a single atomic unit. If `work` returns an error, or the
    /// commit fails, none of its writes become visible.
    fn atomically<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn WriteUnit) -> Result<T, E>,
        E: From<StoreError>;
}
