// ABOUTME: In-memory record store with fault injection, for exercising the engine in tests.
// ABOUTME: Units run against a staged copy of the data that is swapped in only on commit.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use ulid::{Generator, Ulid};

use crate::model::{Page, PageDraft, PageKey, Transaction, TransactionKey};
use crate::store::{LogPosition, NewTransaction, RecordStore, StoreError, WriteUnit};

/// A failure the store should simulate on subsequent units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Refuse every transaction log append.
    RejectLogWrites,
    /// Let all writes succeed, then fail the commit.
    FailCommit,
}

#[derive(Debug, Clone, Default)]
struct Records {
    pages: BTreeMap<PageKey, Page>,
    transactions: Vec<Transaction>,
    next_sequence: u64,
}

struct Inner {
    records: Records,
    generator: Generator,
    fault: Option<Fault>,
}

/// A RecordStore held entirely in memory.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                records: Records::default(),
                generator: Generator::new(),
                fault: None,
            }),
        }
    }

    /// Make every following unit fail in the given way until cleared.
    pub fn inject(&self, fault: Fault) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fault = Some(fault);
        }
    }

    pub fn clear_fault(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fault = None;
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }
}

struct StagedUnit<'a> {
    records: Records,
    generator: &'a mut Generator,
    fault: Option<Fault>,
}

impl StagedUnit<'_> {
    fn next_ulid(&mut self) -> Result<Ulid, StoreError> {
        self.generator
            .generate()
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

impl WriteUnit for StagedUnit<'_> {
    fn insert_page(&mut self, draft: &PageDraft, date: DateTime<Utc>) -> Result<Page, StoreError> {
        let page = Page {
            key: PageKey::new(self.next_ulid()?),
            title: draft.title.clone(),
            body: draft.body.clone(),
            date,
        };
        self.records.pages.insert(page.key, page.clone());
        Ok(page)
    }

    fn update_page(&mut self, page: &Page) -> Result<bool, StoreError> {
        match self.records.pages.get_mut(&page.key) {
            Some(existing) => {
                *existing = page.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove_page(&mut self, key: &PageKey) -> Result<bool, StoreError> {
        Ok(self.records.pages.remove(key).is_some())
    }

    fn latest_log_date(&mut self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.records.transactions.iter().map(|t| t.date).max())
    }

    fn append_transaction(&mut self, entry: &NewTransaction) -> Result<Transaction, StoreError> {
        if self.fault == Some(Fault::RejectLogWrites) {
            return Err(StoreError::Rejected("transaction log is refusing writes".to_string()));
        }
        self.records.next_sequence += 1;
        let txn = Transaction {
            key: TransactionKey::new(self.next_ulid()?),
            kind: entry.kind,
            page: entry.page.clone(),
            date: entry.date,
            sequence: self.records.next_sequence,
        };
        self.records.transactions.push(txn.clone());
        Ok(txn)
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.records.pages.clear();
        self.records.transactions.clear();
        Ok(())
    }
}

impl RecordStore for MemoryStore {
    fn get_page(&self, key: &PageKey) -> Result<Option<Page>, StoreError> {
        Ok(self.lock()?.records.pages.get(key).cloned())
    }

    fn list_pages(&self) -> Result<Vec<Page>, StoreError> {
        Ok(self.lock()?.records.pages.values().cloned().collect())
    }

    fn get_transaction(&self, key: &TransactionKey) -> Result<Option<Transaction>, StoreError> {
        Ok(self
            .lock()?
            .records
            .transactions
            .iter()
            .find(|t| t.key == *key)
            .cloned())
    }

    fn transactions_after(&self, position: LogPosition) -> Result<Vec<Transaction>, StoreError> {
        let inner = self.lock()?;
        let mut matching: Vec<Transaction> = inner
            .records
            .transactions
            .iter()
            .filter(|t| position.precedes(t))
            .cloned()
            .collect();
        matching.sort_by_key(|t| (t.date, t.sequence));
        Ok(matching)
    }

    fn atomically<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn WriteUnit) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut inner = self.lock()?;
        let Inner {
            records,
            generator,
            fault,
        } = &mut *inner;

        let mut unit = StagedUnit {
            records: records.clone(),
            generator,
            fault: *fault,
        };
        let value = work(&mut unit)?;

        if unit.fault == Some(Fault::FailCommit) {
            return Err(StoreError::Commit("simulated commit failure".to_string()).into());
        }
        *records = unit.records;
        Ok(value)
    }
}
