// ABOUTME: Applies insert, update, and delete mutations to pages.
// ABOUTME: Each page write and its audit-log entry commit together in one atomic unit.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};

use crate::error::WikiError;
use crate::model::{Page, PageDraft, PageKey, PageSnapshot, Transaction, TransactionKind};
use crate::store::{NewTransaction, RecordStore, StoreError};

/// A validated request to change one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Insert(PageDraft),
    Update(PageKey, PageDraft),
    Delete(PageKey),
}

impl Mutation {
    /// Build a mutation from a kind and a raw client-supplied key.
    ///
    /// Inserts ignore the key. Updates and deletes require one that decodes;
    /// a missing or malformed key is a decode error.
    pub fn decode(
        kind: TransactionKind,
        supplied_key: Option<&str>,
        draft: PageDraft,
    ) -> Result<Self, WikiError> {
        let key = || -> Result<PageKey, WikiError> {
            Ok(supplied_key.unwrap_or_default().trim().parse()?)
        };

        match kind {
            TransactionKind::Insert => Ok(Mutation::Insert(draft)),
            TransactionKind::Update => Ok(Mutation::Update(key()?, draft)),
            TransactionKind::Delete => Ok(Mutation::Delete(key()?)),
        }
    }

    pub fn kind(&self) -> TransactionKind {
        match self {
            Mutation::Insert(_) => TransactionKind::Insert,
            Mutation::Update(..) => TransactionKind::Update,
            Mutation::Delete(_) => TransactionKind::Delete,
        }
    }
}

/// The committed result of a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    pub key: PageKey,
    /// The page as stored. None for deletes.
    pub page: Option<Page>,
    pub transaction: Transaction,
}

impl MutationOutcome {
    /// The page data to report back to the client: the full page, or only the
    /// key for a delete.
    pub fn snapshot(&self) -> PageSnapshot {
        match &self.page {
            Some(page) => PageSnapshot::from(page.clone()),
            None => PageSnapshot::key_only(self.key),
        }
    }
}

/// Applies mutations to pages and records each one in the transaction log.
///
/// The engine holds no state of its own; every guarantee comes from running
/// the page write and the log append inside a single store unit.
pub struct MutationEngine<S> {
    store: Arc<S>,
}

impl<S> Clone for MutationEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: RecordStore> MutationEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Apply a mutation, stamping it with the current time. The clock is read
    /// inside the store unit, so stamps follow commit order.
    pub fn apply(&self, mutation: Mutation) -> Result<MutationOutcome, WikiError> {
        self.commit(mutation, None)
    }

    /// Apply a mutation with a requested timestamp, truncated to microseconds.
    /// If the log already holds a later entry, that entry's date is used
    /// instead. The date is shared by the page and its transaction.
    pub fn apply_at(
        &self,
        mutation: Mutation,
        at: DateTime<Utc>,
    ) -> Result<MutationOutcome, WikiError> {
        self.commit(mutation, Some(at))
    }

    fn commit(
        &self,
        mutation: Mutation,
        at: Option<DateTime<Utc>>,
    ) -> Result<MutationOutcome, WikiError> {
        let kind = mutation.kind();

        let result = self.store.atomically(|unit| -> Result<MutationOutcome, WikiError> {
            // Log dates never go backwards, so a transaction checkpoint
            // cannot sort after an entry committed later.
            let requested = at.unwrap_or_else(Utc::now).trunc_subsecs(6);
            let now = match unit.latest_log_date()? {
                Some(latest) if latest > requested => latest,
                _ => requested,
            };

            let (key, page) = match mutation {
                Mutation::Insert(draft) => {
                    let page = unit.insert_page(&draft, now)?;
                    (page.key, Some(page))
                }
                Mutation::Update(key, draft) => {
                    let page = Page {
                        key,
                        title: draft.title,
                        body: draft.body,
                        date: now,
                    };
                    if !unit.update_page(&page)? {
                        return Err(WikiError::PageNotFound(key));
                    }
                    (key, Some(page))
                }
                Mutation::Delete(key) => {
                    if !unit.remove_page(&key)? {
                        return Err(WikiError::PageNotFound(key));
                    }
                    (key, None)
                }
            };

            let snapshot = match &page {
                Some(page) => PageSnapshot::from(page.clone()),
                None => PageSnapshot::key_only(key),
            };
            let transaction = unit.append_transaction(&NewTransaction {
                kind,
                page: snapshot,
                date: now,
            })?;

            Ok(MutationOutcome {
                key,
                page,
                transaction,
            })
        });

        match &result {
            Ok(outcome) => tracing::debug!(
                kind = %kind,
                page = %outcome.key,
                transaction = %outcome.transaction.key,
                "mutation committed"
            ),
            Err(WikiError::Storage(err)) => report_storage_failure(kind, err),
            Err(err) => tracing::debug!(kind = %kind, "mutation rejected: {}", err),
        }

        result
    }

    /// Delete every page and every transaction in one unit. Test and seed use only.
    pub fn reset(&self) -> Result<(), WikiError> {
        tracing::warn!("clearing all pages and transactions");
        self.store
            .atomically(|unit| unit.clear())
            .map_err(|err: StoreError| {
                tracing::error!("reset failed: {}", err);
                WikiError::Storage(err)
            })
    }
}

fn report_storage_failure(kind: TransactionKind, err: &StoreError) {
    match err {
        StoreError::Rollback { .. } => tracing::error!(
            kind = %kind,
            "consistency fault: unit could not be rolled back: {}",
            err
        ),
        StoreError::Commit(_) => tracing::error!(
            kind = %kind,
            "commit failed after page and log writes; unit discarded: {}",
            err
        ),
        _ => tracing::error!(kind = %kind, "mutation failed: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LogPosition;
    use crate::testing::{Fault, MemoryStore};
    use chrono::Duration;
    use ulid::Ulid;

    fn engine() -> (Arc<MemoryStore>, MutationEngine<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let engine = MutationEngine::new(Arc::clone(&store));
        (store, engine)
    }

    fn log(store: &MemoryStore) -> Vec<Transaction> {
        store.transactions_after(LogPosition::Start).unwrap()
    }

    #[test]
    fn insert_assigns_key_and_logs_insert() {
        let (store, engine) = engine();

        let outcome = engine
            .apply(Mutation::Insert(PageDraft::new("Red", "#0")))
            .unwrap();

        let page = outcome.page.clone().unwrap();
        assert_eq!(page.key, outcome.key);
        assert_eq!(page.title, "Red");
        assert_eq!(store.get_page(&outcome.key).unwrap(), Some(page.clone()));

        let entries = log(&store);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, TransactionKind::Insert);
        assert_eq!(entries[0].date, page.date);
        assert_eq!(entries[0].page, PageSnapshot::from(page));
    }

    #[test]
    fn update_preserves_key_and_replaces_content() {
        let (store, engine) = engine();
        let created = engine
            .apply(Mutation::Insert(PageDraft::new("Red", "#0")))
            .unwrap();

        let updated = engine
            .apply(Mutation::Update(created.key, PageDraft::new("Yellow", "#0")))
            .unwrap();

        assert_eq!(updated.key, created.key);
        let stored = store.get_page(&created.key).unwrap().unwrap();
        assert_eq!(stored.title, "Yellow");

        let kinds: Vec<_> = log(&store).iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TransactionKind::Insert, TransactionKind::Update]);
    }

    #[test]
    fn update_of_missing_page_is_not_found_and_logs_nothing() {
        let (store, engine) = engine();
        let key = PageKey::new(Ulid::new());

        let err = engine
            .apply(Mutation::Update(key, PageDraft::new("Ghost", "")))
            .unwrap_err();

        assert!(matches!(err, WikiError::PageNotFound(k) if k == key));
        assert!(log(&store).is_empty());
        assert!(store.list_pages().unwrap().is_empty());
    }

    #[test]
    fn delete_removes_page_and_logs_key_only_snapshot() {
        let (store, engine) = engine();
        let created = engine
            .apply(Mutation::Insert(PageDraft::new("Blue", "#1")))
            .unwrap();

        let deleted = engine.apply(Mutation::Delete(created.key)).unwrap();

        assert!(deleted.page.is_none());
        assert_eq!(deleted.snapshot(), PageSnapshot::key_only(created.key));
        assert_eq!(store.get_page(&created.key).unwrap(), None);

        let entries = log(&store);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].kind, TransactionKind::Delete);
        assert_eq!(entries[1].page, PageSnapshot::key_only(created.key));
    }

    #[test]
    fn delete_of_missing_page_is_not_found() {
        let (store, engine) = engine();
        let err = engine
            .apply(Mutation::Delete(PageKey::new(Ulid::new())))
            .unwrap_err();
        assert!(matches!(err, WikiError::PageNotFound(_)));
        assert!(log(&store).is_empty());
    }

    #[test]
    fn every_mutation_produces_exactly_one_matching_transaction() {
        let (store, engine) = engine();
        let start = Utc::now();

        let key = engine
            .apply_at(Mutation::Insert(PageDraft::new("Red", "#0")), start)
            .unwrap()
            .key;

        let mut expected = vec![(TransactionKind::Insert, start.trunc_subsecs(6))];
        for step in 1..=5 {
            let at = start + Duration::milliseconds(step);
            let mutation = if step == 5 {
                Mutation::Delete(key)
            } else {
                Mutation::Update(key, PageDraft::new(format!("v{step}"), "#0"))
            };
            let kind = mutation.kind();
            engine.apply_at(mutation, at).unwrap();
            expected.push((kind, at.trunc_subsecs(6)));
        }

        // A failed call must not add an entry.
        assert!(engine.apply(Mutation::Delete(key)).is_err());

        let actual: Vec<_> = log(&store).iter().map(|t| (t.kind, t.date)).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn stale_stamp_is_raised_to_latest_log_date() {
        let (store, engine) = engine();
        let later = Utc::now().trunc_subsecs(6);
        let earlier = later - Duration::seconds(5);

        engine
            .apply_at(Mutation::Insert(PageDraft::new("Red", "#b")), later)
            .unwrap();
        let outcome = engine
            .apply_at(Mutation::Insert(PageDraft::new("Red", "#a")), earlier)
            .unwrap();

        assert_eq!(outcome.transaction.date, later);
        assert_eq!(outcome.page.unwrap().date, later);
        let entries = log(&store);
        assert_eq!(entries[1].key, outcome.transaction.key);
        assert!(entries[1].sequence > entries[0].sequence);
    }

    #[test]
    fn rejected_log_write_leaves_page_untouched() {
        let (store, engine) = engine();
        let created = engine
            .apply(Mutation::Insert(PageDraft::new("Red", "#0")))
            .unwrap();

        store.inject(Fault::RejectLogWrites);

        let err = engine
            .apply(Mutation::Update(created.key, PageDraft::new("Yellow", "#0")))
            .unwrap_err();
        assert!(matches!(err, WikiError::Storage(StoreError::Rejected(_))));

        let err = engine
            .apply(Mutation::Insert(PageDraft::new("Red", "#1")))
            .unwrap_err();
        assert!(matches!(err, WikiError::Storage(_)));

        let err = engine.apply(Mutation::Delete(created.key)).unwrap_err();
        assert!(matches!(err, WikiError::Storage(_)));

        let pages = store.list_pages().unwrap();
        assert_eq!(pages, vec![created.page.unwrap()]);
        assert_eq!(log(&store).len(), 1);
    }

    #[test]
    fn failed_commit_is_reported_and_nothing_is_visible() {
        let (store, engine) = engine();
        store.inject(Fault::FailCommit);

        let err = engine
            .apply(Mutation::Insert(PageDraft::new("Red", "#0")))
            .unwrap_err();

        assert!(matches!(err, WikiError::Storage(StoreError::Commit(_))));
        assert!(store.list_pages().unwrap().is_empty());
        assert!(log(&store).is_empty());
    }

    #[test]
    fn faults_clear_and_writes_resume() {
        let (store, engine) = engine();
        store.inject(Fault::RejectLogWrites);
        assert!(engine.apply(Mutation::Insert(PageDraft::default())).is_err());

        store.clear_fault();
        assert!(engine.apply(Mutation::Insert(PageDraft::default())).is_ok());
        assert_eq!(log(&store).len(), 1);
    }

    #[test]
    fn reset_clears_pages_and_log() {
        let (store, engine) = engine();
        for i in 0..3 {
            engine
                .apply(Mutation::Insert(PageDraft::new("Red", format!("#{i}"))))
                .unwrap();
        }

        engine.reset().unwrap();

        assert!(store.list_pages().unwrap().is_empty());
        assert!(log(&store).is_empty());
    }

    #[test]
    fn decode_requires_key_for_update_and_delete() {
        let draft = PageDraft::new("Red", "#0");

        let insert = Mutation::decode(TransactionKind::Insert, Some("garbage"), draft.clone());
        assert_eq!(insert.unwrap(), Mutation::Insert(draft.clone()));

        let err = Mutation::decode(TransactionKind::Update, Some("garbage"), draft.clone())
            .unwrap_err();
        assert!(matches!(err, WikiError::InvalidKey(_)));

        let err = Mutation::decode(TransactionKind::Delete, None, draft.clone()).unwrap_err();
        assert!(matches!(err, WikiError::InvalidKey(_)));

        let key = PageKey::new(Ulid::new());
        let update =
            Mutation::decode(TransactionKind::Update, Some(&key.to_string()), draft.clone());
        assert_eq!(update.unwrap(), Mutation::Update(key, draft));
    }
}
