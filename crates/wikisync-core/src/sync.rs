// ABOUTME: Incremental reads of the transaction log from a client checkpoint.
// ABOUTME: Resolves a checkpoint to a log position and returns every entry after it in order.

use std::sync::Arc;

use crate::checkpoint::Checkpoint;
use crate::error::WikiError;
use crate::model::Transaction;
use crate::store::{LogPosition, RecordStore};

/// Serves the transaction log to clients that poll for changes.
pub struct SyncReader<S> {
    store: Arc<S>,
}

impl<S> Clone for SyncReader<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: RecordStore> SyncReader<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Turn a checkpoint into the log position it stands for. A transaction
    /// checkpoint must name a transaction the store still holds.
    pub fn resolve(&self, checkpoint: Checkpoint) -> Result<LogPosition, WikiError> {
        match checkpoint {
            Checkpoint::Beginning => Ok(LogPosition::Start),
            Checkpoint::Since(date) => Ok(LogPosition::AfterDate(date)),
            Checkpoint::After(key) => {
                let txn = self
                    .store
                    .get_transaction(&key)?
                    .ok_or(WikiError::TransactionNotFound(key))?;
                Ok(LogPosition::AfterEntry {
                    date: txn.date,
                    sequence: txn.sequence,
                })
            }
        }
    }

    /// Every transaction recorded after the checkpoint, oldest first.
    ///
    /// With no checkpoint this is the full history. Entries that share a date
    /// are returned in commit order.
    pub fn recent_transactions(&self, checkpoint: Checkpoint) -> Result<Vec<Transaction>, WikiError> {
        let position = self.resolve(checkpoint)?;
        let transactions = self.store.transactions_after(position).map_err(|err| {
            tracing::error!("transaction log query failed: {}", err);
            WikiError::Storage(err)
        })?;
        tracing::debug!(
            ?position,
            count = transactions.len(),
            "served transaction log"
        );
        Ok(transactions)
    }
}
