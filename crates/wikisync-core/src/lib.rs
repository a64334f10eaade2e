// ABOUTME: Core library for wikisync: pages, the transaction log, and the protocols over them.
// ABOUTME: Defines the record store seam, the mutation engine, and the incremental sync reader.

pub mod checkpoint;
pub mod engine;
pub mod error;
pub mod model;
pub mod pages;
pub mod store;
pub mod sync;
pub mod testing;

pub use checkpoint::{Checkpoint, format_since_date, parse_since_date};
pub use engine::{Mutation, MutationEngine, MutationOutcome};
pub use error::{ErrorKind, WikiError};
pub use model::{
    InvalidKey, Page, PageDraft, PageKey, PageSnapshot, Transaction, TransactionKey,
    TransactionKind,
};
pub use pages::PageReader;
pub use store::{LogPosition, NewTransaction, RecordStore, StoreError, WriteUnit};
pub use sync::SyncReader;
