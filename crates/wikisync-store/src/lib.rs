// ABOUTME: Persistence layer for wikisync, storing pages and the transaction log in SQLite.
// ABOUTME: Implements the core RecordStore seam with native multi-record transactions.

pub mod sqlite;

pub use sqlite::{SqliteError, SqliteStore};
