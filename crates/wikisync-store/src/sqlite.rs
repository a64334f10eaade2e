// ABOUTME: SQLite-backed record store for pages and the transaction log.
// ABOUTME: Each atomic unit runs as one IMMEDIATE SQLite transaction on a shared connection.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use thiserror::Error;
use ulid::Generator;
use wikisync_core::{
    LogPosition, NewTransaction, Page, PageDraft, PageKey, PageSnapshot, RecordStore, StoreError,
    Transaction, TransactionKey, TransactionKind, WriteUnit,
};

/// Errors that can occur while opening the SQLite store.
#[derive(Debug, Error)]
pub enum SqliteError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS pages (
        page_key TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        body TEXT NOT NULL,
        date_us INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS transactions (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        txn_key TEXT NOT NULL UNIQUE,
        kind TEXT NOT NULL,
        page_key TEXT NOT NULL,
        title TEXT,
        body TEXT,
        page_date_us INTEGER,
        date_us INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS transactions_by_date ON transactions (date_us, seq);
";

const TRANSACTION_COLUMNS: &str =
    "seq, txn_key, kind, page_key, title, body, page_date_us, date_us";

struct Inner {
    conn: Connection,
    generator: Generator,
}

/// A RecordStore persisted in a single SQLite database file.
///
/// The connection is shared behind a mutex, so units and reads are serialized.
/// Dates are stored as integer microseconds since the epoch; the transaction
/// log is ordered by `(date_us, seq)` where `seq` is SQLite's autoincrement.
pub struct SqliteStore {
    inner: Mutex<Inner>,
}

impl SqliteStore {
    /// Open or create the store at the given path, creating parent
    /// directories and the schema as needed.
    pub fn open(path: &Path) -> Result<Self, SqliteError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, SqliteError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, SqliteError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            inner: Mutex::new(Inner {
                conn,
                generator: Generator::new(),
            }),
        })
    }

    /// Run raw SQL against the database. Intended for maintenance and tests.
    pub fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        self.lock()?.conn.execute_batch(sql).map_err(backend)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn backend(err: rusqlite::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn to_micros(date: &DateTime<Utc>) -> i64 {
    date.timestamp_micros()
}

fn from_micros(micros: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::<Utc>::from_timestamp_micros(micros)
        .ok_or_else(|| StoreError::Corrupt(format!("date out of range: {micros}")))
}

/// Raw column values of a transactions row, decoded outside the rusqlite closure.
struct TransactionRow {
    seq: i64,
    txn_key: String,
    kind: String,
    page_key: String,
    title: Option<String>,
    body: Option<String>,
    page_date_us: Option<i64>,
    date_us: i64,
}

impl TransactionRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            seq: row.get(0)?,
            txn_key: row.get(1)?,
            kind: row.get(2)?,
            page_key: row.get(3)?,
            title: row.get(4)?,
            body: row.get(5)?,
            page_date_us: row.get(6)?,
            date_us: row.get(7)?,
        })
    }

    fn decode(self) -> Result<Transaction, StoreError> {
        let corrupt = |e: &dyn std::fmt::Display| StoreError::Corrupt(e.to_string());
        Ok(Transaction {
            key: self.txn_key.parse::<TransactionKey>().map_err(|e| corrupt(&e))?,
            kind: self.kind.parse::<TransactionKind>().map_err(|e| corrupt(&e))?,
            page: PageSnapshot {
                key: self.page_key.parse::<PageKey>().map_err(|e| corrupt(&e))?,
                title: self.title,
                body: self.body,
                date: self.page_date_us.map(from_micros).transpose()?,
            },
            date: from_micros(self.date_us)?,
            sequence: u64::try_from(self.seq).map_err(|e| corrupt(&e))?,
        })
    }
}

fn query_log(
    conn: &Connection,
    filter: &str,
    args: impl rusqlite::Params,
) -> Result<Vec<Transaction>, StoreError> {
    let sql = format!(
        "SELECT {TRANSACTION_COLUMNS} FROM transactions {filter} ORDER BY date_us ASC, seq ASC"
    );
    let mut stmt = conn.prepare(&sql).map_err(backend)?;
    let rows = stmt.query_map(args, TransactionRow::read).map_err(backend)?;

    let mut transactions = Vec::new();
    for row in rows {
        transactions.push(row.map_err(backend)?.decode()?);
    }
    Ok(transactions)
}

fn read_page(row: &Row<'_>) -> rusqlite::Result<(String, String, String, i64)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode_page((key, title, body, date_us): (String, String, String, i64)) -> Result<Page, StoreError> {
    Ok(Page {
        key: key
            .parse::<PageKey>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?,
        title,
        body,
        date: from_micros(date_us)?,
    })
}

/// The write side of one SQLite transaction.
struct SqliteUnit<'a> {
    tx: &'a rusqlite::Transaction<'a>,
    generator: &'a mut Generator,
}

impl SqliteUnit<'_> {
    fn next_ulid(&mut self) -> Result<ulid::Ulid, StoreError> {
        self.generator
            .generate()
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

impl WriteUnit for SqliteUnit<'_> {
    fn insert_page(&mut self, draft: &PageDraft, date: DateTime<Utc>) -> Result<Page, StoreError> {
        let page = Page {
            key: PageKey::new(self.next_ulid()?),
            title: draft.title.clone(),
            body: draft.body.clone(),
            date,
        };
        self.tx
            .execute(
                "INSERT INTO pages (page_key, title, body, date_us) VALUES (?1, ?2, ?3, ?4)",
                params![page.key.to_string(), page.title, page.body, to_micros(&page.date)],
            )
            .map_err(backend)?;
        Ok(page)
    }

    fn update_page(&mut self, page: &Page) -> Result<bool, StoreError> {
        let changed = self
            .tx
            .execute(
                "UPDATE pages SET title = ?1, body = ?2, date_us = ?3 WHERE page_key = ?4",
                params![page.title, page.body, to_micros(&page.date), page.key.to_string()],
            )
            .map_err(backend)?;
        Ok(changed > 0)
    }

    fn remove_page(&mut self, key: &PageKey) -> Result<bool, StoreError> {
        let changed = self
            .tx
            .execute("DELETE FROM pages WHERE page_key = ?1", params![key.to_string()])
            .map_err(backend)?;
        Ok(changed > 0)
    }

    fn latest_log_date(&mut self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let micros: Option<i64> = self
            .tx
            .query_row("SELECT MAX(date_us) FROM transactions", [], |row| row.get(0))
            .map_err(backend)?;
        micros.map(from_micros).transpose()
    }

    fn append_transaction(&mut self, entry: &NewTransaction) -> Result<Transaction, StoreError> {
        let key = TransactionKey::new(self.next_ulid()?);
        self.tx
            .execute(
                "INSERT INTO transactions (txn_key, kind, page_key, title, body, page_date_us, date_us)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    key.to_string(),
                    entry.kind.as_str(),
                    entry.page.key.to_string(),
                    entry.page.title,
                    entry.page.body,
                    entry.page.date.as_ref().map(to_micros),
                    to_micros(&entry.date),
                ],
            )
            .map_err(|e| StoreError::Rejected(e.to_string()))?;

        let seq = self.tx.last_insert_rowid();
        Ok(Transaction {
            key,
            kind: entry.kind,
            page: entry.page.clone(),
            date: entry.date,
            sequence: u64::try_from(seq).map_err(|e| StoreError::Corrupt(e.to_string()))?,
        })
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.tx
            .execute_batch("DELETE FROM pages; DELETE FROM transactions;")
            .map_err(backend)
    }
}

impl RecordStore for SqliteStore {
    fn get_page(&self, key: &PageKey) -> Result<Option<Page>, StoreError> {
        let inner = self.lock()?;
        let row = inner
            .conn
            .query_row(
                "SELECT page_key, title, body, date_us FROM pages WHERE page_key = ?1",
                params![key.to_string()],
                read_page,
            )
            .optional()
            .map_err(backend)?;
        row.map(decode_page).transpose()
    }

    fn list_pages(&self) -> Result<Vec<Page>, StoreError> {
        let inner = self.lock()?;
        let mut stmt = inner
            .conn
            .prepare("SELECT page_key, title, body, date_us FROM pages ORDER BY page_key ASC")
            .map_err(backend)?;
        let rows = stmt.query_map([], read_page).map_err(backend)?;

        let mut pages = Vec::new();
        for row in rows {
            pages.push(decode_page(row.map_err(backend)?)?);
        }
        Ok(pages)
    }

    fn get_transaction(&self, key: &TransactionKey) -> Result<Option<Transaction>, StoreError> {
        let inner = self.lock()?;
        let row = inner
            .conn
            .query_row(
                &format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE txn_key = ?1"),
                params![key.to_string()],
                TransactionRow::read,
            )
            .optional()
            .map_err(backend)?;
        row.map(TransactionRow::decode).transpose()
    }

    fn transactions_after(&self, position: LogPosition) -> Result<Vec<Transaction>, StoreError> {
        let inner = self.lock()?;
        match position {
            LogPosition::Start => query_log(&inner.conn, "", []),
            LogPosition::AfterDate(date) => {
                query_log(&inner.conn, "WHERE date_us > ?1", params![to_micros(&date)])
            }
            LogPosition::AfterEntry { date, sequence } => {
                let seq =
                    i64::try_from(sequence).map_err(|e| StoreError::Corrupt(e.to_string()))?;
                query_log(
                    &inner.conn,
                    "WHERE date_us > ?1 OR (date_us = ?1 AND seq > ?2)",
                    params![to_micros(&date), seq],
                )
            }
        }
    }

    fn atomically<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn WriteUnit) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut inner = self.lock()?;
        let Inner { conn, generator } = &mut *inner;

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(backend)?;

        let outcome = {
            let mut unit = SqliteUnit {
                tx: &tx,
                generator,
            };
            work(&mut unit)
        };

        match outcome {
            Ok(value) => {
                tx.commit()
                    .map_err(|e| StoreError::Commit(e.to_string()))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback() {
                    tracing::error!("sqlite rollback failed: {}", rollback);
                    return Err(StoreError::Rollback {
                        cause: "aborted unit".to_string(),
                        rollback: rollback.to_string(),
                    }
                    .into());
                }
                Err(err)
            }
        }
    }
}
