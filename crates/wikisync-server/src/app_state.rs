// ABOUTME: Shared application state for the wikisync HTTP server.
// ABOUTME: Bundles the mutation engine and the readers, all over one SQLite store.

use std::path::Path;
use std::sync::Arc;

use wikisync_core::{MutationEngine, PageReader, SyncReader};
use wikisync_store::{SqliteError, SqliteStore};

/// Shared application state accessible by all Axum handlers.
pub struct AppState {
    pub engine: MutationEngine<SqliteStore>,
    pub pages: PageReader<SqliteStore>,
    pub sync: SyncReader<SqliteStore>,
}

/// Type alias for the Arc-wrapped state used with Axum's State extractor.
pub type SharedState = Arc<AppState>;

impl AppState {
    /// Build the engine and readers over an already opened store.
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self {
            engine: MutationEngine::new(Arc::clone(&store)),
            pages: PageReader::new(Arc::clone(&store)),
            sync: SyncReader::new(store),
        }
    }

    /// Open (or create) the SQLite database at `path` and build state over it.
    pub fn open(path: &Path) -> Result<Self, SqliteError> {
        Ok(Self::new(Arc::new(SqliteStore::open(path)?)))
    }
}
