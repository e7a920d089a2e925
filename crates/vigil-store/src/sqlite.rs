//! SQLite-based store implementation

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::{RecordStore, StoreError, StoreResult};

/// Database file name inside the data directory
pub const SQLITE_FILE_NAME: &str = "vigil.db";

/// SQLite-based store; each location is a row key
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".into()))
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                key TEXT PRIMARY KEY,
                body BLOB NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn exists(&self, location: &str) -> StoreResult<bool> {
        let conn = self.lock()?;
        let found: Option<i64> = conn
            .query_row("SELECT 1 FROM records WHERE key = ?", [location], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    async fn read(&self, location: &str) -> StoreResult<Option<Vec<u8>>> {
        let conn = self.lock()?;
        let body: Option<Vec<u8>> = conn
            .query_row("SELECT body FROM records WHERE key = ?", [location], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(body)
    }

    async fn write(&self, location: &str, bytes: &[u8]) -> StoreResult<()> {
        let conn = self.lock()?;
        let updated_at = vigil_util::now().to_rfc3339();

        conn.execute(
            r#"
            INSERT INTO records (key, body, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key)
            DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at
            "#,
            params![location, bytes, updated_at],
        )?;

        debug!(key = location, len = bytes.len(), "Record saved");
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}
