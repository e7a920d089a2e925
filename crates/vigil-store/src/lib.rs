//! Persistence layer for vigil
//!
//! The budget record is an opaque byte blob stored at a single location.
//! Provides:
//! - [`RecordStore`] trait
//! - [`FileStore`]: atomic file replacement under a root directory
//! - [`SqliteStore`]: keyed rows in a SQLite database
//! - [`MemoryStore`]: in-process map for tests and dry runs

mod file;
mod memory;
mod sqlite;
mod traits;

pub use file::*;
pub use memory::*;
pub use sqlite::*;
pub use traits::*;

use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid record location: {0}")]
    InvalidLocation(String),
}

impl StoreError {
    /// Whether the stored bytes were readable but not a valid record
    pub fn is_malformed(&self) -> bool {
        matches!(self, StoreError::Serialization(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
