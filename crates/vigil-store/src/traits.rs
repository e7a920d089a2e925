//! Store trait definitions

use async_trait::async_trait;

use crate::StoreResult;

/// Byte-level storage for a single record per location.
///
/// Writes replace the whole record and are durable once they return.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Whether a record exists at `location`
    async fn exists(&self, location: &str) -> StoreResult<bool>;

    /// Read the record at `location`, `None` if absent
    async fn read(&self, location: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Overwrite the record at `location`
    async fn write(&self, location: &str, bytes: &[u8]) -> StoreResult<()>;

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}
