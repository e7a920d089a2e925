//! In-memory store

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::{RecordStore, StoreError, StoreResult};

/// Records held in a map; nothing survives the process.
///
/// Writes can be made to fail on demand to exercise error paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, Vec<u8>>>,
    fail_io: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the raw bytes at `location` without counting a write
    pub fn insert(&self, location: &str, bytes: impl Into<Vec<u8>>) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(location.to_string(), bytes.into());
    }

    /// Raw bytes at `location`
    pub fn get(&self, location: &str) -> Option<Vec<u8>> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(location)
            .cloned()
    }

    /// Make every subsequent operation fail with an I/O error
    pub fn set_fail_io(&self, fail: bool) {
        self.fail_io.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_io(&self) -> StoreResult<()> {
        if self.fail_io.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("simulated I/O failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn exists(&self, location: &str) -> StoreResult<bool> {
        self.check_io()?;
        Ok(self.get(location).is_some())
    }

    async fn read(&self, location: &str) -> StoreResult<Option<Vec<u8>>> {
        self.check_io()?;
        Ok(self.get(location))
    }

    async fn write(&self, location: &str, bytes: &[u8]) -> StoreResult<()> {
        self.check_io()?;
        self.insert(location, bytes);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        !self.fail_io.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read() {
        let store = MemoryStore::new();
        assert!(!store.exists("k").await.unwrap());

        store.write("k", b"value").await.unwrap();
        assert!(store.exists("k").await.unwrap());
        assert_eq!(store.read("k").await.unwrap().unwrap(), b"value");
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn simulated_failure() {
        let store = MemoryStore::new();
        store.set_fail_io(true);

        assert!(!store.is_healthy());
        assert!(matches!(store.read("k").await, Err(StoreError::Io(_))));
        assert!(store.write("k", b"x").await.is_err());
        assert_eq!(store.write_count(), 0);

        store.set_fail_io(false);
        assert!(store.write("k", b"x").await.is_ok());
    }
}
