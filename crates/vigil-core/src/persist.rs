//! Loading and saving the budget record

use std::sync::Arc;
use tracing::debug;
use vigil_store::{RecordStore, StoreResult};

use crate::BudgetState;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// The budget record at one location in a [`RecordStore`]
#[derive(Clone)]
pub struct StateFile {
    store: Arc<dyn RecordStore>,
    location: String,
}

impl StateFile {
    pub fn new(store: Arc<dyn RecordStore>, location: impl Into<String>) -> Self {
        Self {
            store,
            location: location.into(),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Load the record. An absent or blank record is `None`; unparseable
    /// bytes are a serialization error.
    pub async fn load(&self) -> StoreResult<Option<BudgetState>> {
        let Some(bytes) = self.store.read(&self.location).await? else {
            return Ok(None);
        };

        let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes);
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        Ok(Some(serde_json::from_slice(body)?))
    }

    /// Overwrite the record. Remaining time is written clamped at zero.
    pub async fn save(&self, state: &BudgetState) -> StoreResult<()> {
        let mut record = state.clone();
        record.clamp_remaining();

        let bytes = serde_json::to_vec_pretty(&record)?;
        self.store.write(&self.location, &bytes).await?;

        debug!(location = %self.location, "Budget record saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeDelta, TimeZone};
    use vigil_store::{FileStore, MemoryStore, StoreError};

    fn sample() -> BudgetState {
        let now = Local.with_ymd_and_hms(2025, 6, 18, 12, 0, 0).single().unwrap();
        BudgetState::fresh(now, TimeDelta::hours(2))
    }

    #[tokio::test]
    async fn missing_record_is_none() {
        let file = StateFile::new(Arc::new(MemoryStore::new()), "state.json");
        assert!(file.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn blank_record_is_none() {
        let store = Arc::new(MemoryStore::new());
        store.insert("state.json", "  \n");
        let file = StateFile::new(store, "state.json");
        assert!(file.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let file = StateFile::new(Arc::new(FileStore::new(dir.path())), "state.json");

        file.save(&sample()).await.unwrap();
        assert_eq!(file.load().await.unwrap(), Some(sample()));

        let text = std::fs::read_to_string(dir.path().join("state.json")).unwrap();
        assert!(text.contains("\"remainingToday\": \"02:00:00\""));
    }

    #[tokio::test]
    async fn save_clamps_negative_remaining() {
        let store = Arc::new(MemoryStore::new());
        let file = StateFile::new(store.clone(), "state.json");

        let mut state = sample();
        state.remaining_today = TimeDelta::minutes(-4);
        file.save(&state).await.unwrap();

        let loaded = file.load().await.unwrap().unwrap();
        assert_eq!(loaded.remaining_today, TimeDelta::zero());
    }

    #[tokio::test]
    async fn malformed_record_is_serialization_error() {
        let store = Arc::new(MemoryStore::new());
        store.insert("state.json", "{ not json");
        let file = StateFile::new(store, "state.json");

        let err = file.load().await.unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
        assert!(err.is_malformed());
    }

    #[tokio::test]
    async fn bom_is_tolerated() {
        let store = Arc::new(MemoryStore::new());
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend(serde_json::to_vec(&sample()).unwrap());
        store.insert("state.json", bytes);

        let file = StateFile::new(store, "state.json");
        assert_eq!(file.load().await.unwrap(), Some(sample()));
    }
}
