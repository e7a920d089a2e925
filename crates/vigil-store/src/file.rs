//! Filesystem store
//!
//! Each location is a relative path under the store root. Writes go to a
//! sibling temp file that is fsynced and then renamed over the target, so a
//! crash mid-write leaves either the old record or the new one.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::{RecordStore, StoreError, StoreResult};

/// Store backed by plain files under `root`
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `location` under the root. Absolute paths and `..` are rejected.
    pub fn path_for(&self, location: &str) -> StoreResult<PathBuf> {
        let relative = Path::new(location);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if location.is_empty() || escapes {
            return Err(StoreError::InvalidLocation(format!("'{}'", location)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn exists(&self, location: &str) -> StoreResult<bool> {
        let path = self.path_for(location)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    async fn read(&self, location: &str) -> StoreResult<Option<Vec<u8>>> {
        let path = self.path_for(location)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, location: &str, bytes: &[u8]) -> StoreResult<()> {
        let path = self.path_for(location)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp = path.with_file_name(tmp_name);

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        debug!(path = %path.display(), len = bytes.len(), "Record written");
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        // The root is created lazily on first write.
        !self.root.exists() || self.root.is_dir()
    }
}
