//! File-backed key-value store.
//!
//! Each key maps to one file in the storage directory, written through
//! [`AtomicFile`] so values are always read back whole.

use std::path::PathBuf;

use async_trait::async_trait;
use folio_core::error::{FolioError, Result};
use folio_core::storage::KeyValueStore;

use crate::paths::FolioPaths;
use crate::storage::atomic_file::AtomicFile;

/// Persistent string-keyed store rooted at one directory.
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    /// Creates a store rooted at the given directory.
    ///
    /// The directory is created on first write, not here.
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Creates a store rooted at the platform storage directory.
    pub fn from_default_dir() -> Result<Self> {
        let dir = FolioPaths::storage_dir().map_err(|e| FolioError::config(e.to_string()))?;
        Ok(Self::new(dir))
    }

    fn entry(&self, key: &str) -> Result<AtomicFile> {
        if !is_valid_key(key) {
            return Err(FolioError::data_access(format!(
                "invalid storage key: '{}'",
                key
            )));
        }
        Ok(AtomicFile::new(self.dir.join(key)))
    }
}

/// Keys become file names; leading dots are reserved for tmp files.
fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entry = self.entry(key)?;
        Ok(entry.load()?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let entry = self.entry(key)?;
        entry.save(value)?;
        tracing::debug!("[FileKeyValueStore] Stored value under key '{}'", key);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let entry = self.entry(key)?;
        entry.remove()?;
        tracing::debug!("[FileKeyValueStore] Removed key '{}'", key);
        Ok(())
    }
}
