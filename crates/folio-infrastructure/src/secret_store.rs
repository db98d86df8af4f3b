//! Secret store over the key-value layer.
//!
//! The credential is one raw string under a fixed key; there is no structure
//! and no encryption beyond the underlying store.

use std::sync::Arc;

use async_trait::async_trait;
use folio_core::error::Result;
use folio_core::secret::SecretStore;
use folio_core::storage::KeyValueStore;

/// Storage key holding the Gemini API credential.
pub const API_KEY_STORAGE_KEY: &str = "gemini_api_key";

/// [`SecretStore`] backed by any [`KeyValueStore`].
pub struct KvSecretStore {
    store: Arc<dyn KeyValueStore>,
}

impl KvSecretStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SecretStore for KvSecretStore {
    async fn get(&self) -> Result<Option<String>> {
        self.store.get(API_KEY_STORAGE_KEY).await
    }

    async fn set(&self, value: &str) -> Result<()> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            // Storing an empty credential means removing it
            return self.remove().await;
        }

        self.store.set(API_KEY_STORAGE_KEY, trimmed).await?;
        tracing::info!("[KvSecretStore] API credential updated");
        Ok(())
    }

    async fn remove(&self) -> Result<()> {
        self.store.remove(API_KEY_STORAGE_KEY).await?;
        tracing::info!("[KvSecretStore] API credential removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileKeyValueStore;
    use tempfile::TempDir;

    fn create_store(temp_dir: &TempDir) -> KvSecretStore {
        let kv = Arc::new(FileKeyValueStore::new(temp_dir.path().to_path_buf()));
        KvSecretStore::new(kv)
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_store(&temp_dir);

        assert!(store.get().await.unwrap().is_none());

        store.set("AIza-test-credential").await.unwrap();
        assert_eq!(
            store.get().await.unwrap().as_deref(),
            Some("AIza-test-credential")
        );
    }

    #[tokio::test]
    async fn test_set_trims_whitespace() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_store(&temp_dir);

        store.set("  AIza-test  \n").await.unwrap();
        assert_eq!(store.get().await.unwrap().as_deref(), Some("AIza-test"));
    }

    #[tokio::test]
    async fn test_set_empty_removes() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_store(&temp_dir);

        store.set("AIza-test").await.unwrap();
        store.set("   ").await.unwrap();

        assert!(store.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_store(&temp_dir);

        store.set("AIza-test").await.unwrap();
        store.remove().await.unwrap();
        store.remove().await.unwrap();

        assert!(store.get().await.unwrap().is_none());
    }
}
