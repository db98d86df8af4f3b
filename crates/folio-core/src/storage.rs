//! Key-value storage trait.

use async_trait::async_trait;

use crate::error::Result;

/// A persistent string-keyed store with a single process-wide namespace.
///
/// Values survive application restarts. Keys are flat strings; there is no
/// hierarchy and no enumeration.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`, `None` when the key was never set
    /// or has been removed.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Removing an absent key is a no-op.
    async fn remove(&self, key: &str) -> Result<()>;
}
