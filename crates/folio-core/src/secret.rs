//! Secret management trait.
//!
//! Defines the interface for storing the user-provided API credential.

use async_trait::async_trait;

use crate::error::Result;

/// Store for the single user-provided API credential.
///
/// # Security Note
///
/// Implementations should ensure that:
/// - The stored value is never logged or exposed in error messages
/// - Display surfaces only ever show a masked rendering
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Reads the stored credential, `None` when none is configured.
    async fn get(&self) -> Result<Option<String>>;

    /// Stores the credential.
    ///
    /// Setting an empty (or whitespace-only) value removes the stored
    /// credential instead.
    async fn set(&self, value: &str) -> Result<()>;

    /// Removes the stored credential. Removing an absent one is a no-op.
    async fn remove(&self) -> Result<()>;
}

/// Display-safe rendering of a credential: one bullet per character, capped
/// at 20 so the mask does not leak the length of long keys.
pub fn mask(value: &str) -> String {
    "•".repeat(value.chars().count().min(20))
}
