//! Conversation store trait.
//!
//! Defines the interface for conversation persistence operations.

use super::model::Conversation;
use crate::error::Result;
use async_trait::async_trait;

/// An abstract store for the durable list of conversation records.
///
/// This trait decouples session logic from the specific storage mechanism.
/// Every mutation is a full read-modify-write of the entire collection;
/// implementations are not required to be atomic across concurrent callers
/// (last writer wins at collection granularity).
///
/// Failures are reported as typed errors. Degrading them to benign empty
/// values is the session layer's job, not the store's.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Lists every stored conversation.
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<Conversation>)`: all stored conversations, an empty vector
    ///   when nothing was ever stored
    /// - `Err(_)`: the stored collection could not be read or decoded
    async fn list_all(&self) -> Result<Vec<Conversation>>;

    /// Finds a conversation by its ID.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Conversation))`: conversation found
    /// - `Ok(None)`: no conversation with this id
    /// - `Err(_)`: error occurred during retrieval
    async fn get_by_id(&self, id: &str) -> Result<Option<Conversation>>;

    /// Saves a conversation, replacing the record with the same id or
    /// appending a new one, then writes the entire collection back.
    async fn save(&self, conversation: &Conversation) -> Result<()>;

    /// Deletes the conversation with the given id.
    ///
    /// Deleting an id that does not exist is a no-op, not an error; the
    /// surviving collection is written back either way.
    async fn delete(&self, id: &str) -> Result<()>;
}
