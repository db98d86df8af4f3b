//! Conversation store over the key-value layer.
//!
//! The whole conversation collection lives under a single storage key as one
//! JSON array. Every mutation is a full read-modify-write of that array;
//! concurrent writers race at collection granularity (last writer wins).

use std::sync::Arc;

use async_trait::async_trait;
use folio_core::conversation::{Conversation, ConversationStore};
use folio_core::error::Result;
use folio_core::storage::KeyValueStore;

/// Storage key holding the serialized conversation collection.
pub const CONVERSATIONS_KEY: &str = "pdf_chat_conversations";

/// [`ConversationStore`] backed by any [`KeyValueStore`].
pub struct KvConversationStore {
    store: Arc<dyn KeyValueStore>,
}

impl KvConversationStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Decodes the stored collection in insertion order.
    ///
    /// A missing entry means nothing was ever stored and decodes to an empty
    /// collection; a present but undecodable entry is a typed error for the
    /// caller to degrade.
    async fn read_collection(&self) -> Result<Vec<Conversation>> {
        match self.store.get(CONVERSATIONS_KEY).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    async fn write_collection(&self, conversations: &[Conversation]) -> Result<()> {
        let raw = serde_json::to_string(conversations)?;
        self.store.set(CONVERSATIONS_KEY, &raw).await
    }
}

#[async_trait]
impl ConversationStore for KvConversationStore {
    async fn list_all(&self) -> Result<Vec<Conversation>> {
        let mut conversations = self.read_collection().await?;

        // Sort by last_updated descending (most recent first); the sort is
        // stable so ties keep their insertion order
        conversations.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));

        Ok(conversations)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Conversation>> {
        let conversations = self.read_collection().await?;
        Ok(conversations.into_iter().find(|c| c.id == id))
    }

    async fn save(&self, conversation: &Conversation) -> Result<()> {
        let mut conversations = self.read_collection().await?;

        match conversations.iter_mut().find(|c| c.id == conversation.id) {
            Some(existing) => *existing = conversation.clone(),
            None => conversations.push(conversation.clone()),
        }

        self.write_collection(&conversations).await?;
        tracing::debug!(
            "[KvConversationStore] Saved conversation {} ({} total)",
            conversation.id,
            conversations.len()
        );
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut conversations = self.read_collection().await?;
        conversations.retain(|c| c.id != id);

        // Written back unconditionally; deleting an absent id is a no-op
        self.write_collection(&conversations).await?;
        tracing::debug!("[KvConversationStore] Deleted conversation {}", id);
        Ok(())
    }
}
