//! Conversation domain module.
//!
//! This module contains the conversation-related domain models and the
//! store interface.
//!
//! # Module Structure
//!
//! - `model`: Core conversation domain model (`Conversation`, `ChatMessage`)
//! - `store`: Store trait for conversation persistence

mod model;
mod store;

// Re-export public API
pub use model::{ChatMessage, Conversation, GREETING_MESSAGE};
pub use store::ConversationStore;
