//! Conversation domain model.
//!
//! This module contains the core Conversation entity: a persisted, titled
//! sequence of chat turns tied to one PDF display name.

use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};

/// Text of the assistant message every new conversation starts with.
pub const GREETING_MESSAGE: &str =
    "Hello! I'm Folio. Ask me questions about the PDF content.";

/// A single chat turn.
///
/// Message ids are creation-time clock readings and are only unique within
/// their conversation; nothing keys on them across conversations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Identifier unique within the owning conversation
    pub id: String,
    /// Plain text for user turns, possibly Markdown for assistant turns
    pub text: String,
    /// True for user turns, false for assistant turns
    pub is_user: bool,
}

impl ChatMessage {
    /// Creates a user turn with a Unix-millisecond id.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: millis_id(0),
            text: text.into(),
            is_user: true,
        }
    }

    /// Creates an assistant turn.
    ///
    /// The id is offset by one millisecond so that an answer created in the
    /// same clock tick as its question still gets a distinct id.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            id: millis_id(1),
            text: text.into(),
            is_user: false,
        }
    }
}

fn millis_id(offset: i64) -> String {
    (Utc::now().timestamp_millis() + offset).to_string()
}

/// Represents one persisted conversation about a PDF.
///
/// Association with a PDF is by exact string equality of `file_name` (the
/// display name). Two files sharing a display name are indistinguishable;
/// this is a known, accepted failure mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Unique conversation identifier (UUID format), immutable
    pub id: String,
    /// Transient reference to where the PDF bytes came from;
    /// not guaranteed valid across sessions
    pub pdf_uri: String,
    /// Display name of the associated PDF, the sole association key
    pub file_name: String,
    /// Derived from the file name and creation time; never recomputed
    pub title: String,
    /// Ordered chat turns; append-only, never reordered
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Timestamp when the conversation was created (ISO 8601 format)
    pub created_at: String,
    /// Timestamp of the last message-list mutation (ISO 8601 format)
    pub last_updated: String,
}

impl Conversation {
    /// Creates a new conversation for the given PDF with a fresh id, a
    /// synthesized title and a single seed assistant greeting.
    ///
    /// The caller is responsible for persisting the result.
    pub fn new(file_name: impl Into<String>, pdf_uri: impl Into<String>) -> Self {
        let file_name = file_name.into();
        let now = Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            pdf_uri: pdf_uri.into(),
            title: format!("{} - {}", file_name, Local::now().format("%Y-%m-%d %H:%M")),
            file_name,
            messages: vec![ChatMessage {
                id: "1".to_string(),
                text: GREETING_MESSAGE.to_string(),
                is_user: false,
            }],
            created_at: now.clone(),
            last_updated: now,
        }
    }

    /// Refreshes `last_updated` to the current time.
    pub fn touch(&mut self) {
        self.last_updated = Utc::now().to_rfc3339();
    }
}
