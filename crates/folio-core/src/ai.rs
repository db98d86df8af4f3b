//! AI query boundary.
//!
//! Defines the interface for asking the external model a question about the
//! loaded document, and the typed failure modes of that call.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::conversation::ChatMessage;

/// Failure modes of an AI query.
///
/// These stay typed inside the application; the chat surface renders each of
/// them as a fixed fallback answer string appended to the transcript as a
/// normal assistant turn (see [`QueryError::fallback_text`]).
#[derive(Error, Debug, Clone)]
pub enum QueryError {
    /// No API credential is configured
    #[error("no API credential is configured")]
    MissingCredential,

    /// No document content is available to ground the question
    #[error("no document content is loaded")]
    MissingDocument,

    /// The API rejected the configured credential
    #[error("credential rejected: {0}")]
    InvalidCredential(String),

    /// The request failed in transport or with an HTTP error status
    #[error("API request failed: {message}")]
    Request {
        /// HTTP status when the server answered, `None` for transport errors
        status_code: Option<u16>,
        message: String,
        is_retryable: bool,
        retry_after: Option<Duration>,
    },

    /// The response decoded fine but contained no answer text
    #[error("API response contained no answer text")]
    EmptyResponse,

    /// Anything else (decode failures etc.)
    #[error("{0}")]
    Other(String),
}

impl QueryError {
    /// The fixed human-readable answer shown in the transcript for this
    /// failure. Chat surfaces append it as a regular assistant turn instead
    /// of surfacing an error.
    pub fn fallback_text(&self) -> &'static str {
        match self {
            Self::MissingCredential => {
                "Please set your Gemini API key with the /key command before using the chat feature."
            }
            Self::MissingDocument => "No PDF content loaded. Please open a PDF first.",
            Self::InvalidCredential(_) => {
                "Invalid API key. Please check your Gemini API key with the /key command."
            }
            Self::Request { .. } | Self::EmptyResponse | Self::Other(_) => {
                "Sorry, I encountered an error processing your request. Please try again."
            }
        }
    }

    /// Whether retrying the same request later could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request { is_retryable, .. } => *is_retryable,
            _ => false,
        }
    }
}

/// Client for the external LLM request/response boundary.
///
/// Stateless per call: every invocation carries the full document text and
/// prior turns. Implementations make exactly one attempt per call; retry
/// metadata on [`QueryError`] is informational.
#[async_trait]
pub trait QueryClient: Send + Sync {
    /// Asks one question about `document_text`, given the prior `history`
    /// of the conversation.
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: the answer text
    /// - `Err(QueryError)`: a typed failure; callers degrade it to its
    ///   fallback transcript string
    async fn query(
        &self,
        document_text: &str,
        question: &str,
        history: &[ChatMessage],
    ) -> Result<String, QueryError>;
}
