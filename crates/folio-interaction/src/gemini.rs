//! Gemini query client.
//!
//! Calls the Gemini REST API directly. The credential is read from the
//! secret store on every call so key changes take effect immediately.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use folio_core::ai::{QueryClient, QueryError};
use folio_core::conversation::ChatMessage;
use folio_core::secret::SecretStore;
use reqwest::{Client, StatusCode, header::HeaderValue};
use serde::{Deserialize, Serialize};

use crate::prompt::build_prompt;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Client implementation that talks to the Gemini HTTP API.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    secret_store: Arc<dyn SecretStore>,
    model: String,
}

impl GeminiClient {
    /// Creates a new client asking the given model.
    pub fn new(secret_store: Arc<dyn SecretStore>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            secret_store,
            model: model.into(),
        }
    }

    async fn send_request(
        &self,
        api_key: &str,
        body: &GenerateContentRequest,
    ) -> Result<String, QueryError> {
        let url = format!(
            "{}/{model}:generateContent?key={api_key}",
            BASE_URL,
            model = self.model,
            api_key = api_key
        );

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|err| QueryError::Request {
                status_code: None,
                message: format!("Gemini API request failed: {err}"),
                is_retryable: err.is_connect() || err.is_timeout(),
                retry_after: None,
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = parse_retry_after(response.headers().get("retry-after"));
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read Gemini error body".to_string());
            return Err(map_http_error(status, body_text, retry_after));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|err| QueryError::Other(format!("Failed to parse Gemini response: {err}")))?;

        extract_text_response(parsed)
    }
}

#[async_trait]
impl QueryClient for GeminiClient {
    async fn query(
        &self,
        document_text: &str,
        question: &str,
        history: &[ChatMessage],
    ) -> Result<String, QueryError> {
        let api_key = self
            .secret_store
            .get()
            .await
            .map_err(|e| QueryError::Other(format!("Failed to read credential: {e}")))?
            .ok_or(QueryError::MissingCredential)?;

        if document_text.trim().is_empty() {
            return Err(QueryError::MissingDocument);
        }

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: build_prompt(document_text, question, history),
                }],
            }],
        };

        tracing::debug!("[GeminiClient] Querying model {}", self.model);
        self.send_request(&api_key, &request).await
    }
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Deserialize)]
struct ContentResponse {
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[allow(dead_code)]
    code: Option<i32>,
    message: Option<String>,
    status: Option<String>,
}

fn extract_text_response(response: GenerateContentResponse) -> Result<String, QueryError> {
    response
        .candidates
        .and_then(|mut candidates| candidates.pop())
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().find_map(|part| part.text))
        .ok_or(QueryError::EmptyResponse)
}

fn map_http_error(status: StatusCode, body: String, retry_after: Option<Duration>) -> QueryError {
    let message = serde_json::from_str::<ErrorWrapper>(&body)
        .map(|wrapper| {
            let status_text = wrapper.error.status.unwrap_or_default();
            let msg = wrapper.error.message.unwrap_or_else(|| body.clone());
            if status_text.is_empty() {
                msg
            } else {
                format!("{status_text}: {msg}")
            }
        })
        .unwrap_or_else(|_| body.clone());

    // A rejected key comes back as a 400 whose message names the API key
    if message.contains("API key") || message.contains("API_KEY_INVALID") {
        return QueryError::InvalidCredential(message);
    }

    let is_retryable = matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    );

    QueryError::Request {
        status_code: Some(status.as_u16()),
        message,
        is_retryable,
        retry_after,
    }
}

fn parse_retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let value = header?.to_str().ok()?;
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    // Retry-After HTTP-date parsing is omitted for simplicity
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_response() {
        let json = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "The answer."}]}}
            ]
        }"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();

        assert_eq!(extract_text_response(response).unwrap(), "The answer.");
    }

    #[test]
    fn test_empty_candidates_is_empty_response() {
        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates": []}"#).unwrap();

        assert!(matches!(
            extract_text_response(response),
            Err(QueryError::EmptyResponse)
        ));
    }

    #[test]
    fn test_invalid_key_error_is_classified() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid. Please pass a valid API key.", "status": "INVALID_ARGUMENT"}}"#;

        let err = map_http_error(StatusCode::BAD_REQUEST, body.to_string(), None);
        assert!(matches!(err, QueryError::InvalidCredential(_)));
    }

    #[test]
    fn test_server_errors_are_retryable() {
        let err = map_http_error(
            StatusCode::SERVICE_UNAVAILABLE,
            r#"{"error": {"message": "overloaded", "status": "UNAVAILABLE"}}"#.to_string(),
            Some(Duration::from_secs(7)),
        );

        match err {
            QueryError::Request {
                status_code,
                message,
                is_retryable,
                retry_after,
            } => {
                assert_eq!(status_code, Some(503));
                assert_eq!(message, "UNAVAILABLE: overloaded");
                assert!(is_retryable);
                assert_eq!(retry_after, Some(Duration::from_secs(7)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        let err = map_http_error(
            StatusCode::BAD_REQUEST,
            "plain error text".to_string(),
            None,
        );

        match err {
            QueryError::Request {
                message,
                is_retryable,
                ..
            } => {
                // Unparseable bodies are passed through verbatim
                assert_eq!(message, "plain error text");
                assert!(!is_retryable);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        let header = HeaderValue::from_static("30");
        assert_eq!(
            parse_retry_after(Some(&header)),
            Some(Duration::from_secs(30))
        );

        let date_header = HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT");
        assert_eq!(parse_retry_after(Some(&date_header)), None);
        assert_eq!(parse_retry_after(None), None);
    }
}
