//! Document text extraction.
//!
//! Turns base64-encoded PDF bytes into plain per-page text, delivered once
//! per load. No partial or streaming updates.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use thiserror::Error;

/// Errors that can occur during document text extraction.
///
/// Unlike storage failures these are surfaced to the user: a failed
/// extraction leaves no document loaded.
#[derive(Error, Debug, Clone)]
pub enum ExtractError {
    /// The input was not valid base64
    #[error("invalid base64 document data: {0}")]
    InvalidBase64(String),

    /// The bytes could not be parsed as a PDF
    #[error("failed to extract text: {0}")]
    Parse(String),
}

/// Result of one extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    /// Concatenated per-page text with `[Page N]` marker lines
    pub text: String,
    pub page_count: usize,
}

/// Extracts plain text from a document given its base64-encoded bytes.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, base64_data: &str) -> Result<ExtractedText, ExtractError>;
}

/// [`TextExtractor`] for PDF bytes.
pub struct PdfTextExtractor;

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract(&self, base64_data: &str) -> Result<ExtractedText, ExtractError> {
        let bytes = BASE64_STANDARD
            .decode(base64_data)
            .map_err(|e| ExtractError::InvalidBase64(e.to_string()))?;

        // PDF parsing is CPU-bound; keep it off the async runtime
        let pages = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem_by_pages(&bytes)
        })
        .await
        .map_err(|e| ExtractError::Parse(format!("extraction task failed: {}", e)))?
        .map_err(|e| ExtractError::Parse(e.to_string()))?;

        tracing::debug!("[PdfTextExtractor] Extracted {} page(s)", pages.len());

        Ok(ExtractedText {
            text: format_pages(&pages),
            page_count: pages.len(),
        })
    }
}

/// Renders pages as `[Page N]` marked blocks, in page order, 1-based.
///
/// Marker lines are emitted even for pages without text, so any document
/// with at least one page yields non-empty output.
fn format_pages(pages: &[String]) -> String {
    let mut text = String::new();
    for (index, page) in pages.iter().enumerate() {
        text.push_str(&format!("[Page {}]\n{}\n\n", index + 1, page.trim()));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_pages() {
        let pages = vec!["First page text.\n".to_string(), "Second page.".to_string()];

        assert_eq!(
            format_pages(&pages),
            "[Page 1]\nFirst page text.\n\n[Page 2]\nSecond page.\n\n"
        );
    }

    #[test]
    fn test_format_pages_empty_document() {
        assert_eq!(format_pages(&[]), "");
    }

    #[tokio::test]
    async fn test_invalid_base64_is_rejected() {
        let extractor = PdfTextExtractor;

        let err = extractor.extract("not base64 !!!").await.unwrap_err();
        assert!(matches!(err, ExtractError::InvalidBase64(_)));
    }

    #[tokio::test]
    async fn test_non_pdf_bytes_fail_to_parse() {
        let extractor = PdfTextExtractor;
        let not_a_pdf = BASE64_STANDARD.encode(b"plain text, no pdf header");

        let err = extractor.extract(&not_a_pdf).await.unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
    }
}
