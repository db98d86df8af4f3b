pub mod extract;
pub mod gemini;
pub mod prompt;

pub use crate::extract::{ExtractError, ExtractedText, PdfTextExtractor, TextExtractor};
pub use crate::gemini::GeminiClient;
