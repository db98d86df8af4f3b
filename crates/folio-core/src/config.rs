//! Application configuration model.
//!
//! The API credential is not configuration; it lives in the key-value store.

use serde::{Deserialize, Serialize};

/// Model used when the configuration does not name one.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Root of `config.toml`.
///
/// Every field is optional in the file; missing sections fall back to
/// defaults so a missing or empty file is always valid.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub gemini: GeminiSettings,
}

/// Settings for the Gemini query client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiSettings {
    /// Model identifier sent to the generateContent endpoint
    pub model: String,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_GEMINI_MODEL.to_string(),
        }
    }
}
