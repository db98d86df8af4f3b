//! Unified path management for folio files.
//!
//! All folio configuration, stored values, and logs live under one
//! platform-specific config directory so every storage mechanism agrees on
//! where things are.

use std::path::PathBuf;

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Platform config directory could not be determined.
    ConfigDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::ConfigDirNotFound => write!(f, "Cannot find config directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Unified path management for folio.
///
/// # Directory Structure
///
/// ```text
/// ~/.config/folio/             # Config directory
/// ├── config.toml              # Application configuration
/// ├── storage/                 # Key-value entries (one file per key)
/// │   ├── gemini_api_key
/// │   └── pdf_chat_conversations
/// └── logs/                    # Application logs
///     └── folio.log
/// ```
pub struct FolioPaths;

impl FolioPaths {
    /// Returns the folio configuration directory.
    ///
    /// # Returns
    ///
    /// - `Ok(PathBuf)`: Path to config directory (e.g., `~/.config/folio/`)
    /// - `Err(PathError::ConfigDirNotFound)`: Could not determine directory
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join("folio"))
            .ok_or(PathError::ConfigDirNotFound)
    }

    /// Returns the path to the main configuration file.
    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Returns the directory holding persisted key-value entries.
    ///
    /// # Security Note
    ///
    /// The API credential is stored here; entry files are created with 600
    /// permissions on Unix.
    pub fn storage_dir() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("storage"))
    }

    /// Returns the path to the logs directory.
    pub fn logs_dir() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("logs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir() {
        let config_dir = FolioPaths::config_dir().unwrap();
        assert!(config_dir.ends_with("folio"));
    }

    #[test]
    fn test_config_file() {
        let config_file = FolioPaths::config_file().unwrap();
        assert!(config_file.ends_with("config.toml"));
        // Verify it's under config_dir
        let config_dir = FolioPaths::config_dir().unwrap();
        assert!(config_file.starts_with(&config_dir));
    }

    #[test]
    fn test_storage_dir() {
        let storage_dir = FolioPaths::storage_dir().unwrap();
        assert!(storage_dir.ends_with("storage"));
        // Verify it's under config_dir
        let config_dir = FolioPaths::config_dir().unwrap();
        assert!(storage_dir.starts_with(&config_dir));
    }

    #[test]
    fn test_logs_dir() {
        let logs_dir = FolioPaths::logs_dir().unwrap();
        assert!(logs_dir.ends_with("logs"));
        // Verify it's under config_dir
        let config_dir = FolioPaths::config_dir().unwrap();
        assert!(logs_dir.starts_with(&config_dir));
    }
}
