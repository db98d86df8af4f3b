//! Configuration service implementation.
//!
//! This module provides a ConfigService that loads the application
//! configuration from the configuration file (~/.config/folio/config.toml).

use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};

use folio_core::config::AppConfig;
use folio_core::error::{FolioError, Result};

use crate::paths::FolioPaths;

/// Configuration service that loads and caches the application configuration.
///
/// This implementation reads the configuration from config.toml and caches it
/// to avoid repeated file I/O operations. A missing file is created with
/// defaults; a malformed file degrades to defaults with a warning.
#[derive(Debug, Clone)]
pub struct ConfigService {
    /// Cached configuration loaded from file.
    /// Uses RwLock for thread-safe lazy loading.
    config: Arc<RwLock<Option<AppConfig>>>,
}

impl ConfigService {
    /// Creates a new ConfigService.
    ///
    /// The configuration is loaded lazily on first access to avoid blocking
    /// during initialization.
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Gets the configuration, loading from file if not cached.
    pub fn get_config(&self) -> AppConfig {
        // Check if already cached
        {
            let read_lock = self.config.read().unwrap();
            if let Some(ref cached) = *read_lock {
                return cached.clone();
            }
        }

        let loaded = Self::load_config().unwrap_or_else(|e| {
            tracing::warn!("[ConfigService] Failed to load config: {}; using defaults", e);
            AppConfig::default()
        });

        // Cache it
        {
            let mut write_lock = self.config.write().unwrap();
            *write_lock = Some(loaded.clone());
        }

        loaded
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        let mut write_lock = self.config.write().unwrap();
        *write_lock = None;
    }

    /// Loads AppConfig from the config file, creating it with defaults when
    /// missing.
    fn load_config() -> Result<AppConfig> {
        let config_path = FolioPaths::config_file().map_err(|e| FolioError::config(e.to_string()))?;
        Self::load_from_path(&config_path)
    }

    fn load_from_path(config_path: &Path) -> Result<AppConfig> {
        if !config_path.exists() {
            let default_config = AppConfig::default();
            Self::write_default(config_path, &default_config)?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(config_path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    fn write_default(config_path: &Path, config: &AppConfig) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)?;
        fs::write(config_path, content)?;
        tracing::info!("[ConfigService] Created default config at {:?}", config_path);
        Ok(())
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}
