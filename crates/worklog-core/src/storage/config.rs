//! TOML-based application configuration.
//!
//! Holds the CRM connection settings (portal base URL and OAuth client
//! credentials). Tokens themselves live in the OS keyring, not here.
//!
//! Configuration is stored at `~/.config/worklog/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::error::ConfigError;

/// CRM connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmConfig {
    /// Portal base URL, e.g. `https://example.bitrix24.com`.
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
        }
    }
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/worklog/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crm: CrmConfig,
}

impl Config {
    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::DataDir(e.to_string()))?;
        Ok(dir.join("config.toml"))
    }

    /// Load from disk, writing and returning the default on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or
    /// parsed, or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::Read { path, source: e }),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        let path = Self::path()?;
        std::fs::write(&path, content).map_err(|e| ConfigError::Write { path, source: e })?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}
