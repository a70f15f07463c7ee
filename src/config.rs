//! Application configuration wrapper
//!
//! Combines the engine tunables with where to find the server, the local
//! database and the bearer token. Values come from the environment; the
//! tunables may also be overridden by a TOML file.

use crate::local_db::LocalDatabase;
use crate::shared::config::{ConfigError, SyncConfig};
use std::path::{Path, PathBuf};

/// Default server URL
const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

pub const ENV_API_URL: &str = "PRACTICE_SYNC_API_URL";
pub const ENV_DB_PATH: &str = "PRACTICE_SYNC_DB";
pub const ENV_TOKEN: &str = "PRACTICE_SYNC_TOKEN";
pub const ENV_CONFIG_FILE: &str = "PRACTICE_SYNC_CONFIG";

#[derive(Debug, Clone)]
pub struct Config {
    server_url: String,
    database_path: PathBuf,
    token: Option<String>,
    sync: SyncConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            database_path: LocalDatabase::default_path(),
            token: None,
            sync: SyncConfig::default(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Read configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            config = config.with_server_url(url)?;
        }
        if let Some(path) = lookup(ENV_DB_PATH).filter(|v| !v.trim().is_empty()) {
            config.database_path = PathBuf::from(path);
        }
        config.token = lookup(ENV_TOKEN).filter(|v| !v.is_empty());
        if let Some(file) = lookup(ENV_CONFIG_FILE).filter(|v| !v.trim().is_empty()) {
            config.sync = Self::load_sync_config(file)?;
        }

        Ok(config)
    }

    /// Parse engine tunables from a TOML file
    pub fn load_sync_config(path: impl AsRef<Path>) -> Result<SyncConfig, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        SyncConfig::from_toml_str(&raw)
    }

    pub fn with_server_url(mut self, url: impl Into<String>) -> Result<Self, ConfigError> {
        let url = url.into();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl(url));
        }
        self.server_url = url.trim_end_matches('/').to_string();
        Ok(self)
    }

    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    pub fn with_sync_config(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }

    /// Set the bearer token
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    /// Get the bearer token
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn sync(&self) -> &SyncConfig {
        &self.sync
    }
}
