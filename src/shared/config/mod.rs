//! Sync engine configuration
//!
//! Provides the tunables of the synchronization engine: retry budget,
//! backoff curve, retention window and background scheduling.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default number of failed attempts before a mutation is abandoned
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default retention window for practice sessions, in days
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Sync engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Failed attempts after which a queue entry is dropped
    pub max_retries: u32,
    /// Sessions older than this are purged by retention cleanup
    pub retention_days: u32,
    /// First backoff interval in seconds
    pub backoff_base_secs: u64,
    /// Upper bound for a single backoff interval in seconds
    pub backoff_max_secs: u64,
    /// Jitter factor (0.0 to 1.0) added on top of the backoff interval
    pub backoff_jitter: f64,
    /// Periodic sync interval; `None` disables the periodic trigger
    pub sync_interval_seconds: Option<u64>,
    /// Timeout applied to each remote call
    pub request_timeout_secs: u64,
    /// Run retention cleanup after every completed pass
    pub cleanup_after_sync: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retention_days: DEFAULT_RETENTION_DAYS,
            backoff_base_secs: 1,
            backoff_max_secs: 300,
            backoff_jitter: 0.1,
            sync_interval_seconds: None,
            request_timeout_secs: 30,
            cleanup_after_sync: true,
        }
    }
}

impl SyncConfig {
    /// Create a new SyncConfigBuilder
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: SyncConfig =
            toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::OutOfRange {
                field: "max_retries",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.retention_days == 0 {
            return Err(ConfigError::OutOfRange {
                field: "retention_days",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.backoff_jitter) {
            return Err(ConfigError::OutOfRange {
                field: "backoff_jitter",
                reason: format!("{} is not within [0, 1]", self.backoff_jitter),
            });
        }
        if self.backoff_base_secs > self.backoff_max_secs {
            return Err(ConfigError::OutOfRange {
                field: "backoff_base_secs",
                reason: "must not exceed backoff_max_secs".to_string(),
            });
        }
        if self.sync_interval_seconds == Some(0) {
            return Err(ConfigError::OutOfRange {
                field: "sync_interval_seconds",
                reason: "must be positive when set".to_string(),
            });
        }
        Ok(())
    }

    /// Retention window as a chrono duration
    pub fn retention_window(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days as i64)
    }

    /// Per-request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Builder for SyncConfig
#[derive(Debug, Default)]
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    /// Set the retry budget
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Set the retention window in days
    pub fn retention_days(mut self, days: u32) -> Self {
        self.config.retention_days = days;
        self
    }

    /// Set the backoff curve
    pub fn backoff(mut self, base_secs: u64, max_secs: u64, jitter: f64) -> Self {
        self.config.backoff_base_secs = base_secs;
        self.config.backoff_max_secs = max_secs;
        self.config.backoff_jitter = jitter;
        self
    }

    /// Enable the periodic sync trigger
    pub fn sync_interval_seconds(mut self, seconds: u64) -> Self {
        self.config.sync_interval_seconds = Some(seconds);
        self
    }

    /// Set the per-request timeout
    pub fn request_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.request_timeout_secs = seconds;
        self
    }

    /// Toggle cleanup after each pass
    pub fn cleanup_after_sync(mut self, enabled: bool) -> Self {
        self.config.cleanup_after_sync = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<SyncConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("value out of range for {field}: {reason}")]
    OutOfRange { field: &'static str, reason: String },
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ConfigError> for crate::shared::error::SyncError {
    fn from(err: ConfigError) -> Self {
        Self::config(err.to_string())
    }
}
