//! Sync Error Types
//!
//! This module defines the error taxonomy of the synchronization engine.
//!
//! # Error Categories
//!
//! - `StorageUnavailable` - the local database cannot be opened or written
//! - `SyncTransient` - a remote call failed in a way a retry may fix
//! - `SyncPermanent` - a remote call was rejected and retrying is pointless
//! - `OfflineForceSync` - a forced sync was requested while offline
//! - `Serialization` - a record or payload could not be encoded/decoded
//!
//! # Usage
//!
//! ```rust
//! use practice_sync::shared::error::SyncError;
//!
//! let error = SyncError::storage("disk I/O error");
//! assert!(error.is_storage());
//! ```
//!
//! # Propagation
//!
//! Storage errors always reach the caller of the failing operation. Remote
//! errors raised while draining the queue are recovered by the sync engine and
//! only show up in aggregate through the stats reporter.
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors raised by the local store, the mutation queue and the sync engine
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyncError {
    /// The durable store could not be opened or written
    #[error("Storage unavailable: {message}")]
    StorageUnavailable {
        /// Human-readable error message
        message: String,
    },

    /// A remote call failed but may succeed later (network, 5xx)
    #[error("Transient sync error: {message}")]
    SyncTransient {
        /// Human-readable error message
        message: String,
    },

    /// A remote call was rejected (validation, 4xx)
    #[error("Permanent sync error: {message}")]
    SyncPermanent {
        /// Human-readable error message
        message: String,
    },

    /// `force_sync` was called while the connectivity signal reports offline
    #[error("Cannot force a sync while offline")]
    OfflineForceSync,

    /// JSON serialization or deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Human-readable error message
        message: String,
    },

    /// A record was addressed that does not exist locally
    #[error("Record '{id}' not found in {collection}")]
    NotFound {
        /// Collection name
        collection: &'static str,
        /// Record id
        id: String,
    },

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable error message
        message: String,
    },
}

impl SyncError {
    /// Create a new storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageUnavailable {
            message: message.into(),
        }
    }

    /// Create a new transient remote error
    pub fn transient(message: impl Into<String>) -> Self {
        Self::SyncTransient {
            message: message.into(),
        }
    }

    /// Create a new permanent remote error
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::SyncPermanent {
            message: message.into(),
        }
    }

    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error means local data may not have been saved
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::StorageUnavailable { .. })
    }

    /// Whether a retry could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SyncTransient { .. })
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        Self::storage(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        Self::storage(format!("I/O error: {}", err))
    }
}
