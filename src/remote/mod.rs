//! # Remote API
//!
//! The seam between the sync engine and the server. The engine only needs
//! to apply one mutation at a time and to know whether a failure is worth
//! retrying.
//!
//! - `RemoteApi`: the trait the engine drives
//! - `RemoteError`: transient vs permanent failure
//! - `http.rs`: reqwest implementation against the REST API

pub mod http;

pub use http::HttpRemoteApi;

use crate::shared::error::SyncError;
use crate::shared::records::{EntityKind, Operation};
use async_trait::async_trait;
use thiserror::Error;

/// Failure of a single remote call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Network trouble or server-side fault; retry later
    #[error("transient remote failure: {0}")]
    Transient(String),
    /// The server rejected the mutation; retrying cannot help
    #[error("remote rejected mutation: {0}")]
    Permanent(String),
}

impl RemoteError {
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Transient(_))
    }

    pub fn message(&self) -> &str {
        match self {
            RemoteError::Transient(message) | RemoteError::Permanent(message) => message,
        }
    }
}

impl From<RemoteError> for SyncError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Transient(message) => SyncError::transient(message),
            RemoteError::Permanent(message) => SyncError::permanent(message),
        }
    }
}

/// Applies queued mutations to the remote system
///
/// Implementations must be idempotent per call from the engine's point of
/// view: the engine may re-send a mutation whose success response was lost.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn apply(
        &self,
        entity_kind: EntityKind,
        operation: Operation,
        payload: &serde_json::Value,
    ) -> Result<(), RemoteError>;
}
