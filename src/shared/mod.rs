//! Shared Module
//!
//! Types used by every layer of the engine: the domain records, the error
//! taxonomy and the engine configuration. Nothing in here touches storage or
//! the network.

/// Domain records and the generic record plumbing
pub mod records;

/// Sync error types
pub mod error;

/// Engine configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use records::{
    Difficulty, EntityKind, IndexFields, Operation, Progress, Record, RecordFilter, Scenario,
    Session, Tracked,
};
pub use error::{Result, SyncError};
pub use config::{ConfigError, SyncConfig, SyncConfigBuilder};
