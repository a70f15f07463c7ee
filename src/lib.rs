//! practice-sync - Offline-First Sync Engine
//!
//! Local-first storage and synchronization for practice scenarios, practice
//! sessions and progress records. Every user write lands in a durable local
//! SQLite store together with a queued mutation; the sync engine drains that
//! queue against the remote API whenever the device is online.
//!
//! # Module Structure
//!
//! - **`shared`** - Types used by every layer
//!   - Domain records and the `Record` trait
//!   - Error taxonomy
//!   - Engine configuration
//!
//! - **`local_db`** - Durable local store (SQLite via sqlx)
//!   - Record collections, sync queue, sync metadata, failure log
//!
//! - **`offline`** - Mutation queue and retry policy
//!
//! - **`sync`** - Sync engine
//!   - Connectivity signal, single-pass guard, scheduler
//!   - Retention cleanup and metrics
//!
//! - **`remote`** - Remote API trait and its HTTP implementation
//!
//! - **`config`** - Environment-driven application configuration
//!
//! # Usage
//!
//! ```rust,no_run
//! use practice_sync::local_db::LocalDatabase;
//! use practice_sync::remote::HttpRemoteApi;
//! use practice_sync::shared::{Scenario, SyncConfig};
//! use practice_sync::sync::{ConnectivitySignal, SyncEngine};
//! use std::sync::Arc;
//!
//! # async fn example() -> practice_sync::shared::Result<()> {
//! let db = Arc::new(LocalDatabase::open_default().await?);
//! db.save_scenario(&Scenario::new("Interview A", "interview")).await?;
//!
//! let config = SyncConfig::default();
//! let remote = Arc::new(HttpRemoteApi::new("http://127.0.0.1:3000", None, config.request_timeout())?);
//! let engine = SyncEngine::new(db, remote, ConnectivitySignal::online(), config)?;
//! engine.start().await?;
//! engine.force_sync().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod local_db;
pub mod offline;
pub mod remote;
pub mod shared;
pub mod sync;

pub use config::Config;
pub use local_db::LocalDatabase;
pub use shared::{Result, SyncError};
pub use sync::{ConnectivitySignal, SyncEngine, SyncOutcome, SyncStats};
