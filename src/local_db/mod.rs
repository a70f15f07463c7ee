//! # Local Database Module
//!
//! This module provides the durable local store the sync engine is built on.
//! Every write a user makes lands here first, inside a transaction, so nothing
//! is lost when the process stops while offline.
//!
//! ## Architecture
//!
//! - **Record collections**: `scenarios`, `sessions`, `progress`, one table each,
//!   holding a JSON snapshot plus indexed columns and sync control fields
//! - **Sync queue**: `sync_queue`, the FIFO list of pending mutations
//! - **Sync metadata**: `sync_metadata`, advisory key/values such as the last
//!   completed sync time
//! - **Failure log**: `sync_failures`, mutations the engine gave up on
//!
//! ## Key Components
//!
//! - `LocalDatabase`: connection pool, schema management and statistics
//! - `schema.rs`: versioned migrations
//! - `records.rs`: generic put/get/get_all/delete/count and queue-aware saves
//! - `scenarios.rs`, `sessions.rs`, `progress.rs`: entity helpers
//! - `sync.rs`: queue rows, sync metadata and the failure log
//!
//! ## Usage
//!
//! ```rust,no_run
//! use practice_sync::local_db::LocalDatabase;
//! use practice_sync::shared::Scenario;
//!
//! # async fn example() -> practice_sync::shared::Result<()> {
//! let db = LocalDatabase::open_default().await?;
//! let scenario = Scenario::with_id("s1", "Interview A", "interview");
//! db.save_scenario(&scenario).await?;
//! let stored = db.get_scenario("s1").await?;
//! assert!(stored.map(|s| s.is_dirty).unwrap_or(false));
//! # Ok(())
//! # }
//! ```

pub mod schema;
pub mod records;
pub mod scenarios;
pub mod sessions;
pub mod progress;
pub mod sync;

pub use records::SaveOutcome;
pub use sessions::PurgeStats;
pub use sync::{AbandonedMutation, FailureOutcome, NewQueueEntry, QueueEntry};

use crate::shared::error::{Result, SyncError};
use crate::shared::records::EntityKind;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Local database connection manager
///
/// Owns the SQLite pool. Cloning is cheap and shares the pool.
#[derive(Debug, Clone)]
pub struct LocalDatabase {
    pool: SqlitePool,
}

impl LocalDatabase {
    /// Open or create the database at `path`
    ///
    /// Creates parent directories and the file if needed, then brings the
    /// schema up to date. Any failure is reported as `StorageUnavailable`;
    /// there is no in-memory fallback.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(std::time::Duration::from_secs(5))
            .pragma("cache_size", "1000")
            .pragma("temp_store", "MEMORY");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| SyncError::storage(format!("failed to open {}: {}", path.display(), e)))?;

        let db = Self { pool };
        db.init_schema().await?;

        tracing::info!(path = %path.display(), "Local database opened");
        Ok(db)
    }

    /// Open the database at the platform data directory
    pub async fn open_default() -> Result<Self> {
        Self::open(Self::default_path()).await
    }

    /// Private in-memory database
    ///
    /// Backed by a single long-lived connection so the data outlives
    /// individual queries.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    /// Platform-specific path of the database file
    ///
    /// Uses the system's data directory when available.
    pub fn default_path() -> PathBuf {
        let mut path = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
        path.push("practice-sync");
        path.push("local.db");
        path
    }

    /// Initialize database schema
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        self.run_migrations().await
    }

    /// Apply every migration newer than the recorded schema version
    async fn run_migrations(&self) -> Result<()> {
        let current = self.schema_version().await?;
        if !schema::needs_migration(current) {
            return Ok(());
        }

        for (version, sql) in schema::get_pending_migrations(current) {
            let mut tx = self.begin_write().await?;
            sqlx::raw_sql(sql).execute(&mut *tx).await?;
            sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)")
                .bind(version)
                .bind(to_db_time(&Utc::now()))
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            tracing::debug!(version, "Applied local schema migration");
        }

        Ok(())
    }

    /// Highest applied migration, 0 for a fresh database
    pub async fn schema_version(&self) -> Result<i32> {
        let (version,): (i32,) =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_one(&self.pool)
                .await?;
        Ok(version)
    }

    /// Open a write transaction holding the database write lock from the start
    ///
    /// A deferred transaction that reads before writing fails with
    /// SQLITE_BUSY, without waiting, when another connection commits in
    /// between. `BEGIN IMMEDIATE` waits on the busy timeout instead.
    pub(crate) async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    /// Get connection pool reference
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the pool; later operations fail with `StorageUnavailable`
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Get database statistics
    pub async fn get_stats(&self) -> Result<DatabaseStats> {
        Ok(DatabaseStats {
            scenario_count: self.count(EntityKind::Scenario).await?,
            session_count: self.count(EntityKind::Session).await?,
            progress_count: self.count(EntityKind::Progress).await?,
            pending_operations: self.queue_len().await?,
            abandoned_operations: self.count_abandoned().await?,
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Live (not tombstoned) scenarios
    pub scenario_count: u64,
    /// Live practice sessions
    pub session_count: u64,
    /// Live progress records
    pub progress_count: u64,
    /// Entries in the sync queue
    pub pending_operations: u64,
    /// Rows in the abandoned-mutation log
    pub abandoned_operations: u64,
}

/// Fixed-width UTC timestamp so stored values sort lexically
pub(crate) fn to_db_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn from_db_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| SyncError::serialization(format!("bad timestamp '{}': {}", value, e)))
}

pub(crate) fn from_db_time_opt(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.as_deref().map(from_db_time).transpose()
}
