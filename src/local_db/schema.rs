//! Database Schema Definitions
//!
//! Versioned migrations for the local database. Version 1 creates the record
//! collections, the queue and the metadata table; version 2 adds the
//! abandoned-mutation log.

/// Current database schema version
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Migration 1: collections, sync queue, sync metadata
const MIGRATION_1: &str = include_str!("schema.sql");

/// Migration 2: log of mutations dropped by the sync engine
const MIGRATION_2: &str = "
CREATE TABLE IF NOT EXISTS sync_failures (
    entry_id TEXT PRIMARY KEY NOT NULL,
    operation TEXT NOT NULL,
    entity_kind TEXT NOT NULL,
    record_id TEXT NOT NULL,
    last_error TEXT,
    retry_count INTEGER NOT NULL,
    enqueued_at TEXT NOT NULL,
    abandoned_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sync_failures_abandoned_at ON sync_failures(abandoned_at);
";

/// Schema migrations, in application order
pub const MIGRATIONS: &[(i32, &str)] = &[(1, MIGRATION_1), (2, MIGRATION_2)];

/// Check if database needs migration
pub fn needs_migration(current_version: i32) -> bool {
    current_version < CURRENT_SCHEMA_VERSION
}

/// Get pending migrations
pub fn get_pending_migrations(current_version: i32) -> Vec<(i32, &'static str)> {
    MIGRATIONS
        .iter()
        .filter(|(version, _)| *version > current_version)
        .cloned()
        .collect()
}
