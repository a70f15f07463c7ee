//! # Sync Queue, Metadata and Failure Log
//!
//! Row-level operations behind the mutation queue. The retry budget and
//! backoff come from the caller's `RetryPolicy`; this module only guarantees
//! that each step is a single transaction.
//!
//! ## Tables
//!
//! - `sync_queue`: pending mutations, FIFO by insertion sequence
//! - `sync_metadata`: advisory key/values (`last_sync_time`, ...)
//! - `sync_failures`: mutations dropped after exhausting retries or being
//!   rejected permanently

use crate::local_db::{from_db_time, from_db_time_opt, to_db_time, LocalDatabase};
use crate::offline::RetryPolicy;
use crate::shared::error::{Result, SyncError};
use crate::shared::records::{EntityKind, Operation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

const QUEUE_COLUMNS: &str = "id, operation, entity_kind, record_id, record_version, payload,
    enqueued_at, retry_count, last_error, last_attempt, next_attempt_at";

/// Metadata key of the last completed sync pass
pub const LAST_SYNC_KEY: &str = "last_sync_time";

/// A mutation about to be queued
#[derive(Debug, Clone, PartialEq)]
pub struct NewQueueEntry {
    pub operation: Operation,
    pub entity_kind: EntityKind,
    pub record_id: String,
    /// Record version the payload was taken from
    pub record_version: i64,
    pub payload: serde_json::Value,
}

/// A queued mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Queue bookkeeping id (distinct from the record id)
    pub id: String,
    pub operation: Operation,
    pub entity_kind: EntityKind,
    pub record_id: String,
    pub record_version: i64,
    pub payload: serde_json::Value,
    pub enqueued_at: DateTime<Utc>,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub last_attempt: Option<DateTime<Utc>>,
    /// Backoff gate; automatic passes skip the entry until then
    pub next_attempt_at: Option<DateTime<Utc>>,
}

impl QueueEntry {
    /// Whether the backoff gate allows an attempt at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_attempt_at.map_or(true, |at| at <= now)
    }
}

/// Result of recording a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Entry kept for a later pass
    Retained {
        retry_count: u32,
        next_attempt_at: DateTime<Utc>,
    },
    /// Retry budget spent; entry moved to the failure log
    Abandoned { retry_count: u32 },
}

/// A mutation the engine gave up on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbandonedMutation {
    pub entry_id: String,
    pub operation: Operation,
    pub entity_kind: EntityKind,
    pub record_id: String,
    pub last_error: Option<String>,
    pub retry_count: u32,
    pub enqueued_at: DateTime<Utc>,
    pub abandoned_at: DateTime<Utc>,
}

/// Queue id: millisecond timestamp plus random suffix
fn new_entry_id(now: &DateTime<Utc>) -> String {
    format!("{}-{}", now.timestamp_millis(), Uuid::new_v4().simple())
}

/// Append a queue entry inside an open connection or transaction
pub(crate) async fn insert_queue_entry(
    conn: &mut SqliteConnection,
    entry: &NewQueueEntry,
) -> Result<String> {
    let now = Utc::now();
    let id = new_entry_id(&now);
    let payload = serde_json::to_string(&entry.payload)?;

    sqlx::query(
        "INSERT INTO sync_queue (
            id, operation, entity_kind, record_id, record_version, payload,
            enqueued_at, retry_count
        ) VALUES (?, ?, ?, ?, ?, ?, ?, 0)",
    )
    .bind(&id)
    .bind(entry.operation.as_str())
    .bind(entry.entity_kind.as_str())
    .bind(&entry.record_id)
    .bind(entry.record_version)
    .bind(payload)
    .bind(to_db_time(&now))
    .execute(&mut *conn)
    .await?;

    Ok(id)
}

/// Move an entry into the failure log and delete it from the queue
async fn abandon_in(
    conn: &mut SqliteConnection,
    entry_id: &str,
    error: Option<&str>,
    retry_count: u32,
) -> Result<()> {
    let now = to_db_time(&Utc::now());

    sqlx::query(
        "INSERT OR REPLACE INTO sync_failures (
            entry_id, operation, entity_kind, record_id, last_error,
            retry_count, enqueued_at, abandoned_at
        )
        SELECT id, operation, entity_kind, record_id, ?, ?, enqueued_at, ?
        FROM sync_queue WHERE id = ?",
    )
    .bind(error)
    .bind(retry_count as i64)
    .bind(&now)
    .bind(entry_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM sync_queue WHERE id = ?")
        .bind(entry_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

impl LocalDatabase {
    /// Add a mutation to the queue on its own
    pub async fn add_to_sync_queue(&self, entry: &NewQueueEntry) -> Result<String> {
        let mut conn = self.pool.acquire().await?;
        insert_queue_entry(&mut *conn, entry).await
    }

    /// All queued mutations in enqueue order
    pub async fn queue_entries(&self) -> Result<Vec<QueueEntry>> {
        let sql = format!("SELECT {} FROM sync_queue ORDER BY seq ASC", QUEUE_COLUMNS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            match row_to_entry(&row) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    // A row that cannot be decoded would block the queue forever
                    let id: String = row.try_get("id")?;
                    tracing::error!(entry_id = %id, error = %e, "Dropping undecodable queue entry");
                    self.abandon_queue_entry(&id, &e.to_string(), 0).await?;
                }
            }
        }

        Ok(entries)
    }

    /// A single queue entry
    pub async fn queue_entry(&self, entry_id: &str) -> Result<Option<QueueEntry>> {
        let sql = format!("SELECT {} FROM sync_queue WHERE id = ?", QUEUE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(entry_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| row_to_entry(&row)).transpose()
    }

    /// Remove a queue entry; returns whether it existed
    pub async fn remove_queue_entry(&self, entry_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sync_queue WHERE id = ?")
            .bind(entry_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a remote success: drop the entry and clean the record
    ///
    /// `is_dirty` is cleared only if the record is still at the version the
    /// entry was taken from; a newer local edit keeps it dirty. A confirmed
    /// delete purges the tombstone.
    pub async fn complete_queue_entry(&self, entry: &QueueEntry) -> Result<()> {
        let table = entry.entity_kind.collection();
        let mut tx = self.begin_write().await?;

        sqlx::query("DELETE FROM sync_queue WHERE id = ?")
            .bind(&entry.id)
            .execute(&mut *tx)
            .await?;

        match entry.operation {
            Operation::Delete => {
                sqlx::query(&format!(
                    "DELETE FROM {} WHERE id = ? AND deleted = 1 AND version = ?",
                    table
                ))
                .bind(&entry.record_id)
                .bind(entry.record_version)
                .execute(&mut *tx)
                .await?;
            }
            Operation::Create | Operation::Update => {
                sqlx::query(&format!(
                    "UPDATE {} SET
                        synced_at = ?,
                        is_dirty = CASE WHEN version = ? THEN 0 ELSE is_dirty END
                     WHERE id = ?",
                    table
                ))
                .bind(to_db_time(&Utc::now()))
                .bind(entry.record_version)
                .bind(&entry.record_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// Count a failed attempt, abandoning the entry once `policy` is exhausted
    ///
    /// A retained entry is gated until `policy.delay_for(retry_count)` from now.
    pub async fn record_queue_failure(
        &self,
        entry_id: &str,
        error: &str,
        policy: &RetryPolicy,
    ) -> Result<FailureOutcome> {
        let mut tx = self.begin_write().await?;

        let row: Option<(i64,)> = sqlx::query_as("SELECT retry_count FROM sync_queue WHERE id = ?")
            .bind(entry_id)
            .fetch_optional(&mut *tx)
            .await?;
        let retry_count = match row {
            Some((count,)) => count as u32 + 1,
            None => {
                return Err(SyncError::NotFound {
                    collection: "sync_queue",
                    id: entry_id.to_string(),
                })
            }
        };

        let outcome = if policy.is_exhausted(retry_count) {
            abandon_in(&mut *tx, entry_id, Some(error), retry_count).await?;
            FailureOutcome::Abandoned { retry_count }
        } else {
            let now = Utc::now();
            let delay = chrono::Duration::from_std(policy.delay_for(retry_count))
                .unwrap_or_else(|_| chrono::Duration::seconds(0));
            let next_attempt_at = now + delay;

            sqlx::query(
                "UPDATE sync_queue SET
                    retry_count = ?,
                    last_error = ?,
                    last_attempt = ?,
                    next_attempt_at = ?
                 WHERE id = ?",
            )
            .bind(retry_count as i64)
            .bind(error)
            .bind(to_db_time(&now))
            .bind(to_db_time(&next_attempt_at))
            .bind(entry_id)
            .execute(&mut *tx)
            .await?;

            FailureOutcome::Retained {
                retry_count,
                next_attempt_at,
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    /// Drop an entry without spending more retries
    pub async fn abandon_queue_entry(&self, entry_id: &str, error: &str, retry_count: u32) -> Result<()> {
        let mut tx = self.begin_write().await?;
        abandon_in(&mut *tx, entry_id, Some(error), retry_count).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Number of queued mutations
    pub async fn queue_len(&self) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sync_queue")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    /// Whether any queued mutation targets the record
    pub async fn queue_references(&self, kind: EntityKind, record_id: &str) -> Result<bool> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sync_queue WHERE entity_kind = ? AND record_id = ?",
        )
        .bind(kind.as_str())
        .bind(record_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Most recent abandoned mutations, newest first
    pub async fn abandoned_mutations(&self, limit: u32) -> Result<Vec<AbandonedMutation>> {
        let rows = sqlx::query(
            "SELECT entry_id, operation, entity_kind, record_id, last_error,
                    retry_count, enqueued_at, abandoned_at
             FROM sync_failures
             ORDER BY abandoned_at DESC
             LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_abandoned).collect()
    }

    /// Rows in the abandoned-mutation log
    pub async fn count_abandoned(&self) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sync_failures")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    /// Forget abandoned mutations older than `cutoff`
    pub async fn prune_abandoned(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sync_failures WHERE abandoned_at < ?")
            .bind(to_db_time(&cutoff))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Set sync metadata
    pub async fn set_sync_metadata(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO sync_metadata (key, value, updated_at)
             VALUES (?, ?, ?)",
        )
        .bind(key)
        .bind(value)
        .bind(to_db_time(&Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get sync metadata
    pub async fn get_sync_metadata(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM sync_metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("value")?)),
            None => Ok(None),
        }
    }

    /// Get last sync timestamp
    pub async fn get_last_sync_time(&self) -> Result<Option<DateTime<Utc>>> {
        from_db_time_opt(self.get_sync_metadata(LAST_SYNC_KEY).await?)
    }

    /// Set last sync timestamp
    pub async fn set_last_sync_time(&self, at: DateTime<Utc>) -> Result<()> {
        self.set_sync_metadata(LAST_SYNC_KEY, &to_db_time(&at)).await
    }
}

fn parse_operation(value: &str) -> Result<Operation> {
    Operation::parse(value)
        .ok_or_else(|| SyncError::serialization(format!("unknown operation '{}'", value)))
}

fn parse_kind(value: &str) -> Result<EntityKind> {
    EntityKind::parse(value)
        .ok_or_else(|| SyncError::serialization(format!("unknown entity kind '{}'", value)))
}

fn row_to_entry(row: &SqliteRow) -> Result<QueueEntry> {
    let payload: String = row.try_get("payload")?;
    let retry_count: i64 = row.try_get("retry_count")?;

    Ok(QueueEntry {
        id: row.try_get("id")?,
        operation: parse_operation(&row.try_get::<String, _>("operation")?)?,
        entity_kind: parse_kind(&row.try_get::<String, _>("entity_kind")?)?,
        record_id: row.try_get("record_id")?,
        record_version: row.try_get("record_version")?,
        payload: serde_json::from_str(&payload)?,
        enqueued_at: from_db_time(&row.try_get::<String, _>("enqueued_at")?)?,
        retry_count: retry_count.max(0) as u32,
        last_error: row.try_get("last_error")?,
        last_attempt: from_db_time_opt(row.try_get("last_attempt")?)?,
        next_attempt_at: from_db_time_opt(row.try_get("next_attempt_at")?)?,
    })
}

fn row_to_abandoned(row: &SqliteRow) -> Result<AbandonedMutation> {
    let retry_count: i64 = row.try_get("retry_count")?;

    Ok(AbandonedMutation {
        entry_id: row.try_get("entry_id")?,
        operation: parse_operation(&row.try_get::<String, _>("operation")?)?,
        entity_kind: parse_kind(&row.try_get::<String, _>("entity_kind")?)?,
        record_id: row.try_get("record_id")?,
        last_error: row.try_get("last_error")?,
        retry_count: retry_count.max(0) as u32,
        enqueued_at: from_db_time(&row.try_get::<String, _>("enqueued_at")?)?,
        abandoned_at: from_db_time(&row.try_get::<String, _>("abandoned_at")?)?,
    })
}
