//! # Mutation Queue
//!
//! Durable, ordered list of pending remote writes. Entries are stored in the
//! local database so they survive restarts; this type adds the ordering and
//! retry-budget rules on top of the raw queue rows.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use practice_sync::local_db::LocalDatabase;
//! use practice_sync::offline::{MutationQueue, RetryPolicy};
//! use practice_sync::shared::{EntityKind, Operation};
//! use std::sync::Arc;
//!
//! # async fn example() -> practice_sync::shared::Result<()> {
//! let db = Arc::new(LocalDatabase::open_default().await?);
//! let queue = MutationQueue::new(db, RetryPolicy::default());
//!
//! let payload = serde_json::json!({ "id": "s1", "title": "Interview A" });
//! queue.enqueue(Operation::Create, EntityKind::Scenario, payload).await?;
//!
//! for entry in queue.drain().await? {
//!     // Apply remotely, then...
//!     queue.remove(&entry.id).await?;
//! }
//! # Ok(())
//! # }
//! ```

use crate::local_db::{FailureOutcome, LocalDatabase, NewQueueEntry, QueueEntry};
use crate::offline::retry::RetryPolicy;
use crate::shared::error::{Result, SyncError};
use crate::shared::records::{EntityKind, Operation};
use std::sync::Arc;

/// Mutation queue backed by the local database
#[derive(Debug, Clone)]
pub struct MutationQueue {
    db: Arc<LocalDatabase>,
    policy: RetryPolicy,
}

/// Retry statistics over the current queue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryStats {
    /// Entries with at least one failed attempt
    pub total_retrying: usize,
    /// Failed attempts across all entries
    pub total_attempts: u32,
    /// Highest retry count of any single entry
    pub max_attempts: u32,
}

impl MutationQueue {
    pub fn new(db: Arc<LocalDatabase>, policy: RetryPolicy) -> Self {
        Self { db, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Append a mutation; returns the new entry id
    ///
    /// The payload must carry the record's `id`. The entry remembers the
    /// record's current local version (0 if the record is not stored).
    pub async fn enqueue(
        &self,
        operation: Operation,
        entity_kind: EntityKind,
        payload: serde_json::Value,
    ) -> Result<String> {
        let record_id = payload
            .get("id")
            .and_then(|id| id.as_str())
            .map(str::to_string)
            .ok_or_else(|| SyncError::serialization("mutation payload has no string \"id\""))?;

        let record_version = self
            .db
            .record_version(entity_kind, &record_id)
            .await?
            .unwrap_or(0);

        let entry = NewQueueEntry {
            operation,
            entity_kind,
            record_id,
            record_version,
            payload,
        };
        self.db.add_to_sync_queue(&entry).await
    }

    /// Snapshot of all entries in enqueue order; nothing is removed
    pub async fn drain(&self) -> Result<Vec<QueueEntry>> {
        self.db.queue_entries().await
    }

    pub async fn remove(&self, entry_id: &str) -> Result<bool> {
        self.db.remove_queue_entry(entry_id).await
    }

    /// Remove an entry after the remote applied it and clean its record
    pub async fn complete(&self, entry: &QueueEntry) -> Result<()> {
        self.db.complete_queue_entry(entry).await
    }

    /// Count a failed attempt
    ///
    /// Reaching the retry budget removes the entry and logs it as abandoned
    /// in the same transaction.
    pub async fn mark_failed(&self, entry_id: &str, error: &str) -> Result<FailureOutcome> {
        let outcome = self
            .db
            .record_queue_failure(entry_id, error, &self.policy)
            .await?;

        match &outcome {
            FailureOutcome::Retained {
                retry_count,
                next_attempt_at,
            } => tracing::warn!(
                entry_id = %entry_id,
                retry_count,
                next_attempt_at = %next_attempt_at,
                error = %error,
                "Queued mutation failed, will retry"
            ),
            FailureOutcome::Abandoned { retry_count } => tracing::error!(
                entry_id = %entry_id,
                retry_count,
                error = %error,
                "Queued mutation abandoned after exhausting retries"
            ),
        }

        Ok(outcome)
    }

    /// Drop an entry without spending retries
    pub async fn abandon(&self, entry: &QueueEntry, error: &str) -> Result<()> {
        self.db
            .abandon_queue_entry(&entry.id, error, entry.retry_count)
            .await?;
        tracing::error!(
            entry_id = %entry.id,
            record_id = %entry.record_id,
            error = %error,
            "Queued mutation rejected permanently"
        );
        Ok(())
    }

    pub async fn len(&self) -> Result<u64> {
        self.db.queue_len().await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Whether a pending entry targets the record
    pub async fn references(&self, kind: EntityKind, record_id: &str) -> Result<bool> {
        self.db.queue_references(kind, record_id).await
    }

    /// Get retry statistics
    pub async fn retry_stats(&self) -> Result<RetryStats> {
        let entries = self.drain().await?;
        let mut stats = RetryStats::default();

        for entry in entries.iter().filter(|e| e.retry_count > 0) {
            stats.total_retrying += 1;
            stats.total_attempts += entry.retry_count;
            stats.max_attempts = stats.max_attempts.max(entry.retry_count);
        }

        Ok(stats)
    }
}
