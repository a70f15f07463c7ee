//! # Local Session Operations
//!
//! Typed helpers over the `sessions` collection, including the age-based purge
//! used by retention.

use crate::local_db::records::SaveOutcome;
use crate::local_db::{to_db_time, LocalDatabase};
use crate::shared::error::Result;
use crate::shared::records::{EntityKind, RecordFilter, Session, Tracked};
use chrono::{DateTime, Utc};

/// Result of purging old sessions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeStats {
    /// Sessions physically removed
    pub removed: u64,
    /// Old sessions kept because a queued mutation still references them
    pub kept_pending: u64,
}

impl LocalDatabase {
    pub async fn save_session(&self, session: &Session) -> Result<SaveOutcome> {
        self.save_record(session).await
    }

    pub async fn get_session(&self, id: &str) -> Result<Option<Tracked<Session>>> {
        self.get(id).await
    }

    pub async fn delete_session(&self, id: &str) -> Result<()> {
        self.delete_record(EntityKind::Session, id).await
    }

    /// Sessions of a scenario, oldest first
    pub async fn sessions_for_scenario(&self, scenario_id: &str) -> Result<Vec<Tracked<Session>>> {
        self.get_all(&RecordFilter::new().scenario_id(scenario_id)).await
    }

    /// Sessions with `from <= started_at < before`
    pub async fn sessions_started_between(
        &self,
        from: DateTime<Utc>,
        before: DateTime<Utc>,
    ) -> Result<Vec<Tracked<Session>>> {
        self.get_all(&RecordFilter::new().started_between(from, before)).await
    }

    /// Remove sessions that started before `cutoff`
    ///
    /// Sessions still referenced by the sync queue are left in place. Removal
    /// is local only and never queues a remote delete.
    pub async fn purge_sessions_before(&self, cutoff: DateTime<Utc>) -> Result<PurgeStats> {
        let cutoff = to_db_time(&cutoff);
        let mut tx = self.begin_write().await?;

        let (kept,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sessions s
             WHERE s.started_at < ?
               AND EXISTS (
                   SELECT 1 FROM sync_queue q
                   WHERE q.entity_kind = 'session' AND q.record_id = s.id
               )",
        )
        .bind(&cutoff)
        .fetch_one(&mut *tx)
        .await?;

        let result = sqlx::query(
            "DELETE FROM sessions
             WHERE started_at < ?
               AND NOT EXISTS (
                   SELECT 1 FROM sync_queue q
                   WHERE q.entity_kind = 'session' AND q.record_id = sessions.id
               )",
        )
        .bind(&cutoff)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(PurgeStats {
            removed: result.rows_affected(),
            kept_pending: kept as u64,
        })
    }
}
