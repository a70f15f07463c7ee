//! # Retention Cleanup
//!
//! Bounds local storage: practice sessions older than the retention window
//! are removed, and so are old rows of the abandoned-mutation log. Sessions a
//! queued mutation still references are kept until the entry resolves.

use crate::local_db::LocalDatabase;
use crate::shared::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result of one cleanup run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupStats {
    pub sessions_removed: u64,
    /// Expired sessions kept because of a pending queue entry
    pub sessions_kept_pending: u64,
    pub failures_pruned: u64,
}

#[derive(Debug, Clone)]
pub struct Retention {
    db: Arc<LocalDatabase>,
    window: chrono::Duration,
}

impl Retention {
    pub fn new(db: Arc<LocalDatabase>, window: chrono::Duration) -> Self {
        Self { db, window }
    }

    pub fn window(&self) -> chrono::Duration {
        self.window
    }

    /// Remove everything that expired before now
    pub async fn run(&self) -> Result<CleanupStats> {
        self.run_at(Utc::now()).await
    }

    /// Remove everything that expired relative to `now`
    ///
    /// Running twice with no new data removes nothing the second time.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<CleanupStats> {
        let cutoff = now - self.window;

        let purged = self.db.purge_sessions_before(cutoff).await?;
        let failures_pruned = self.db.prune_abandoned(cutoff).await?;

        let stats = CleanupStats {
            sessions_removed: purged.removed,
            sessions_kept_pending: purged.kept_pending,
            failures_pruned,
        };

        if stats.sessions_removed > 0 || stats.failures_pruned > 0 {
            tracing::info!(
                sessions_removed = stats.sessions_removed,
                sessions_kept_pending = stats.sessions_kept_pending,
                failures_pruned = stats.failures_pruned,
                "Retention cleanup removed expired data"
            );
        } else {
            tracing::debug!(
                sessions_kept_pending = stats.sessions_kept_pending,
                "Retention cleanup found nothing to remove"
            );
        }

        Ok(stats)
    }
}
