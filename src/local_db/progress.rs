//! Local progress operations. One progress record per scenario.

use crate::local_db::records::{save_in, SaveOutcome};
use crate::local_db::LocalDatabase;
use crate::shared::error::Result;
use crate::shared::records::{EntityKind, Progress, RecordFilter, Session, Tracked};

impl LocalDatabase {
    pub async fn save_progress(&self, progress: &Progress) -> Result<SaveOutcome> {
        self.save_record(progress).await
    }

    pub async fn get_progress(&self, id: &str) -> Result<Option<Tracked<Progress>>> {
        self.get(id).await
    }

    pub async fn delete_progress(&self, id: &str) -> Result<()> {
        self.delete_record(EntityKind::Progress, id).await
    }

    /// Progress for a scenario, if any session has been recorded
    pub async fn progress_for_scenario(&self, scenario_id: &str) -> Result<Option<Tracked<Progress>>> {
        let mut found = self
            .get_all::<Progress>(&RecordFilter::new().scenario_id(scenario_id))
            .await?;
        Ok(found.pop())
    }

    /// Fold a finished session into its scenario's progress and save both
    ///
    /// The session save, the progress read-modify-write and both queued
    /// mutations share one write transaction.
    pub async fn complete_session(&self, session: &Session) -> Result<Progress> {
        let mut tx = self.begin_write().await?;

        save_in(&mut *tx, session).await?;

        let current: Option<(String,)> = sqlx::query_as(
            "SELECT data FROM progress
             WHERE scenario_id = ? AND deleted = 0
             ORDER BY updated_at DESC, id DESC
             LIMIT 1",
        )
        .bind(&session.scenario_id)
        .fetch_optional(&mut *tx)
        .await?;

        let mut progress = match current {
            Some((data,)) => serde_json::from_str(&data)?,
            None => Progress::for_scenario(&session.scenario_id),
        };
        progress.record_session(session);

        save_in(&mut *tx, &progress).await?;
        tx.commit().await?;

        tracing::debug!(
            session_id = %session.id,
            scenario_id = %session.scenario_id,
            sessions_completed = progress.sessions_completed,
            "Recorded completed session"
        );
        Ok(progress)
    }
}
