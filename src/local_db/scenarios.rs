//! # Local Scenario Operations
//!
//! Typed helpers over the `scenarios` collection. Saves and deletes go through
//! the queue-aware record operations so every change is synced.

use crate::local_db::records::SaveOutcome;
use crate::local_db::LocalDatabase;
use crate::shared::error::Result;
use crate::shared::records::{Difficulty, EntityKind, RecordFilter, Scenario, Tracked};

impl LocalDatabase {
    /// Store a scenario and queue it for sync
    pub async fn save_scenario(&self, scenario: &Scenario) -> Result<SaveOutcome> {
        self.save_record(scenario).await
    }

    /// Get a scenario by id
    pub async fn get_scenario(&self, id: &str) -> Result<Option<Tracked<Scenario>>> {
        self.get(id).await
    }

    /// Delete a scenario and queue the delete
    pub async fn delete_scenario(&self, id: &str) -> Result<()> {
        self.delete_record(EntityKind::Scenario, id).await
    }

    /// Every live scenario
    pub async fn all_scenarios(&self) -> Result<Vec<Tracked<Scenario>>> {
        self.get_all(&RecordFilter::new()).await
    }

    pub async fn scenarios_by_category(&self, category: &str) -> Result<Vec<Tracked<Scenario>>> {
        self.get_all(&RecordFilter::new().category(category)).await
    }

    pub async fn scenarios_by_difficulty(&self, difficulty: Difficulty) -> Result<Vec<Tracked<Scenario>>> {
        self.get_all(&RecordFilter::new().difficulty(difficulty)).await
    }
}
