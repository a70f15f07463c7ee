//! Domain records
//!
//! The three synchronized entity kinds (scenarios, practice sessions and
//! progress) and the plumbing the local store needs to persist them
//! generically: the [`Record`] trait, indexed fields, filters and the
//! [`Tracked`] wrapper carrying the sync control fields.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Entity kinds that are synchronized with the remote API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Scenario,
    Session,
    Progress,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Scenario, EntityKind::Session, EntityKind::Progress];

    /// Collection (table) name backing this kind
    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Scenario => "scenarios",
            EntityKind::Session => "sessions",
            EntityKind::Progress => "progress",
        }
    }

    /// Name used in the queue table
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Scenario => "scenario",
            EntityKind::Session => "session",
            EntityKind::Progress => "progress",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "scenario" => Some(EntityKind::Scenario),
            "session" => Some(EntityKind::Session),
            "progress" => Some(EntityKind::Progress),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutation kinds carried by queue entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "create" => Some(Operation::Create),
            "update" => Some(Operation::Update),
            "delete" => Some(Operation::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Columns the local store indexes for filtering and retention scans
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexFields {
    pub category: Option<String>,
    pub difficulty: Option<String>,
    pub scenario_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

/// A record that can live in one of the synchronized collections
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + Unpin + 'static {
    /// Collection this record belongs to
    const KIND: EntityKind;

    /// Client-assigned stable identifier
    fn id(&self) -> &str;

    /// Values for the indexed columns
    fn index_fields(&self) -> IndexFields {
        IndexFields::default()
    }
}

/// A stored record together with its sync control fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracked<T> {
    pub record: T,
    /// Local state has changes not yet confirmed by the remote
    pub is_dirty: bool,
    /// Last successful sync of this record
    pub synced_at: Option<DateTime<Utc>>,
    /// Bumped on every local save
    pub version: i64,
}

impl<T: Record> Tracked<T> {
    pub fn id(&self) -> &str {
        self.record.id()
    }
}

/// Equality and date-range filter for `get_all`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub category: Option<String>,
    pub difficulty: Option<String>,
    pub scenario_id: Option<String>,
    /// Inclusive lower bound on `started_at`
    pub started_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `started_at`
    pub started_before: Option<DateTime<Utc>>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = Some(difficulty.as_str().to_string());
        self
    }

    pub fn scenario_id(mut self, scenario_id: impl Into<String>) -> Self {
        self.scenario_id = Some(scenario_id.into());
        self
    }

    pub fn started_between(mut self, from: DateTime<Utc>, before: DateTime<Utc>) -> Self {
        self.started_from = Some(from);
        self.started_before = Some(before);
        self
    }

    pub fn started_before(mut self, before: DateTime<Utc>) -> Self {
        self.started_before = Some(before);
        self
    }
}

/// Scenario difficulty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::Beginner
    }
}

/// A practice scenario (e.g. a mock interview script)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub category: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Scenario {
    /// New scenario with a client-generated id
    pub fn new(title: impl Into<String>, category: impl Into<String>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), title, category)
    }

    pub fn with_id(id: impl Into<String>, title: impl Into<String>, category: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            category: category.into(),
            difficulty: Difficulty::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for Scenario {
    const KIND: EntityKind = EntityKind::Scenario;

    fn id(&self) -> &str {
        &self.id
    }

    fn index_fields(&self) -> IndexFields {
        IndexFields {
            category: Some(self.category.clone()),
            difficulty: Some(self.difficulty.as_str().to_string()),
            ..IndexFields::default()
        }
    }
}

/// One practice run of a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub scenario_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_secs: u64,
    #[serde(default)]
    pub score: Option<f32>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Session {
    pub fn new(scenario_id: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), scenario_id, started_at)
    }

    pub fn with_id(id: impl Into<String>, scenario_id: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            scenario_id: scenario_id.into(),
            started_at,
            ended_at: None,
            duration_secs: 0,
            score: None,
            notes: None,
        }
    }

    /// Close the session and record its score
    pub fn finish(&mut self, ended_at: DateTime<Utc>, score: Option<f32>) {
        self.duration_secs = (ended_at - self.started_at).num_seconds().max(0) as u64;
        self.ended_at = Some(ended_at);
        self.score = score;
    }
}

impl Record for Session {
    const KIND: EntityKind = EntityKind::Session;

    fn id(&self) -> &str {
        &self.id
    }

    fn index_fields(&self) -> IndexFields {
        IndexFields {
            scenario_id: Some(self.scenario_id.clone()),
            started_at: Some(self.started_at),
            ..IndexFields::default()
        }
    }
}

/// Aggregated progress on a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub id: String,
    pub scenario_id: String,
    #[serde(default)]
    pub sessions_completed: u32,
    /// Completed sessions that carried a score; the average is over these
    #[serde(default)]
    pub scored_sessions: u32,
    #[serde(default)]
    pub best_score: Option<f32>,
    #[serde(default)]
    pub average_score: Option<f32>,
    #[serde(default)]
    pub last_practiced_at: Option<DateTime<Utc>>,
}

impl Progress {
    /// Empty progress for a scenario; one progress record per scenario
    pub fn for_scenario(scenario_id: impl Into<String>) -> Self {
        let scenario_id = scenario_id.into();
        Self {
            id: format!("progress-{}", scenario_id),
            scenario_id,
            sessions_completed: 0,
            scored_sessions: 0,
            best_score: None,
            average_score: None,
            last_practiced_at: None,
        }
    }

    /// Fold a finished session into the aggregate
    pub fn record_session(&mut self, session: &Session) {
        self.sessions_completed = self.sessions_completed.saturating_add(1);
        if let Some(score) = session.score {
            let previous = self.scored_sessions;
            self.scored_sessions = previous.saturating_add(1);
            self.best_score = Some(self.best_score.map_or(score, |best| best.max(score)));
            let total = self.average_score.unwrap_or(0.0) * previous as f32 + score;
            self.average_score = Some(total / self.scored_sessions as f32);
        }
        let practiced = session.ended_at.unwrap_or(session.started_at);
        self.last_practiced_at = Some(
            self.last_practiced_at
                .map_or(practiced, |last| last.max(practiced)),
        );
    }
}

impl Record for Progress {
    const KIND: EntityKind = EntityKind::Progress;

    fn id(&self) -> &str {
        &self.id
    }

    fn index_fields(&self) -> IndexFields {
        IndexFields {
            scenario_id: Some(self.scenario_id.clone()),
            ..IndexFields::default()
        }
    }
}
