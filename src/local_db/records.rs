//! # Generic Record Operations
//!
//! Collection-addressed CRUD over the three record tables plus the
//! queue-aware save/delete used by UI actions.
//!
//! `put`/`get`/`get_all`/`delete`/`count` are the raw store primitives.
//! `save_record`/`delete_record` are what user actions call: they change the
//! record and append the matching mutation to the sync queue in one
//! transaction, so a crash can never leave one without the other.

use crate::local_db::sync::{insert_queue_entry, NewQueueEntry};
use crate::local_db::{from_db_time_opt, to_db_time, LocalDatabase};
use crate::shared::error::{Result, SyncError};
use crate::shared::records::{EntityKind, Operation, Record, RecordFilter, Tracked};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};

/// What a local save did to the stored row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Create for a new (or previously deleted) record, Update otherwise
    pub operation: Operation,
    /// Record version after the save
    pub version: i64,
}

impl LocalDatabase {
    /// Upsert a record, marking it dirty and bumping its version
    ///
    /// Does not touch the sync queue; user edits should go through
    /// [`LocalDatabase::save_record`].
    pub async fn put<T: Record>(&self, record: &T) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        let (version, _) = upsert_record(&mut *conn, record).await?;
        Ok(version)
    }

    /// Get a live record by id
    pub async fn get<T: Record>(&self, id: &str) -> Result<Option<Tracked<T>>> {
        let sql = format!(
            "SELECT data, is_dirty, synced_at, version FROM {} WHERE id = ? AND deleted = 0",
            T::KIND.collection()
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_to_tracked(&row)).transpose()
    }

    /// All live records matching `filter`, oldest first
    pub async fn get_all<T: Record>(&self, filter: &RecordFilter) -> Result<Vec<Tracked<T>>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT data, is_dirty, synced_at, version FROM {} WHERE deleted = 0",
            T::KIND.collection()
        ));

        if let Some(category) = &filter.category {
            query.push(" AND category = ").push_bind(category.clone());
        }
        if let Some(difficulty) = &filter.difficulty {
            query.push(" AND difficulty = ").push_bind(difficulty.clone());
        }
        if let Some(scenario_id) = &filter.scenario_id {
            query.push(" AND scenario_id = ").push_bind(scenario_id.clone());
        }
        if let Some(from) = &filter.started_from {
            query.push(" AND started_at >= ").push_bind(to_db_time(from));
        }
        if let Some(before) = &filter.started_before {
            query.push(" AND started_at < ").push_bind(to_db_time(before));
        }
        query.push(" ORDER BY started_at ASC, updated_at ASC, id ASC");

        let rows = query.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_tracked).collect()
    }

    /// Physically remove a record; returns whether a row existed
    ///
    /// Removing an id that is already gone is not an error.
    pub async fn delete(&self, kind: EntityKind, id: &str) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE id = ?", kind.collection());
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Number of live records in a collection
    pub async fn count(&self, kind: EntityKind) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE deleted = 0", kind.collection());
        let (count,): (i64,) = sqlx::query_as(&sql).fetch_one(&self.pool).await?;
        Ok(count as u64)
    }

    /// Save a user edit: upsert dirty + enqueue Create/Update atomically
    pub async fn save_record<T: Record>(&self, record: &T) -> Result<SaveOutcome> {
        let mut tx = self.begin_write().await?;
        let (outcome, entry_id) = save_in(&mut *tx, record).await?;
        tx.commit().await?;

        tracing::debug!(
            kind = %T::KIND,
            record_id = record.id(),
            entry_id = %entry_id,
            version = outcome.version,
            "Saved record and queued {}",
            outcome.operation
        );

        Ok(outcome)
    }

    /// Delete a user record: tombstone + enqueue Delete atomically
    ///
    /// The row disappears from reads immediately and is purged once the
    /// remote confirms the delete.
    pub async fn delete_record(&self, kind: EntityKind, id: &str) -> Result<()> {
        let mut tx = self.begin_write().await?;

        let sql = format!(
            "UPDATE {} SET deleted = 1, is_dirty = 1, version = version + 1, updated_at = ?
             WHERE id = ? AND deleted = 0
             RETURNING version",
            kind.collection()
        );
        let row = sqlx::query(&sql)
            .bind(to_db_time(&Utc::now()))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let version: i64 = match row {
            Some(row) => row.try_get("version")?,
            None => {
                return Err(SyncError::NotFound {
                    collection: kind.collection(),
                    id: id.to_string(),
                })
            }
        };

        let entry = NewQueueEntry {
            operation: Operation::Delete,
            entity_kind: kind,
            record_id: id.to_string(),
            record_version: version,
            payload: serde_json::json!({ "id": id }),
        };
        let entry_id = insert_queue_entry(&mut *tx, &entry).await?;
        tx.commit().await?;

        tracing::debug!(kind = %kind, record_id = id, entry_id = %entry_id, "Tombstoned record and queued delete");
        Ok(())
    }

    /// Current version of a record (including tombstones), if present
    pub async fn record_version(&self, kind: EntityKind, id: &str) -> Result<Option<i64>> {
        let sql = format!("SELECT version FROM {} WHERE id = ?", kind.collection());
        let row: Option<(i64,)> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(version,)| version))
    }
}

/// Upsert a record and enqueue its Create/Update on the same transaction
///
/// Returns the outcome and the new queue entry id.
pub(crate) async fn save_in<T: Record>(
    conn: &mut SqliteConnection,
    record: &T,
) -> Result<(SaveOutcome, String)> {
    let payload = serde_json::to_value(record)?;
    let (version, existed) = upsert_record(&mut *conn, record).await?;
    let operation = if existed {
        Operation::Update
    } else {
        Operation::Create
    };

    let entry = NewQueueEntry {
        operation,
        entity_kind: T::KIND,
        record_id: record.id().to_string(),
        record_version: version,
        payload,
    };
    let entry_id = insert_queue_entry(&mut *conn, &entry).await?;
    Ok((SaveOutcome { operation, version }, entry_id))
}

/// Upsert inside an open connection or transaction
///
/// Returns the new version and whether a live row already existed.
pub(crate) async fn upsert_record<T: Record>(
    conn: &mut SqliteConnection,
    record: &T,
) -> Result<(i64, bool)> {
    let table = T::KIND.collection();

    let existing: Option<(bool,)> = sqlx::query_as(&format!(
        "SELECT deleted FROM {} WHERE id = ?",
        table
    ))
    .bind(record.id())
    .fetch_optional(&mut *conn)
    .await?;
    let existed = matches!(existing, Some((false,)));

    let data = serde_json::to_string(record)?;
    let index = record.index_fields();
    let sql = format!(
        "INSERT INTO {table} (
            id, data, category, difficulty, scenario_id, started_at,
            is_dirty, synced_at, version, deleted, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, 1, NULL, 1, 0, ?)
        ON CONFLICT(id) DO UPDATE SET
            data = excluded.data,
            category = excluded.category,
            difficulty = excluded.difficulty,
            scenario_id = excluded.scenario_id,
            started_at = excluded.started_at,
            is_dirty = 1,
            version = {table}.version + 1,
            deleted = 0,
            updated_at = excluded.updated_at
        RETURNING version"
    );

    let row = sqlx::query(&sql)
        .bind(record.id())
        .bind(data)
        .bind(index.category)
        .bind(index.difficulty)
        .bind(index.scenario_id)
        .bind(index.started_at.as_ref().map(to_db_time))
        .bind(to_db_time(&Utc::now()))
        .fetch_one(&mut *conn)
        .await?;

    Ok((row.try_get("version")?, existed))
}

/// Convert database row to a tracked record
fn row_to_tracked<T: Record>(row: &SqliteRow) -> Result<Tracked<T>> {
    let data: String = row.try_get("data")?;
    Ok(Tracked {
        record: serde_json::from_str(&data)?,
        is_dirty: row.try_get("is_dirty")?,
        synced_at: from_db_time_opt(row.try_get("synced_at")?)?,
        version: row.try_get("version")?,
    })
}
