use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{EntityStore, StoreError, StoreResult};
use crate::engine::{Interval, Operator, Rule};
use crate::models::log_entry::{LogEntry, TimeRange};
use crate::models::log_type::{FieldSpec, LogType};
use crate::models::tracker::{Tracker, TrackerKind};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct LogTypeRow {
    id: Uuid,
    user_id: String,
    name: String,
    icon_id: Option<String>,
    fields: Json<BTreeMap<String, FieldSpec>>,
    created_at: DateTime<Utc>,
}

impl From<LogTypeRow> for LogType {
    fn from(row: LogTypeRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            icon_id: row.icon_id,
            fields: row.fields.0,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct LogEntryRow {
    id: Uuid,
    user_id: String,
    type_id: Uuid,
    logged_at_ms: i64,
    field_values: Json<BTreeMap<String, String>>,
    notes: Option<String>,
}

impl From<LogEntryRow> for LogEntry {
    fn from(row: LogEntryRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            type_id: row.type_id,
            timestamp: row.logged_at_ms,
            values: row.field_values.0,
            notes: row.notes,
        }
    }
}

#[derive(Debug, FromRow)]
struct TrackerRow {
    id: Uuid,
    user_id: String,
    name: String,
    kind: String,
    log_type_ids: Vec<Uuid>,
    field: String,
    unit: Option<String>,
    operator: String,
    threshold: Option<f64>,
    interval_kind: String,
    icon_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TrackerRow> for Tracker {
    type Error = StoreError;

    // Unknown operators load fine and evaluate to false; kind and interval
    // are constrained by the schema, so a bad value there is corruption.
    fn try_from(row: TrackerRow) -> Result<Self, Self::Error> {
        let kind = TrackerKind::parse(&row.kind)
            .ok_or_else(|| StoreError::Corrupt(format!("tracker {}: kind '{}'", row.id, row.kind)))?;
        let interval = Interval::parse(&row.interval_kind).ok_or_else(|| {
            StoreError::Corrupt(format!("tracker {}: interval '{}'", row.id, row.interval_kind))
        })?;
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            kind,
            log_type_ids: row.log_type_ids,
            field: row.field,
            unit: row.unit,
            rule: Rule::new(Operator::parse(&row.operator), row.threshold),
            interval,
            icon_id: row.icon_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn insert_log_type(&self, log_type: &LogType) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO log_types (id, user_id, name, icon_id, fields, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(log_type.id)
        .bind(&log_type.user_id)
        .bind(&log_type.name)
        .bind(&log_type.icon_id)
        .bind(Json(&log_type.fields))
        .bind(log_type.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_log_type(&self, id: Uuid) -> StoreResult<Option<LogType>> {
        let row = sqlx::query_as::<_, LogTypeRow>("SELECT * FROM log_types WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(LogType::from))
    }

    async fn list_log_types_by_owner(&self, owner: &str) -> StoreResult<Vec<LogType>> {
        let rows = sqlx::query_as::<_, LogTypeRow>(
            "SELECT * FROM log_types WHERE user_id = $1 ORDER BY created_at ASC, name ASC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(LogType::from).collect())
    }

    async fn update_log_type(&self, log_type: &LogType) -> StoreResult<()> {
        sqlx::query("UPDATE log_types SET name = $2, icon_id = $3, fields = $4 WHERE id = $1")
            .bind(log_type.id)
            .bind(&log_type.name)
            .bind(&log_type.icon_id)
            .bind(Json(&log_type.fields))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_log_type(&self, id: Uuid) -> StoreResult<u64> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query("DELETE FROM log_entries WHERE type_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM log_types WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(removed)
    }

    async fn insert_entry(&self, entry: &LogEntry) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO log_entries (id, user_id, type_id, logged_at_ms, field_values, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.user_id)
        .bind(entry.type_id)
        .bind(entry.timestamp)
        .bind(Json(&entry.values))
        .bind(&entry.notes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_entry(&self, id: Uuid) -> StoreResult<Option<LogEntry>> {
        let row = sqlx::query_as::<_, LogEntryRow>("SELECT * FROM log_entries WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(LogEntry::from))
    }

    async fn update_entry(&self, entry: &LogEntry) -> StoreResult<()> {
        sqlx::query("UPDATE log_entries SET field_values = $2, notes = $3 WHERE id = $1")
            .bind(entry.id)
            .bind(Json(&entry.values))
            .bind(&entry.notes)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_entry(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM log_entries WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_entries_by_owner(&self, owner: &str) -> StoreResult<Vec<LogEntry>> {
        let rows = sqlx::query_as::<_, LogEntryRow>(
            "SELECT * FROM log_entries WHERE user_id = $1 ORDER BY logged_at_ms DESC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(LogEntry::from).collect())
    }

    async fn list_entries_by_owner_and_type(
        &self,
        owner: &str,
        type_id: Uuid,
        range: TimeRange,
    ) -> StoreResult<Vec<LogEntry>> {
        let rows = sqlx::query_as::<_, LogEntryRow>(
            r#"
            SELECT * FROM log_entries
            WHERE type_id = $1 AND user_id = $2 AND logged_at_ms >= $3 AND logged_at_ms < $4
            ORDER BY logged_at_ms ASC
            "#,
        )
        .bind(type_id)
        .bind(owner)
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(LogEntry::from).collect())
    }

    async fn find_entry_in_range(
        &self,
        owner: &str,
        type_id: Uuid,
        range: TimeRange,
    ) -> StoreResult<Option<LogEntry>> {
        let row = sqlx::query_as::<_, LogEntryRow>(
            r#"
            SELECT * FROM log_entries
            WHERE type_id = $1 AND user_id = $2 AND logged_at_ms >= $3 AND logged_at_ms < $4
            ORDER BY logged_at_ms ASC
            LIMIT 1
            "#,
        )
        .bind(type_id)
        .bind(owner)
        .bind(range.from)
        .bind(range.to)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(LogEntry::from))
    }

    async fn insert_tracker(&self, tracker: &Tracker) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO trackers (id, user_id, name, kind, log_type_ids, field, unit, operator, threshold, interval_kind, icon_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(tracker.id)
        .bind(&tracker.user_id)
        .bind(&tracker.name)
        .bind(tracker.kind.as_str())
        .bind(&tracker.log_type_ids)
        .bind(&tracker.field)
        .bind(&tracker.unit)
        .bind(tracker.rule.operator.as_str())
        .bind(tracker.rule.value)
        .bind(tracker.interval.as_str())
        .bind(&tracker.icon_id)
        .bind(tracker.created_at)
        .bind(tracker.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_tracker(&self, id: Uuid) -> StoreResult<Option<Tracker>> {
        sqlx::query_as::<_, TrackerRow>("SELECT * FROM trackers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Tracker::try_from)
            .transpose()
    }

    async fn list_trackers_by_owner(&self, owner: &str) -> StoreResult<Vec<Tracker>> {
        sqlx::query_as::<_, TrackerRow>(
            "SELECT * FROM trackers WHERE user_id = $1 ORDER BY created_at ASC, name ASC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Tracker::try_from)
        .collect()
    }

    async fn update_tracker(&self, tracker: &Tracker) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE trackers SET
                name = $2,
                kind = $3,
                log_type_ids = $4,
                field = $5,
                unit = $6,
                operator = $7,
                threshold = $8,
                interval_kind = $9,
                icon_id = $10,
                updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(tracker.id)
        .bind(&tracker.name)
        .bind(tracker.kind.as_str())
        .bind(&tracker.log_type_ids)
        .bind(&tracker.field)
        .bind(&tracker.unit)
        .bind(tracker.rule.operator.as_str())
        .bind(tracker.rule.value)
        .bind(tracker.interval.as_str())
        .bind(&tracker.icon_id)
        .bind(tracker.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_tracker(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM trackers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}
