//! PostgreSQL read-model tables
//!
//! `projects` / `tasks` hold current state, `project_history` /
//! `task_history` hold one row per entity per local date (unique on
//! `(entity_id, snapshot_date)`), and `system_metadata` is a plain key/value
//! table.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::{Hours, TaskStatus};
use crate::projection::ProjectionError;

use super::{
    CurrentRow, CurrentTable, HistoryRow, HistoryTable, MetadataStore, ProjectState, TaskState,
};

fn deletion<S>(row: &PgRow, state: S) -> Result<CurrentRow<S>, ProjectionError> {
    Ok(CurrentRow {
        state,
        is_deleted: row.try_get("is_deleted")?,
        deleted_at: row.try_get("deleted_at")?,
        deleted_by: row.try_get("deleted_by")?,
    })
}

fn history<S>(row: &PgRow, state: S) -> Result<HistoryRow<S>, ProjectionError> {
    Ok(HistoryRow {
        entity_id: row.try_get("entity_id")?,
        snapshot_date: row.try_get("snapshot_date")?,
        state,
        stored_at: row.try_get("stored_at")?,
    })
}

// =========================================================================
// Projects
// =========================================================================

const PROJECT_FIELDS: &str = "name, description, start_date, end_date, \
                              created_at, created_by, updated_at, updated_by";

fn project_state(row: &PgRow, id_column: &str) -> Result<ProjectState, ProjectionError> {
    Ok(ProjectState {
        id: row.try_get(id_column)?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        created_at: row.try_get("created_at")?,
        created_by: row.try_get("created_by")?,
        updated_at: row.try_get("updated_at")?,
        updated_by: row.try_get("updated_by")?,
    })
}

/// `projects` and `project_history`
#[derive(Debug, Clone)]
pub struct PgProjectTables {
    pool: PgPool,
}

impl PgProjectTables {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CurrentTable<ProjectState> for PgProjectTables {
    async fn get(&self, id: Uuid) -> Result<Option<CurrentRow<ProjectState>>, ProjectionError> {
        let sql = format!(
            "SELECT id, {PROJECT_FIELDS}, is_deleted, deleted_at, deleted_by \
             FROM projects WHERE id = $1"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| deletion(&row, project_state(&row, "id")?))
            .transpose()
    }

    async fn upsert(&self, row: &CurrentRow<ProjectState>) -> Result<(), ProjectionError> {
        let s = &row.state;
        sqlx::query(
            r#"
            INSERT INTO projects (
                id, name, description, start_date, end_date,
                created_at, created_by, updated_at, updated_by,
                is_deleted, deleted_at, deleted_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                start_date = EXCLUDED.start_date,
                end_date = EXCLUDED.end_date,
                created_at = EXCLUDED.created_at,
                created_by = EXCLUDED.created_by,
                updated_at = EXCLUDED.updated_at,
                updated_by = EXCLUDED.updated_by,
                is_deleted = EXCLUDED.is_deleted,
                deleted_at = EXCLUDED.deleted_at,
                deleted_by = EXCLUDED.deleted_by
            "#,
        )
        .bind(s.id)
        .bind(&s.name)
        .bind(&s.description)
        .bind(s.start_date)
        .bind(s.end_date)
        .bind(s.created_at)
        .bind(&s.created_by)
        .bind(s.updated_at)
        .bind(&s.updated_by)
        .bind(row.is_deleted)
        .bind(row.deleted_at)
        .bind(&row.deleted_by)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<CurrentRow<ProjectState>>, ProjectionError> {
        let sql = format!(
            "SELECT id, {PROJECT_FIELDS}, is_deleted, deleted_at, deleted_by \
             FROM projects ORDER BY id"
        );
        sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| deletion(row, project_state(row, "id")?))
            .collect()
    }

    async fn clear(&self) -> Result<(), ProjectionError> {
        sqlx::query("DELETE FROM projects").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl HistoryTable<ProjectState> for PgProjectTables {
    async fn find(
        &self,
        entity_id: Uuid,
        snapshot_date: NaiveDate,
    ) -> Result<Option<HistoryRow<ProjectState>>, ProjectionError> {
        let sql = format!(
            "SELECT entity_id, snapshot_date, {PROJECT_FIELDS}, stored_at \
             FROM project_history WHERE entity_id = $1 AND snapshot_date = $2"
        );
        let row = sqlx::query(&sql)
            .bind(entity_id)
            .bind(snapshot_date)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| history(&row, project_state(&row, "entity_id")?))
            .transpose()
    }

    async fn insert(&self, row: &HistoryRow<ProjectState>) -> Result<(), ProjectionError> {
        let s = &row.state;
        sqlx::query(
            r#"
            INSERT INTO project_history (
                entity_id, snapshot_date, name, description, start_date, end_date,
                created_at, created_by, updated_at, updated_by, stored_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(row.entity_id)
        .bind(row.snapshot_date)
        .bind(&s.name)
        .bind(&s.description)
        .bind(s.start_date)
        .bind(s.end_date)
        .bind(s.created_at)
        .bind(&s.created_by)
        .bind(s.updated_at)
        .bind(&s.updated_by)
        .bind(row.stored_at)
        .execute(&self.pool)
        .await
        .map_err(|e| ProjectionError::from_insert(e, row.entity_id, row.snapshot_date))?;

        Ok(())
    }

    async fn overwrite(&self, row: &HistoryRow<ProjectState>) -> Result<(), ProjectionError> {
        let s = &row.state;
        let affected = sqlx::query(
            r#"
            UPDATE project_history SET
                name = $3, description = $4, start_date = $5, end_date = $6,
                created_at = $7, created_by = $8, updated_at = $9, updated_by = $10,
                stored_at = $11
            WHERE entity_id = $1 AND snapshot_date = $2
            "#,
        )
        .bind(row.entity_id)
        .bind(row.snapshot_date)
        .bind(&s.name)
        .bind(&s.description)
        .bind(s.start_date)
        .bind(s.end_date)
        .bind(s.created_at)
        .bind(&s.created_by)
        .bind(s.updated_at)
        .bind(&s.updated_by)
        .bind(row.stored_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(ProjectionError::MissingRow {
                kind: "Project",
                id: row.entity_id,
            });
        }
        Ok(())
    }

    async fn as_of(
        &self,
        entity_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<HistoryRow<ProjectState>>, ProjectionError> {
        let sql = format!(
            "SELECT entity_id, snapshot_date, {PROJECT_FIELDS}, stored_at \
             FROM project_history WHERE entity_id = $1 AND snapshot_date <= $2 \
             ORDER BY snapshot_date DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(entity_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| history(&row, project_state(&row, "entity_id")?))
            .transpose()
    }

    async fn all_as_of(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<HistoryRow<ProjectState>>, ProjectionError> {
        let sql = format!(
            "SELECT DISTINCT ON (entity_id) entity_id, snapshot_date, {PROJECT_FIELDS}, stored_at \
             FROM project_history WHERE snapshot_date <= $1 \
             ORDER BY entity_id, snapshot_date DESC"
        );
        sqlx::query(&sql)
            .bind(date)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| history(row, project_state(row, "entity_id")?))
            .collect()
    }

    async fn for_entity(
        &self,
        entity_id: Uuid,
    ) -> Result<Vec<HistoryRow<ProjectState>>, ProjectionError> {
        let sql = format!(
            "SELECT entity_id, snapshot_date, {PROJECT_FIELDS}, stored_at \
             FROM project_history WHERE entity_id = $1 ORDER BY snapshot_date ASC"
        );
        sqlx::query(&sql)
            .bind(entity_id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| history(row, project_state(row, "entity_id")?))
            .collect()
    }

    async fn clear(&self) -> Result<(), ProjectionError> {
        sqlx::query("DELETE FROM project_history")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// =========================================================================
// Tasks
// =========================================================================

const TASK_FIELDS: &str = "project_id, title, description, status, estimated_hours, \
                           actual_hours, assignee, due_date, \
                           created_at, created_by, updated_at, updated_by";

fn hours(row: &PgRow, column: &str) -> Result<Hours, ProjectionError> {
    let value: Decimal = row.try_get(column)?;
    Hours::new(value).map_err(|e| ProjectionError::InvalidRow(format!("{column}: {e}")))
}

fn task_state(row: &PgRow, id_column: &str) -> Result<TaskState, ProjectionError> {
    let status: String = row.try_get("status")?;
    Ok(TaskState {
        id: row.try_get(id_column)?,
        project_id: row.try_get("project_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        status: status
            .parse::<TaskStatus>()
            .map_err(ProjectionError::InvalidRow)?,
        estimated_hours: hours(row, "estimated_hours")?,
        actual_hours: hours(row, "actual_hours")?,
        assignee: row.try_get("assignee")?,
        due_date: row.try_get("due_date")?,
        created_at: row.try_get("created_at")?,
        created_by: row.try_get("created_by")?,
        updated_at: row.try_get("updated_at")?,
        updated_by: row.try_get("updated_by")?,
    })
}

/// `tasks` and `task_history`
#[derive(Debug, Clone)]
pub struct PgTaskTables {
    pool: PgPool,
}

impl PgTaskTables {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CurrentTable<TaskState> for PgTaskTables {
    async fn get(&self, id: Uuid) -> Result<Option<CurrentRow<TaskState>>, ProjectionError> {
        let sql = format!(
            "SELECT id, {TASK_FIELDS}, is_deleted, deleted_at, deleted_by \
             FROM tasks WHERE id = $1"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| deletion(&row, task_state(&row, "id")?))
            .transpose()
    }

    async fn upsert(&self, row: &CurrentRow<TaskState>) -> Result<(), ProjectionError> {
        let s = &row.state;
        sqlx::query(
            r#"
            INSERT INTO tasks (
                id, project_id, title, description, status, estimated_hours,
                actual_hours, assignee, due_date,
                created_at, created_by, updated_at, updated_by,
                is_deleted, deleted_at, deleted_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (id) DO UPDATE SET
                project_id = EXCLUDED.project_id,
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                status = EXCLUDED.status,
                estimated_hours = EXCLUDED.estimated_hours,
                actual_hours = EXCLUDED.actual_hours,
                assignee = EXCLUDED.assignee,
                due_date = EXCLUDED.due_date,
                created_at = EXCLUDED.created_at,
                created_by = EXCLUDED.created_by,
                updated_at = EXCLUDED.updated_at,
                updated_by = EXCLUDED.updated_by,
                is_deleted = EXCLUDED.is_deleted,
                deleted_at = EXCLUDED.deleted_at,
                deleted_by = EXCLUDED.deleted_by
            "#,
        )
        .bind(s.id)
        .bind(s.project_id)
        .bind(&s.title)
        .bind(&s.description)
        .bind(s.status.as_str())
        .bind(s.estimated_hours.value())
        .bind(s.actual_hours.value())
        .bind(&s.assignee)
        .bind(s.due_date)
        .bind(s.created_at)
        .bind(&s.created_by)
        .bind(s.updated_at)
        .bind(&s.updated_by)
        .bind(row.is_deleted)
        .bind(row.deleted_at)
        .bind(&row.deleted_by)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<CurrentRow<TaskState>>, ProjectionError> {
        let sql = format!(
            "SELECT id, {TASK_FIELDS}, is_deleted, deleted_at, deleted_by \
             FROM tasks ORDER BY id"
        );
        sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| deletion(row, task_state(row, "id")?))
            .collect()
    }

    async fn clear(&self) -> Result<(), ProjectionError> {
        sqlx::query("DELETE FROM tasks").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl HistoryTable<TaskState> for PgTaskTables {
    async fn find(
        &self,
        entity_id: Uuid,
        snapshot_date: NaiveDate,
    ) -> Result<Option<HistoryRow<TaskState>>, ProjectionError> {
        let sql = format!(
            "SELECT entity_id, snapshot_date, {TASK_FIELDS}, stored_at \
             FROM task_history WHERE entity_id = $1 AND snapshot_date = $2"
        );
        let row = sqlx::query(&sql)
            .bind(entity_id)
            .bind(snapshot_date)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| history(&row, task_state(&row, "entity_id")?))
            .transpose()
    }

    async fn insert(&self, row: &HistoryRow<TaskState>) -> Result<(), ProjectionError> {
        let s = &row.state;
        sqlx::query(
            r#"
            INSERT INTO task_history (
                entity_id, snapshot_date, project_id, title, description, status,
                estimated_hours, actual_hours, assignee, due_date,
                created_at, created_by, updated_at, updated_by, stored_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(row.entity_id)
        .bind(row.snapshot_date)
        .bind(s.project_id)
        .bind(&s.title)
        .bind(&s.description)
        .bind(s.status.as_str())
        .bind(s.estimated_hours.value())
        .bind(s.actual_hours.value())
        .bind(&s.assignee)
        .bind(s.due_date)
        .bind(s.created_at)
        .bind(&s.created_by)
        .bind(s.updated_at)
        .bind(&s.updated_by)
        .bind(row.stored_at)
        .execute(&self.pool)
        .await
        .map_err(|e| ProjectionError::from_insert(e, row.entity_id, row.snapshot_date))?;

        Ok(())
    }

    async fn overwrite(&self, row: &HistoryRow<TaskState>) -> Result<(), ProjectionError> {
        let s = &row.state;
        let affected = sqlx::query(
            r#"
            UPDATE task_history SET
                project_id = $3, title = $4, description = $5, status = $6,
                estimated_hours = $7, actual_hours = $8, assignee = $9, due_date = $10,
                created_at = $11, created_by = $12, updated_at = $13, updated_by = $14,
                stored_at = $15
            WHERE entity_id = $1 AND snapshot_date = $2
            "#,
        )
        .bind(row.entity_id)
        .bind(row.snapshot_date)
        .bind(s.project_id)
        .bind(&s.title)
        .bind(&s.description)
        .bind(s.status.as_str())
        .bind(s.estimated_hours.value())
        .bind(s.actual_hours.value())
        .bind(&s.assignee)
        .bind(s.due_date)
        .bind(s.created_at)
        .bind(&s.created_by)
        .bind(s.updated_at)
        .bind(&s.updated_by)
        .bind(row.stored_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(ProjectionError::MissingRow {
                kind: "Task",
                id: row.entity_id,
            });
        }
        Ok(())
    }

    async fn as_of(
        &self,
        entity_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<HistoryRow<TaskState>>, ProjectionError> {
        let sql = format!(
            "SELECT entity_id, snapshot_date, {TASK_FIELDS}, stored_at \
             FROM task_history WHERE entity_id = $1 AND snapshot_date <= $2 \
             ORDER BY snapshot_date DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(entity_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| history(&row, task_state(&row, "entity_id")?))
            .transpose()
    }

    async fn all_as_of(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<HistoryRow<TaskState>>, ProjectionError> {
        let sql = format!(
            "SELECT DISTINCT ON (entity_id) entity_id, snapshot_date, {TASK_FIELDS}, stored_at \
             FROM task_history WHERE snapshot_date <= $1 \
             ORDER BY entity_id, snapshot_date DESC"
        );
        sqlx::query(&sql)
            .bind(date)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| history(row, task_state(row, "entity_id")?))
            .collect()
    }

    async fn for_entity(
        &self,
        entity_id: Uuid,
    ) -> Result<Vec<HistoryRow<TaskState>>, ProjectionError> {
        let sql = format!(
            "SELECT entity_id, snapshot_date, {TASK_FIELDS}, stored_at \
             FROM task_history WHERE entity_id = $1 ORDER BY snapshot_date ASC"
        );
        sqlx::query(&sql)
            .bind(entity_id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| history(row, task_state(row, "entity_id")?))
            .collect()
    }

    async fn clear(&self) -> Result<(), ProjectionError> {
        sqlx::query("DELETE FROM task_history")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// =========================================================================
// System metadata
// =========================================================================

#[derive(Debug, Clone)]
pub struct PgMetadata {
    pool: PgPool,
}

impl PgMetadata {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetadataStore for PgMetadata {
    async fn get(&self, key: &str) -> Result<Option<String>, ProjectionError> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM system_metadata WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ProjectionError> {
        sqlx::query(
            r#"
            INSERT INTO system_metadata (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
