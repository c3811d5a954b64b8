//! Read Model module
//!
//! Storage for projections: one current-state table and one history table per
//! entity kind, plus the system metadata key/value table.

mod memory;
mod postgres;
mod rows;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::projection::ProjectionError;

pub use memory::{InMemoryCurrentTable, InMemoryHistoryTable, InMemoryMetadata};
pub use postgres::{PgMetadata, PgProjectTables, PgTaskTables};
pub use rows::{CurrentRow, EntityState, HistoryRow, ProjectState, TaskState};

/// Current-state table: one row per entity, never physically removed
#[async_trait]
pub trait CurrentTable<S: EntityState>: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<CurrentRow<S>>, ProjectionError>;

    /// Insert or replace the row for `row.state.entity_id()`
    async fn upsert(&self, row: &CurrentRow<S>) -> Result<(), ProjectionError>;

    /// Every row, deleted ones included
    async fn list(&self) -> Result<Vec<CurrentRow<S>>, ProjectionError>;

    async fn clear(&self) -> Result<(), ProjectionError>;
}

/// History table: one row per (entity, local date)
#[async_trait]
pub trait HistoryTable<S: EntityState>: Send + Sync {
    async fn find(
        &self,
        entity_id: Uuid,
        snapshot_date: NaiveDate,
    ) -> Result<Option<HistoryRow<S>>, ProjectionError>;

    async fn insert(&self, row: &HistoryRow<S>) -> Result<(), ProjectionError>;

    /// Replace the fields of the existing row with the same key
    async fn overwrite(&self, row: &HistoryRow<S>) -> Result<(), ProjectionError>;

    /// Latest row dated on or before `date`
    async fn as_of(
        &self,
        entity_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<HistoryRow<S>>, ProjectionError>;

    /// Latest row per entity dated on or before `date`
    async fn all_as_of(&self, date: NaiveDate) -> Result<Vec<HistoryRow<S>>, ProjectionError>;

    /// Every row of one entity, oldest first
    async fn for_entity(&self, entity_id: Uuid) -> Result<Vec<HistoryRow<S>>, ProjectionError>;

    async fn clear(&self) -> Result<(), ProjectionError>;
}

/// System metadata key/value store
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, ProjectionError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), ProjectionError>;
}

/// Every table the projections write to
#[derive(Clone)]
pub struct ReadModel {
    pub projects: Arc<dyn CurrentTable<ProjectState>>,
    pub project_history: Arc<dyn HistoryTable<ProjectState>>,
    pub tasks: Arc<dyn CurrentTable<TaskState>>,
    pub task_history: Arc<dyn HistoryTable<TaskState>>,
    pub metadata: Arc<dyn MetadataStore>,
}

impl ReadModel {
    /// Read model held in process memory
    pub fn in_memory() -> Self {
        Self {
            projects: Arc::new(InMemoryCurrentTable::new()),
            project_history: Arc::new(InMemoryHistoryTable::new()),
            tasks: Arc::new(InMemoryCurrentTable::new()),
            task_history: Arc::new(InMemoryHistoryTable::new()),
            metadata: Arc::new(InMemoryMetadata::new()),
        }
    }

    /// Read model backed by the PostgreSQL projection tables
    pub fn postgres(pool: PgPool) -> Self {
        let projects = Arc::new(PgProjectTables::new(pool.clone()));
        let tasks = Arc::new(PgTaskTables::new(pool.clone()));
        Self {
            projects: projects.clone(),
            project_history: projects,
            tasks: tasks.clone(),
            task_history: tasks,
            metadata: Arc::new(PgMetadata::new(pool)),
        }
    }

    /// Remove every current-state and history row; metadata is kept
    pub async fn clear(&self) -> Result<(), ProjectionError> {
        self.projects.clear().await?;
        self.project_history.clear().await?;
        self.tasks.clear().await?;
        self.task_history.clear().await?;

        tracing::warn!("Read model cleared");
        Ok(())
    }
}
