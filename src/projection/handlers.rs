//! Projection handlers
//!
//! Each handler owns the current-state and history tables of one entity kind
//! and is subscribed once per event kind of that entity. Mutating events
//! update the current row and then record a snapshot; deletions only flag the
//! current row and leave history exactly as it was.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    DomainEvent, Hours, ProjectCreated, ProjectDeleted, ProjectEvent, ProjectUpdated,
    RecordedEvent, TaskCreated, TaskDeleted, TaskEvent, TaskStatusChanged, TaskUpdated,
};
use crate::publisher::EventHandler;
use crate::read_model::{
    CurrentRow, CurrentTable, EntityState, HistoryTable, ProjectState, TaskState,
};

use super::{ProjectionError, SnapshotPolicy};

/// Load the current row or report it missing
async fn existing<S: EntityState>(
    table: &dyn CurrentTable<S>,
    id: Uuid,
) -> Result<CurrentRow<S>, ProjectionError> {
    table
        .get(id)
        .await?
        .ok_or(ProjectionError::MissingRow { kind: S::KIND, id })
}

/// Flag the current row as deleted; state and history stay untouched
async fn mark_deleted<S: EntityState>(
    table: &dyn CurrentTable<S>,
    id: Uuid,
    at: DateTime<Utc>,
    by: &str,
) -> Result<(), ProjectionError> {
    let mut row = existing(table, id).await?;
    row.mark_deleted(at, by);
    table.upsert(&row).await?;

    tracing::debug!(kind = S::KIND, id = %id, "Read model row marked deleted");
    Ok(())
}

// =========================================================================
// Projects
// =========================================================================

/// Maintains `projects` and `project_history`
pub struct ProjectProjection {
    current: Arc<dyn CurrentTable<ProjectState>>,
    history: Arc<dyn HistoryTable<ProjectState>>,
    policy: SnapshotPolicy,
}

impl ProjectProjection {
    pub fn new(
        current: Arc<dyn CurrentTable<ProjectState>>,
        history: Arc<dyn HistoryTable<ProjectState>>,
        policy: SnapshotPolicy,
    ) -> Self {
        Self {
            current,
            history,
            policy,
        }
    }

    async fn created(
        &self,
        event: &RecordedEvent,
        e: &ProjectCreated,
    ) -> Result<(), ProjectionError> {
        let state = ProjectState {
            id: event.aggregate_id,
            name: e.name.clone(),
            description: e.description.clone(),
            start_date: e.start_date,
            end_date: e.end_date,
            created_at: event.occurred_at,
            created_by: e.created_by.clone(),
            updated_at: event.occurred_at,
            updated_by: e.created_by.clone(),
        };
        self.store(CurrentRow::live(state), event.occurred_at).await
    }

    async fn updated(
        &self,
        event: &RecordedEvent,
        e: &ProjectUpdated,
    ) -> Result<(), ProjectionError> {
        let mut row = existing(&*self.current, event.aggregate_id).await?;
        let state = &mut row.state;
        state.name = e.name.clone();
        state.description = e.description.clone();
        state.start_date = e.start_date;
        state.end_date = e.end_date;
        state.updated_at = event.occurred_at;
        state.updated_by = e.updated_by.clone();

        self.store(row, event.occurred_at).await
    }

    async fn deleted(
        &self,
        event: &RecordedEvent,
        e: &ProjectDeleted,
    ) -> Result<(), ProjectionError> {
        mark_deleted(&*self.current, event.aggregate_id, event.occurred_at, &e.deleted_by).await
    }

    async fn store(
        &self,
        row: CurrentRow<ProjectState>,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), ProjectionError> {
        self.current.upsert(&row).await?;
        self.policy
            .upsert(&*self.history, row.state.id, &row.state, occurred_at)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl EventHandler for ProjectProjection {
    fn name(&self) -> &'static str {
        "project_projection"
    }

    async fn handle(&self, event: &RecordedEvent) -> Result<(), ProjectionError> {
        match &event.event {
            DomainEvent::Project(ProjectEvent::Created(e)) => self.created(event, e).await,
            DomainEvent::Project(ProjectEvent::Updated(e)) => self.updated(event, e).await,
            DomainEvent::Project(ProjectEvent::Deleted(e)) => self.deleted(event, e).await,
            DomainEvent::Task(_) => Err(ProjectionError::UnexpectedEvent(event.kind())),
        }
    }
}

// =========================================================================
// Tasks
// =========================================================================

/// Maintains `tasks` and `task_history`
pub struct TaskProjection {
    current: Arc<dyn CurrentTable<TaskState>>,
    history: Arc<dyn HistoryTable<TaskState>>,
    policy: SnapshotPolicy,
}

impl TaskProjection {
    pub fn new(
        current: Arc<dyn CurrentTable<TaskState>>,
        history: Arc<dyn HistoryTable<TaskState>>,
        policy: SnapshotPolicy,
    ) -> Self {
        Self {
            current,
            history,
            policy,
        }
    }

    async fn created(&self, event: &RecordedEvent, e: &TaskCreated) -> Result<(), ProjectionError> {
        let state = TaskState {
            id: event.aggregate_id,
            project_id: e.project_id,
            title: e.title.clone(),
            description: e.description.clone(),
            status: e.status,
            estimated_hours: e.estimated_hours,
            actual_hours: Hours::ZERO,
            assignee: e.assignee.clone(),
            due_date: e.due_date,
            created_at: event.occurred_at,
            created_by: e.created_by.clone(),
            updated_at: event.occurred_at,
            updated_by: e.created_by.clone(),
        };
        self.store(CurrentRow::live(state), event.occurred_at).await
    }

    async fn updated(&self, event: &RecordedEvent, e: &TaskUpdated) -> Result<(), ProjectionError> {
        let mut row = existing(&*self.current, event.aggregate_id).await?;
        let state = &mut row.state;
        state.title = e.title.clone();
        state.description = e.description.clone();
        state.estimated_hours = e.estimated_hours;
        state.actual_hours = e.actual_hours;
        state.assignee = e.assignee.clone();
        state.due_date = e.due_date;
        state.updated_at = event.occurred_at;
        state.updated_by = e.updated_by.clone();

        self.store(row, event.occurred_at).await
    }

    async fn status_changed(
        &self,
        event: &RecordedEvent,
        e: &TaskStatusChanged,
    ) -> Result<(), ProjectionError> {
        let mut row = existing(&*self.current, event.aggregate_id).await?;
        row.state.status = e.to;
        row.state.updated_at = event.occurred_at;
        row.state.updated_by = e.changed_by.clone();

        self.store(row, event.occurred_at).await
    }

    async fn deleted(&self, event: &RecordedEvent, e: &TaskDeleted) -> Result<(), ProjectionError> {
        mark_deleted(&*self.current, event.aggregate_id, event.occurred_at, &e.deleted_by).await
    }

    async fn store(
        &self,
        row: CurrentRow<TaskState>,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), ProjectionError> {
        self.current.upsert(&row).await?;
        self.policy
            .upsert(&*self.history, row.state.id, &row.state, occurred_at)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl EventHandler for TaskProjection {
    fn name(&self) -> &'static str {
        "task_projection"
    }

    async fn handle(&self, event: &RecordedEvent) -> Result<(), ProjectionError> {
        match &event.event {
            DomainEvent::Task(TaskEvent::Created(e)) => self.created(event, e).await,
            DomainEvent::Task(TaskEvent::Updated(e)) => self.updated(event, e).await,
            DomainEvent::Task(TaskEvent::StatusChanged(e)) => self.status_changed(event, e).await,
            DomainEvent::Task(TaskEvent::Deleted(e)) => self.deleted(event, e).await,
            DomainEvent::Project(_) => Err(ProjectionError::UnexpectedEvent(event.kind())),
        }
    }
}
