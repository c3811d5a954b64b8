//! Read paths over the projection tables
//!
//! Current-state reads skip logically deleted rows. Time-travel reads resolve
//! an instant to its local date and return the latest history row dated on or
//! before it; history rows carry no deletion marker, so an entity deleted
//! later still shows up when travelling back to a date before "now".

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::read_model::{HistoryRow, ProjectState, ReadModel, TaskState};
use crate::timezone::DayBoundary;

use super::ProjectionError;

/// Query service for current and historical state
#[derive(Clone)]
pub struct ReadModelQueries {
    read_model: ReadModel,
    day_boundary: DayBoundary,
}

impl ReadModelQueries {
    pub fn new(read_model: ReadModel, day_boundary: DayBoundary) -> Self {
        Self {
            read_model,
            day_boundary,
        }
    }

    // =========================================================================
    // Current state
    // =========================================================================

    pub async fn project(&self, id: Uuid) -> Result<Option<ProjectState>, ProjectionError> {
        let row = self.read_model.projects.get(id).await?;
        Ok(row.filter(|r| !r.is_deleted).map(|r| r.state))
    }

    /// Live projects ordered by creation time
    pub async fn projects(&self) -> Result<Vec<ProjectState>, ProjectionError> {
        let mut projects: Vec<ProjectState> = self
            .read_model
            .projects
            .list()
            .await?
            .into_iter()
            .filter(|r| !r.is_deleted)
            .map(|r| r.state)
            .collect();
        projects.sort_by_key(|p| (p.created_at, p.id));
        Ok(projects)
    }

    pub async fn task(&self, id: Uuid) -> Result<Option<TaskState>, ProjectionError> {
        let row = self.read_model.tasks.get(id).await?;
        Ok(row.filter(|r| !r.is_deleted).map(|r| r.state))
    }

    /// Live tasks of one project ordered by creation time
    pub async fn tasks_for_project(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<TaskState>, ProjectionError> {
        let mut tasks: Vec<TaskState> = self
            .read_model
            .tasks
            .list()
            .await?
            .into_iter()
            .filter(|r| !r.is_deleted && r.state.project_id == project_id)
            .map(|r| r.state)
            .collect();
        tasks.sort_by_key(|t| (t.created_at, t.id));
        Ok(tasks)
    }

    // =========================================================================
    // Time travel
    // =========================================================================

    pub async fn project_as_of(
        &self,
        id: Uuid,
        instant: DateTime<Utc>,
    ) -> Result<Option<ProjectState>, ProjectionError> {
        let date = self.day_boundary.local_date(instant);
        let row = self.read_model.project_history.as_of(id, date).await?;
        Ok(row.map(|r| r.state))
    }

    pub async fn task_as_of(
        &self,
        id: Uuid,
        instant: DateTime<Utc>,
    ) -> Result<Option<TaskState>, ProjectionError> {
        let date = self.day_boundary.local_date(instant);
        let row = self.read_model.task_history.as_of(id, date).await?;
        Ok(row.map(|r| r.state))
    }

    /// Tasks that belonged to `project_id` on the local date of `instant`
    pub async fn tasks_for_project_as_of(
        &self,
        project_id: Uuid,
        instant: DateTime<Utc>,
    ) -> Result<Vec<TaskState>, ProjectionError> {
        let date = self.day_boundary.local_date(instant);
        let mut tasks: Vec<TaskState> = self
            .read_model
            .task_history
            .all_as_of(date)
            .await?
            .into_iter()
            .map(|r| r.state)
            .filter(|t| t.project_id == project_id)
            .collect();
        tasks.sort_by_key(|t| (t.created_at, t.id));
        Ok(tasks)
    }

    /// Every daily snapshot of a project, oldest first
    pub async fn project_history(
        &self,
        id: Uuid,
    ) -> Result<Vec<HistoryRow<ProjectState>>, ProjectionError> {
        self.read_model.project_history.for_entity(id).await
    }
}
