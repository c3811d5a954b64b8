//! Read-model rows
//!
//! Current-state rows and day-granularity history rows for each entity kind.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::{Hours, TaskStatus};

/// Field set shared by current-state and history rows
pub trait EntityState: Clone + Send + Sync + 'static {
    /// Kind name used in logs and errors
    const KIND: &'static str;

    fn entity_id(&self) -> Uuid;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectState {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl EntityState for ProjectState {
    const KIND: &'static str = "Project";

    fn entity_id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskState {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub estimated_hours: Hours,
    pub actual_hours: Hours,
    pub assignee: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl EntityState for TaskState {
    const KIND: &'static str = "Task";

    fn entity_id(&self) -> Uuid {
        self.id
    }
}

/// Latest known state of one entity plus its logical-deletion marker
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentRow<S> {
    pub state: S,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
}

impl<S> CurrentRow<S> {
    /// A row that has not been deleted
    pub fn live(state: S) -> Self {
        Self {
            state,
            is_deleted: false,
            deleted_at: None,
            deleted_by: None,
        }
    }

    pub fn mark_deleted(&mut self, at: DateTime<Utc>, by: impl Into<String>) {
        self.is_deleted = true;
        self.deleted_at = Some(at);
        self.deleted_by = Some(by.into());
    }
}

/// End-of-day state of one entity on one local date
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow<S> {
    pub entity_id: Uuid,
    pub snapshot_date: NaiveDate,
    pub state: S,
    pub stored_at: DateTime<Utc>,
}
