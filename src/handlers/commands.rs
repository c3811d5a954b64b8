//! Command definitions
//!
//! Commands represent intentions to change the system state.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Hours;

/// Command to add a task to an existing project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskCommand {
    pub task_id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub estimated_hours: Hours,
    pub assignee: Option<String>,
    pub due_date: Option<NaiveDate>,
}

impl CreateTaskCommand {
    pub fn new(project_id: Uuid, title: String, estimated_hours: Hours) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            project_id,
            title,
            description: None,
            estimated_hours,
            assignee: None,
            due_date: None,
        }
    }

    pub fn with_assignee(mut self, assignee: String) -> Self {
        self.assignee = Some(assignee);
        self
    }
}

/// Result of task creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskResult {
    pub task_id: Uuid,
    pub project_id: Uuid,
    pub version: i64,
}

/// Command to delete a project together with its tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteProjectCommand {
    pub project_id: Uuid,
}

/// Result of a cascading project deletion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteProjectResult {
    pub project_id: Uuid,
    /// Tasks deleted before the project, in deletion order
    pub deleted_tasks: Vec<Uuid>,
}
