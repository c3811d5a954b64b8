//! Project Command Handlers
//!
//! Commands that touch a project and its tasks together.

use std::sync::Arc;

use uuid::Uuid;

use crate::aggregate::{Aggregate, Project, Task};
use crate::domain::{DomainError, OperationContext};
use crate::error::AppError;
use crate::event_store::EventStore;
use crate::repository::Repository;

use super::children::task_ids_for_project;
use super::{CreateTaskCommand, CreateTaskResult, DeleteProjectCommand, DeleteProjectResult};

async fn live_project(projects: &Repository<Project>, id: Uuid) -> Result<Project, AppError> {
    let project = projects
        .get_by_id(id)
        .await?
        .ok_or(AppError::ProjectNotFound(id))?;

    if project.is_deleted() {
        return Err(DomainError::deleted("Project", id).into());
    }
    Ok(project)
}

/// Handler for creating a task under a live project
pub struct CreateTaskHandler {
    projects: Repository<Project>,
    tasks: Repository<Task>,
}

impl CreateTaskHandler {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            projects: Repository::new(store.clone()),
            tasks: Repository::new(store),
        }
    }

    pub async fn execute(
        &self,
        command: CreateTaskCommand,
        context: &OperationContext,
    ) -> Result<CreateTaskResult, AppError> {
        live_project(&self.projects, command.project_id).await?;

        let mut task = Task::create(
            command.task_id,
            command.project_id,
            command.title,
            command.description,
            command.estimated_hours,
            command.assignee,
            command.due_date,
            context,
        )?;
        self.tasks.save(&mut task).await?;

        tracing::info!(
            task_id = %task.id(),
            project_id = %command.project_id,
            actor = %context.actor,
            "Task created"
        );

        Ok(CreateTaskResult {
            task_id: task.id(),
            project_id: command.project_id,
            version: task.version(),
        })
    }
}

/// Handler for deleting a project and every live task under it
///
/// Each task deletion and the final project deletion are separate appends
/// with no enclosing transaction. A crash part-way leaves some tasks deleted
/// under a live project; running the command again finishes the job because
/// already-deleted tasks no longer show up as children.
pub struct DeleteProjectHandler {
    store: Arc<dyn EventStore>,
    projects: Repository<Project>,
    tasks: Repository<Task>,
}

impl DeleteProjectHandler {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            projects: Repository::new(store.clone()),
            tasks: Repository::new(store.clone()),
            store,
        }
    }

    pub async fn execute(
        &self,
        command: DeleteProjectCommand,
        context: &OperationContext,
    ) -> Result<DeleteProjectResult, AppError> {
        let mut project = live_project(&self.projects, command.project_id).await?;

        let children = task_ids_for_project(&*self.store, command.project_id).await?;
        let mut deleted_tasks = Vec::with_capacity(children.len());

        for task_id in children {
            let mut task = self
                .tasks
                .get_by_id(task_id)
                .await?
                .ok_or(AppError::TaskNotFound(task_id))?;
            if task.is_deleted() {
                continue;
            }

            task.delete(context)?;
            self.tasks.save(&mut task).await?;
            deleted_tasks.push(task_id);
        }

        project.delete(context)?;
        self.projects.save(&mut project).await?;

        tracing::info!(
            project_id = %command.project_id,
            deleted_tasks = deleted_tasks.len(),
            actor = %context.actor,
            "Project deleted"
        );

        Ok(DeleteProjectResult {
            project_id: command.project_id,
            deleted_tasks,
        })
    }
}
