//! Handler tests against the in-memory event store

use std::sync::Arc;

use uuid::Uuid;

use crate::aggregate::{Aggregate, Project, Task};
use crate::domain::{DomainError, Hours, OperationContext};
use crate::error::AppError;
use crate::event_store::{EventStore, InMemoryEventStore};
use crate::handlers::{
    task_ids_for_project, CreateTaskCommand, CreateTaskHandler, DeleteProjectCommand,
    DeleteProjectHandler,
};
use crate::repository::Repository;

fn store() -> Arc<dyn EventStore> {
    Arc::new(InMemoryEventStore::new())
}

async fn saved_project(store: &Arc<dyn EventStore>) -> Uuid {
    let repo = Repository::<Project>::new(store.clone());
    let mut project = Project::create(
        Uuid::new_v4(),
        "Website relaunch".to_string(),
        None,
        None,
        None,
        &OperationContext::new("alice"),
    )
    .unwrap();
    repo.save(&mut project).await.unwrap();
    project.id()
}

#[test]
fn test_create_task_command_defaults() {
    let project_id = Uuid::new_v4();
    let cmd = CreateTaskCommand::new(project_id, "Design".to_string(), Hours::ZERO)
        .with_assignee("bob".to_string());

    assert_eq!(cmd.project_id, project_id);
    assert_eq!(cmd.assignee.as_deref(), Some("bob"));
    assert!(cmd.description.is_none());
}

#[tokio::test]
async fn test_create_task_requires_existing_project() {
    let handler = CreateTaskHandler::new(store());
    let missing = Uuid::new_v4();

    let err = handler
        .execute(
            CreateTaskCommand::new(missing, "Design".to_string(), Hours::ZERO),
            &OperationContext::new("alice"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::ProjectNotFound(id) if id == missing));
}

#[tokio::test]
async fn test_create_task_under_project() {
    let store = store();
    let project_id = saved_project(&store).await;
    let handler = CreateTaskHandler::new(store.clone());

    let result = handler
        .execute(
            CreateTaskCommand::new(
                project_id,
                "Design".to_string(),
                Hours::from_integer(4).unwrap(),
            ),
            &OperationContext::new("alice"),
        )
        .await
        .unwrap();

    assert_eq!(result.version, 0);
    let task = Repository::<Task>::new(store)
        .get_by_id(result.task_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(task.project_id(), project_id);
}

#[tokio::test]
async fn test_delete_project_cascades_to_tasks_first() {
    let store = store();
    let project_id = saved_project(&store).await;
    let create = CreateTaskHandler::new(store.clone());
    let ctx = OperationContext::new("alice");

    let mut task_ids = Vec::new();
    for title in ["One", "Two"] {
        let result = create
            .execute(
                CreateTaskCommand::new(project_id, title.to_string(), Hours::ZERO),
                &ctx,
            )
            .await
            .unwrap();
        task_ids.push(result.task_id);
    }

    let result = DeleteProjectHandler::new(store.clone())
        .execute(DeleteProjectCommand { project_id }, &ctx)
        .await
        .unwrap();
    assert_eq!(result.deleted_tasks, task_ids);

    let tasks = Repository::<Task>::new(store.clone());
    for id in &task_ids {
        assert!(tasks.get_by_id(*id).await.unwrap().unwrap().is_deleted());
    }
    let project = Repository::<Project>::new(store.clone())
        .get_by_id(project_id)
        .await
        .unwrap()
        .unwrap();
    assert!(project.is_deleted());
    assert!(task_ids_for_project(&*store, project_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_project_twice_is_rejected() {
    let store = store();
    let project_id = saved_project(&store).await;
    let handler = DeleteProjectHandler::new(store);
    let ctx = OperationContext::new("alice");

    handler
        .execute(DeleteProjectCommand { project_id }, &ctx)
        .await
        .unwrap();
    let err = handler
        .execute(DeleteProjectCommand { project_id }, &ctx)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Domain(DomainError::Deleted { .. })));
}
