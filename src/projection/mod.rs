//! Projection module
//!
//! Updates read-model tables (projections) from events.
//! Projections are optimized for queries and derived from events.

mod handlers;
mod queries;
mod snapshot;

use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::EventKind;
use crate::publisher::EventPublisher;
use crate::read_model::ReadModel;

pub use handlers::{ProjectProjection, TaskProjection};
pub use queries::ReadModelQueries;
pub use snapshot::{SnapshotPolicy, SnapshotWrite};

/// Projection errors
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{kind} not found in read model: {id}")]
    MissingRow { kind: &'static str, id: Uuid },

    #[error("Snapshot already exists for {entity_id} on {snapshot_date}")]
    DuplicateSnapshot {
        entity_id: Uuid,
        snapshot_date: NaiveDate,
    },

    #[error("Invalid read-model row: {0}")]
    InvalidRow(String),

    #[error("Handler received unexpected event type: {0}")]
    UnexpectedEvent(EventKind),
}

impl ProjectionError {
    /// Map an insert failure on a history table, reporting a unique
    /// violation as a duplicate snapshot
    pub(crate) fn from_insert(err: sqlx::Error, entity_id: Uuid, snapshot_date: NaiveDate) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ProjectionError::DuplicateSnapshot {
                    entity_id,
                    snapshot_date,
                }
            }
            _ => ProjectionError::Database(err),
        }
    }
}

/// Subscribe one projection handler to every event kind
pub fn register_all(publisher: &EventPublisher, read_model: &ReadModel, policy: SnapshotPolicy) {
    let projects = Arc::new(ProjectProjection::new(
        read_model.projects.clone(),
        read_model.project_history.clone(),
        policy,
    ));
    let tasks = Arc::new(TaskProjection::new(
        read_model.tasks.clone(),
        read_model.task_history.clone(),
        policy,
    ));

    for kind in EventKind::ALL {
        match kind.aggregate_type() {
            "Project" => publisher.subscribe(kind, projects.clone()),
            _ => publisher.subscribe(kind, tasks.clone()),
        }
    }

    tracing::info!(
        event_types = EventKind::ALL.len(),
        "Projection handlers registered"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_error_display() {
        let err = ProjectionError::MissingRow {
            kind: "Task",
            id: Uuid::nil(),
        };
        assert!(err.to_string().contains("Task not found"));

        let err = ProjectionError::UnexpectedEvent(EventKind::ProjectCreated);
        assert!(err.to_string().contains("ProjectCreated"));
    }

    #[test]
    fn test_register_all_subscribes_every_kind_once() {
        let publisher = EventPublisher::new();
        register_all(&publisher, &ReadModel::in_memory(), SnapshotPolicy::default());

        for kind in EventKind::ALL {
            assert_eq!(publisher.subscriber_count(kind), 1, "{kind}");
        }
    }
}
