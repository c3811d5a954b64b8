//! Domain Events
//!
//! Event definitions for Event Sourcing.
//! Events are immutable facts that have happened in the system.
//!
//! The wire discriminator of every event is an [`EventKind`] tag. Tags are a
//! stable schema identifier: they are listed once in [`EventKind::as_str`] and
//! never derived from Rust type names, so renaming a type does not orphan
//! stored events.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use super::Hours;

// =========================================================================
// Event kinds (type tag registry)
// =========================================================================

/// Every event type known to the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    ProjectCreated,
    ProjectUpdated,
    ProjectDeleted,
    TaskCreated,
    TaskUpdated,
    TaskStatusChanged,
    TaskDeleted,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::ProjectCreated,
        EventKind::ProjectUpdated,
        EventKind::ProjectDeleted,
        EventKind::TaskCreated,
        EventKind::TaskUpdated,
        EventKind::TaskStatusChanged,
        EventKind::TaskDeleted,
    ];

    /// Stable tag written to the `event_type` column
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ProjectCreated => "ProjectCreated",
            EventKind::ProjectUpdated => "ProjectUpdated",
            EventKind::ProjectDeleted => "ProjectDeleted",
            EventKind::TaskCreated => "TaskCreated",
            EventKind::TaskUpdated => "TaskUpdated",
            EventKind::TaskStatusChanged => "TaskStatusChanged",
            EventKind::TaskDeleted => "TaskDeleted",
        }
    }

    /// Aggregate type that emits this kind of event
    pub fn aggregate_type(&self) -> &'static str {
        match self {
            EventKind::ProjectCreated | EventKind::ProjectUpdated | EventKind::ProjectDeleted => {
                "Project"
            }
            _ => "Task",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = EventDecodeError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == tag)
            .ok_or_else(|| EventDecodeError::UnknownType(tag.to_string()))
    }
}

/// Errors raised when turning a stored record back into a typed event
#[derive(Debug, thiserror::Error)]
pub enum EventDecodeError {
    #[error("Unknown event type: {0}")]
    UnknownType(String),

    #[error("Event type {kind} does not belong to aggregate {aggregate_type}")]
    WrongAggregate {
        kind: EventKind,
        aggregate_type: &'static str,
    },

    #[error("Malformed {kind} payload: {source}")]
    Payload {
        kind: EventKind,
        #[source]
        source: serde_json::Error,
    },
}

/// Event enums that can be written to and read back from the store.
pub trait EventPayload: Clone + Send + Sync + Sized + 'static {
    /// The tag this event is stored under
    fn kind(&self) -> EventKind;

    /// Serialize the payload fields (without the tag)
    fn encode(&self) -> Result<serde_json::Value, serde_json::Error>;

    /// Resolve a stored tag and payload back into a typed event
    fn decode(kind: EventKind, payload: &serde_json::Value) -> Result<Self, EventDecodeError>;
}

fn payload<T: DeserializeOwned>(
    kind: EventKind,
    value: &serde_json::Value,
) -> Result<T, EventDecodeError> {
    T::deserialize(value).map_err(|source| EventDecodeError::Payload { kind, source })
}

// =========================================================================
// Project events
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectCreated {
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_by: String,
}

/// Carries the complete set of mutable fields after the update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectUpdated {
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub updated_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDeleted {
    pub deleted_by: String,
}

/// Project-related events
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectEvent {
    Created(ProjectCreated),
    Updated(ProjectUpdated),
    Deleted(ProjectDeleted),
}

impl EventPayload for ProjectEvent {
    fn kind(&self) -> EventKind {
        match self {
            ProjectEvent::Created(_) => EventKind::ProjectCreated,
            ProjectEvent::Updated(_) => EventKind::ProjectUpdated,
            ProjectEvent::Deleted(_) => EventKind::ProjectDeleted,
        }
    }

    fn encode(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            ProjectEvent::Created(e) => serde_json::to_value(e),
            ProjectEvent::Updated(e) => serde_json::to_value(e),
            ProjectEvent::Deleted(e) => serde_json::to_value(e),
        }
    }

    fn decode(kind: EventKind, value: &serde_json::Value) -> Result<Self, EventDecodeError> {
        match kind {
            EventKind::ProjectCreated => payload(kind, value).map(ProjectEvent::Created),
            EventKind::ProjectUpdated => payload(kind, value).map(ProjectEvent::Updated),
            EventKind::ProjectDeleted => payload(kind, value).map(ProjectEvent::Deleted),
            other => Err(EventDecodeError::WrongAggregate {
                kind: other,
                aggregate_type: "Project",
            }),
        }
    }
}

// =========================================================================
// Task events
// =========================================================================

/// Task workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    NotStarted,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::NotStarted => "not_started",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(TaskStatus::NotStarted),
            "in_progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCreated {
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub estimated_hours: Hours,
    pub assignee: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub created_by: String,
}

/// Carries the complete set of editable fields after the update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskUpdated {
    pub title: String,
    pub description: Option<String>,
    pub estimated_hours: Hours,
    pub actual_hours: Hours,
    pub assignee: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub updated_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusChanged {
    pub from: TaskStatus,
    pub to: TaskStatus,
    pub changed_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDeleted {
    pub project_id: Uuid,
    pub deleted_by: String,
}

/// Task-related events
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    Created(TaskCreated),
    Updated(TaskUpdated),
    StatusChanged(TaskStatusChanged),
    Deleted(TaskDeleted),
}

impl EventPayload for TaskEvent {
    fn kind(&self) -> EventKind {
        match self {
            TaskEvent::Created(_) => EventKind::TaskCreated,
            TaskEvent::Updated(_) => EventKind::TaskUpdated,
            TaskEvent::StatusChanged(_) => EventKind::TaskStatusChanged,
            TaskEvent::Deleted(_) => EventKind::TaskDeleted,
        }
    }

    fn encode(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            TaskEvent::Created(e) => serde_json::to_value(e),
            TaskEvent::Updated(e) => serde_json::to_value(e),
            TaskEvent::StatusChanged(e) => serde_json::to_value(e),
            TaskEvent::Deleted(e) => serde_json::to_value(e),
        }
    }

    fn decode(kind: EventKind, value: &serde_json::Value) -> Result<Self, EventDecodeError> {
        match kind {
            EventKind::TaskCreated => payload(kind, value).map(TaskEvent::Created),
            EventKind::TaskUpdated => payload(kind, value).map(TaskEvent::Updated),
            EventKind::TaskStatusChanged => payload(kind, value).map(TaskEvent::StatusChanged),
            EventKind::TaskDeleted => payload(kind, value).map(TaskEvent::Deleted),
            other => Err(EventDecodeError::WrongAggregate {
                kind: other,
                aggregate_type: "Task",
            }),
        }
    }
}

// =========================================================================
// Published form
// =========================================================================

/// Any event in the system
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    Project(ProjectEvent),
    Task(TaskEvent),
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::Project(e) => e.kind(),
            DomainEvent::Task(e) => e.kind(),
        }
    }

    /// Resolve a stored tag and payload through the tag registry
    pub fn decode(tag: &str, value: &serde_json::Value) -> Result<Self, EventDecodeError> {
        let kind: EventKind = tag.parse()?;
        match kind.aggregate_type() {
            "Project" => ProjectEvent::decode(kind, value).map(DomainEvent::Project),
            _ => TaskEvent::decode(kind, value).map(DomainEvent::Task),
        }
    }
}

impl From<ProjectEvent> for DomainEvent {
    fn from(event: ProjectEvent) -> Self {
        DomainEvent::Project(event)
    }
}

impl From<TaskEvent> for DomainEvent {
    fn from(event: TaskEvent) -> Self {
        DomainEvent::Task(event)
    }
}

/// A typed event together with its envelope, as dispatched to projections
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub event: DomainEvent,
}

impl RecordedEvent {
    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_every_kind_round_trips_through_its_tag() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let err = "TaskArchived".parse::<EventKind>().unwrap_err();
        assert!(matches!(err, EventDecodeError::UnknownType(tag) if tag == "TaskArchived"));
    }

    #[test]
    fn test_payload_preserves_field_names() {
        let event = TaskEvent::StatusChanged(TaskStatusChanged {
            from: TaskStatus::NotStarted,
            to: TaskStatus::InProgress,
            changed_by: "alice".to_string(),
        });

        let value = event.encode().unwrap();
        assert_eq!(
            value,
            json!({"from": "not_started", "to": "in_progress", "changed_by": "alice"})
        );
    }

    #[test]
    fn test_decode_dispatches_on_tag() {
        let value = json!({"deleted_by": "bob"});
        let event = DomainEvent::decode("ProjectDeleted", &value).unwrap();
        assert_eq!(
            event,
            DomainEvent::Project(ProjectEvent::Deleted(ProjectDeleted {
                deleted_by: "bob".to_string()
            }))
        );
    }

    #[test]
    fn test_decode_rejects_malformed_payload() {
        let err = DomainEvent::decode("TaskCreated", &json!({"title": 3})).unwrap_err();
        assert!(matches!(
            err,
            EventDecodeError::Payload { kind: EventKind::TaskCreated, .. }
        ));
    }

    #[test]
    fn test_decode_rejects_foreign_kind() {
        let err = ProjectEvent::decode(EventKind::TaskDeleted, &json!({})).unwrap_err();
        assert!(matches!(err, EventDecodeError::WrongAggregate { .. }));
    }

    #[test]
    fn test_task_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            r#""in_progress""#
        );
        assert_eq!("done".parse::<TaskStatus>().unwrap(), TaskStatus::Done);
        assert!("finished".parse::<TaskStatus>().is_err());
    }
}
