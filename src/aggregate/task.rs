//! Task Aggregate
//!
//! A unit of work inside a project, with an effort estimate and a workflow
//! status.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::{
    DomainError, Hours, OperationContext, TaskCreated, TaskDeleted, TaskEvent, TaskStatus,
    TaskStatusChanged, TaskUpdated,
};

use super::{Aggregate, AggregateRoot};

/// Field state of a task, compared field-for-field by replay checks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFields {
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub estimated_hours: Hours,
    pub actual_hours: Hours,
    pub assignee: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
}

/// Changes requested for a task
///
/// `None` keeps the current value. For the optional fields `Some(None)`
/// clears it.
#[derive(Debug, Clone, Default)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub estimated_hours: Option<Hours>,
    pub actual_hours: Option<Hours>,
    pub assignee: Option<Option<String>>,
    pub due_date: Option<Option<NaiveDate>>,
}

impl TaskChanges {
    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.estimated_hours.is_none()
            && self.actual_hours.is_none()
            && self.assignee.is_none()
            && self.due_date.is_none()
    }
}

/// Task Aggregate
#[derive(Debug, Clone)]
pub struct Task {
    root: AggregateRoot<TaskEvent>,
    fields: TaskFields,
}

impl Task {
    /// Create a new task in the not-started state
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        id: Uuid,
        project_id: Uuid,
        title: String,
        description: Option<String>,
        estimated_hours: Hours,
        assignee: Option<String>,
        due_date: Option<NaiveDate>,
        context: &OperationContext,
    ) -> Result<Self, DomainError> {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(DomainError::EmptyField("title"));
        }
        if project_id.is_nil() {
            return Err(DomainError::EmptyField("project_id"));
        }

        let mut task = Self::blank(id);
        task.apply(
            TaskEvent::Created(TaskCreated {
                project_id,
                title,
                description,
                status: TaskStatus::NotStarted,
                estimated_hours,
                assignee,
                due_date,
                created_by: context.actor.clone(),
            }),
            context.now(),
        );
        Ok(task)
    }

    /// Edit task details
    pub fn update(
        &mut self,
        changes: TaskChanges,
        context: &OperationContext,
    ) -> Result<(), DomainError> {
        self.ensure_live()?;
        let now = context.now();
        self.ensure_chronological(now)?;

        if changes.is_empty() {
            return Err(DomainError::NoChanges);
        }

        let title = match changes.title {
            Some(title) if title.trim().is_empty() => {
                return Err(DomainError::EmptyField("title"))
            }
            Some(title) => title.trim().to_string(),
            None => self.fields.title.clone(),
        };

        let fields = &self.fields;
        let event = TaskUpdated {
            title,
            description: changes
                .description
                .unwrap_or_else(|| fields.description.clone()),
            estimated_hours: changes.estimated_hours.unwrap_or(fields.estimated_hours),
            actual_hours: changes.actual_hours.unwrap_or(fields.actual_hours),
            assignee: changes.assignee.unwrap_or_else(|| fields.assignee.clone()),
            due_date: changes.due_date.unwrap_or(fields.due_date),
            updated_by: context.actor.clone(),
        };

        self.apply(TaskEvent::Updated(event), now);
        Ok(())
    }

    /// Move the task to another workflow status
    pub fn change_status(
        &mut self,
        status: TaskStatus,
        context: &OperationContext,
    ) -> Result<(), DomainError> {
        self.ensure_live()?;
        let now = context.now();
        self.ensure_chronological(now)?;

        if self.fields.status == status {
            return Err(DomainError::BusinessRuleViolation(format!(
                "Task is already {}",
                status
            )));
        }

        let event = TaskStatusChanged {
            from: self.fields.status,
            to: status,
            changed_by: context.actor.clone(),
        };
        self.apply(TaskEvent::StatusChanged(event), now);
        Ok(())
    }

    /// Logically delete the task
    pub fn delete(&mut self, context: &OperationContext) -> Result<(), DomainError> {
        self.ensure_live()?;
        let now = context.now();
        self.ensure_chronological(now)?;

        let event = TaskDeleted {
            project_id: self.fields.project_id,
            deleted_by: context.actor.clone(),
        };
        self.apply(TaskEvent::Deleted(event), now);
        Ok(())
    }

    fn ensure_live(&self) -> Result<(), DomainError> {
        if self.fields.created_at.is_none() {
            return Err(DomainError::NotCreated { kind: "Task" });
        }
        if self.is_deleted() {
            return Err(DomainError::deleted("Task", self.id()));
        }
        Ok(())
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn fields(&self) -> &TaskFields {
        &self.fields
    }

    pub fn project_id(&self) -> Uuid {
        self.fields.project_id
    }

    pub fn title(&self) -> &str {
        &self.fields.title
    }

    pub fn status(&self) -> TaskStatus {
        self.fields.status
    }

    pub fn estimated_hours(&self) -> Hours {
        self.fields.estimated_hours
    }

    pub fn is_deleted(&self) -> bool {
        self.fields.deleted_at.is_some()
    }
}

impl Aggregate for Task {
    type Event = TaskEvent;

    fn aggregate_type() -> &'static str {
        "Task"
    }

    fn blank(id: Uuid) -> Self {
        Self {
            root: AggregateRoot::new(id),
            fields: TaskFields::default(),
        }
    }

    fn root(&self) -> &AggregateRoot<TaskEvent> {
        &self.root
    }

    fn root_mut(&mut self) -> &mut AggregateRoot<TaskEvent> {
        &mut self.root
    }

    fn when(&mut self, event: &TaskEvent, occurred_at: DateTime<Utc>) {
        let fields = &mut self.fields;
        match event {
            TaskEvent::Created(e) => {
                fields.project_id = e.project_id;
                fields.title = e.title.clone();
                fields.description = e.description.clone();
                fields.status = e.status;
                fields.estimated_hours = e.estimated_hours;
                fields.actual_hours = Hours::ZERO;
                fields.assignee = e.assignee.clone();
                fields.due_date = e.due_date;
                fields.created_at = Some(occurred_at);
                fields.created_by = Some(e.created_by.clone());
                fields.updated_at = Some(occurred_at);
                fields.updated_by = Some(e.created_by.clone());
            }

            TaskEvent::Updated(e) => {
                fields.title = e.title.clone();
                fields.description = e.description.clone();
                fields.estimated_hours = e.estimated_hours;
                fields.actual_hours = e.actual_hours;
                fields.assignee = e.assignee.clone();
                fields.due_date = e.due_date;
                fields.updated_at = Some(occurred_at);
                fields.updated_by = Some(e.updated_by.clone());
            }

            TaskEvent::StatusChanged(e) => {
                fields.status = e.to;
                fields.updated_at = Some(occurred_at);
                fields.updated_by = Some(e.changed_by.clone());
            }

            TaskEvent::Deleted(e) => {
                fields.deleted_at = Some(occurred_at);
                fields.deleted_by = Some(e.deleted_by.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn ctx(hour: u32) -> OperationContext {
        OperationContext::new("bob").at(Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap())
    }

    fn new_task() -> Task {
        Task::create(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Write parser".to_string(),
            None,
            Hours::from_integer(40).unwrap(),
            Some("carol".to_string()),
            None,
            &ctx(10),
        )
        .unwrap()
    }

    #[test]
    fn test_task_create() {
        let task = new_task();

        assert_eq!(task.title(), "Write parser");
        assert_eq!(task.status(), TaskStatus::NotStarted);
        assert_eq!(task.estimated_hours().value(), dec!(40));
        assert_eq!(task.pending_events().len(), 1);
    }

    #[test]
    fn test_task_create_requires_title() {
        let result = Task::create(
            Uuid::new_v4(),
            Uuid::new_v4(),
            String::new(),
            None,
            Hours::ZERO,
            None,
            None,
            &ctx(10),
        );
        assert_eq!(result.unwrap_err(), DomainError::EmptyField("title"));
    }

    #[test]
    fn test_task_create_requires_project() {
        let result = Task::create(
            Uuid::new_v4(),
            Uuid::nil(),
            "Orphan".to_string(),
            None,
            Hours::ZERO,
            None,
            None,
            &ctx(10),
        );
        assert_eq!(result.unwrap_err(), DomainError::EmptyField("project_id"));
    }

    #[test]
    fn test_change_status() {
        let mut task = new_task();
        task.change_status(TaskStatus::InProgress, &ctx(14)).unwrap();

        assert_eq!(task.status(), TaskStatus::InProgress);
        assert_eq!(task.fields().updated_by.as_deref(), Some("bob"));
        match &task.pending_events()[1].event {
            TaskEvent::StatusChanged(e) => {
                assert_eq!(e.from, TaskStatus::NotStarted);
                assert_eq!(e.to, TaskStatus::InProgress);
            }
            other => panic!("Expected StatusChanged, got {:?}", other),
        }
    }

    #[test]
    fn test_change_to_same_status_is_rejected() {
        let mut task = new_task();
        let result = task.change_status(TaskStatus::NotStarted, &ctx(14));
        assert!(matches!(result, Err(DomainError::BusinessRuleViolation(_))));
        assert_eq!(task.pending_events().len(), 1);
    }

    #[test]
    fn test_update_records_actual_hours() {
        let mut task = new_task();
        task.update(
            TaskChanges {
                actual_hours: Some(Hours::new(dec!(12.5)).unwrap()),
                ..Default::default()
            },
            &ctx(15),
        )
        .unwrap();

        assert_eq!(task.fields().actual_hours.value(), dec!(12.5));
        assert_eq!(task.fields().assignee.as_deref(), Some("carol"));
    }

    #[test]
    fn test_update_can_clear_optional_fields() {
        let mut task = new_task();
        task.update(
            TaskChanges {
                assignee: Some(None),
                due_date: Some(NaiveDate::from_ymd_opt(2024, 6, 1)),
                ..Default::default()
            },
            &ctx(11),
        )
        .unwrap();
        assert_eq!(task.fields().assignee, None);
        assert_eq!(task.fields().due_date, NaiveDate::from_ymd_opt(2024, 6, 1));

        task.update(
            TaskChanges {
                due_date: Some(None),
                ..Default::default()
            },
            &ctx(12),
        )
        .unwrap();
        assert_eq!(task.fields().due_date, None);
    }

    #[test]
    fn test_backdated_command_is_rejected() {
        let mut task = new_task();

        let result = task.change_status(TaskStatus::InProgress, &ctx(5));

        assert!(matches!(result, Err(DomainError::OutOfOrder { .. })));
        assert_eq!(task.status(), TaskStatus::NotStarted);
        assert_eq!(task.pending_events().len(), 1);

        // Same instant as the previous event is accepted
        task.change_status(TaskStatus::InProgress, &ctx(10)).unwrap();
        assert!(matches!(
            task.delete(&ctx(9)),
            Err(DomainError::OutOfOrder { .. })
        ));
    }

    #[test]
    fn test_deleted_task_rejects_status_change() {
        let mut task = new_task();
        task.delete(&ctx(16)).unwrap();

        let result = task.change_status(TaskStatus::Done, &ctx(17));
        assert!(matches!(result, Err(DomainError::Deleted { kind: "Task", .. })));
    }

    #[test]
    fn test_replay_matches_live_state() {
        let mut live = new_task();
        live.change_status(TaskStatus::InProgress, &ctx(11)).unwrap();
        live.update(
            TaskChanges {
                title: Some("Write lexer and parser".to_string()),
                estimated_hours: Some(Hours::from_integer(60).unwrap()),
                ..Default::default()
            },
            &ctx(12),
        )
        .unwrap();
        live.change_status(TaskStatus::Done, &ctx(13)).unwrap();

        let mut replayed = Task::blank(live.id());
        replayed.replay(live.pending_events().to_vec());

        assert_eq!(replayed.fields(), live.fields());
        assert_eq!(replayed.version(), 3);
    }
}
