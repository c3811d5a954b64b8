//! Project Aggregate
//!
//! A project groups tasks. Deleting a project is logical: the aggregate keeps
//! its history and refuses further changes.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::{
    DomainError, OperationContext, ProjectCreated, ProjectDeleted, ProjectEvent, ProjectUpdated,
};

use super::{Aggregate, AggregateRoot};

/// Field state of a project, compared field-for-field by replay checks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectFields {
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<String>,
}

/// Changes requested for a project
///
/// `None` keeps the current value; `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default)]
pub struct ProjectChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub start_date: Option<Option<NaiveDate>>,
    pub end_date: Option<Option<NaiveDate>>,
}

/// Project Aggregate
#[derive(Debug, Clone)]
pub struct Project {
    root: AggregateRoot<ProjectEvent>,
    fields: ProjectFields,
}

fn validate_dates(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<(), DomainError> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => {
            Err(DomainError::InvalidDateRange { start, end })
        }
        _ => Ok(()),
    }
}

impl Project {
    /// Create a new project and buffer its creation event
    pub fn create(
        id: Uuid,
        name: String,
        description: Option<String>,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        context: &OperationContext,
    ) -> Result<Self, DomainError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::EmptyField("name"));
        }
        validate_dates(start_date, end_date)?;

        let mut project = Self::blank(id);
        project.apply(
            ProjectEvent::Created(ProjectCreated {
                name,
                description,
                start_date,
                end_date,
                created_by: context.actor.clone(),
            }),
            context.now(),
        );
        Ok(project)
    }

    /// Update project details
    pub fn update(
        &mut self,
        changes: ProjectChanges,
        context: &OperationContext,
    ) -> Result<(), DomainError> {
        self.ensure_live()?;
        let now = context.now();
        self.ensure_chronological(now)?;

        if changes.name.is_none()
            && changes.description.is_none()
            && changes.start_date.is_none()
            && changes.end_date.is_none()
        {
            return Err(DomainError::NoChanges);
        }

        let name = match changes.name {
            Some(name) if name.trim().is_empty() => return Err(DomainError::EmptyField("name")),
            Some(name) => name.trim().to_string(),
            None => self.fields.name.clone(),
        };
        let start_date = changes.start_date.unwrap_or(self.fields.start_date);
        let end_date = changes.end_date.unwrap_or(self.fields.end_date);
        validate_dates(start_date, end_date)?;
        let description = changes
            .description
            .unwrap_or_else(|| self.fields.description.clone());

        self.apply(
            ProjectEvent::Updated(ProjectUpdated {
                name,
                description,
                start_date,
                end_date,
                updated_by: context.actor.clone(),
            }),
            now,
        );
        Ok(())
    }

    /// Logically delete the project
    ///
    /// Tasks are not touched; the caller deletes them first.
    pub fn delete(&mut self, context: &OperationContext) -> Result<(), DomainError> {
        self.ensure_live()?;
        let now = context.now();
        self.ensure_chronological(now)?;

        self.apply(
            ProjectEvent::Deleted(ProjectDeleted {
                deleted_by: context.actor.clone(),
            }),
            now,
        );
        Ok(())
    }

    fn ensure_live(&self) -> Result<(), DomainError> {
        if self.fields.created_at.is_none() {
            return Err(DomainError::NotCreated { kind: "Project" });
        }
        if self.is_deleted() {
            return Err(DomainError::deleted("Project", self.id()));
        }
        Ok(())
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn fields(&self) -> &ProjectFields {
        &self.fields
    }

    pub fn name(&self) -> &str {
        &self.fields.name
    }

    pub fn description(&self) -> Option<&str> {
        self.fields.description.as_deref()
    }

    pub fn is_deleted(&self) -> bool {
        self.fields.deleted_at.is_some()
    }
}

impl Aggregate for Project {
    type Event = ProjectEvent;

    fn aggregate_type() -> &'static str {
        "Project"
    }

    fn blank(id: Uuid) -> Self {
        Self {
            root: AggregateRoot::new(id),
            fields: ProjectFields::default(),
        }
    }

    fn root(&self) -> &AggregateRoot<ProjectEvent> {
        &self.root
    }

    fn root_mut(&mut self) -> &mut AggregateRoot<ProjectEvent> {
        &mut self.root
    }

    fn when(&mut self, event: &ProjectEvent, occurred_at: DateTime<Utc>) {
        let fields = &mut self.fields;
        match event {
            ProjectEvent::Created(e) => {
                fields.name = e.name.clone();
                fields.description = e.description.clone();
                fields.start_date = e.start_date;
                fields.end_date = e.end_date;
                fields.created_at = Some(occurred_at);
                fields.created_by = Some(e.created_by.clone());
                fields.updated_at = Some(occurred_at);
                fields.updated_by = Some(e.created_by.clone());
            }

            ProjectEvent::Updated(e) => {
                fields.name = e.name.clone();
                fields.description = e.description.clone();
                fields.start_date = e.start_date;
                fields.end_date = e.end_date;
                fields.updated_at = Some(occurred_at);
                fields.updated_by = Some(e.updated_by.clone());
            }

            ProjectEvent::Deleted(e) => {
                fields.deleted_at = Some(occurred_at);
                fields.deleted_by = Some(e.deleted_by.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::EventEnvelope;
    use chrono::TimeZone;

    fn ctx(hour: u32) -> OperationContext {
        OperationContext::new("alice").at(Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap())
    }

    fn new_project() -> Project {
        Project::create(
            Uuid::new_v4(),
            "Apollo".to_string(),
            Some("Moonshot".to_string()),
            NaiveDate::from_ymd_opt(2024, 5, 1),
            NaiveDate::from_ymd_opt(2024, 9, 30),
            &ctx(9),
        )
        .unwrap()
    }

    #[test]
    fn test_project_create() {
        let project = new_project();

        assert_eq!(project.name(), "Apollo");
        assert_eq!(project.description(), Some("Moonshot"));
        assert_eq!(project.version(), -1);
        assert_eq!(project.pending_events().len(), 1);
        assert!(matches!(
            project.pending_events()[0].event,
            ProjectEvent::Created(_)
        ));
        assert_eq!(project.fields().created_by.as_deref(), Some("alice"));
    }

    #[test]
    fn test_project_create_requires_name() {
        let result = Project::create(Uuid::new_v4(), "  ".to_string(), None, None, None, &ctx(9));
        assert_eq!(result.unwrap_err(), DomainError::EmptyField("name"));
    }

    #[test]
    fn test_project_create_rejects_inverted_dates() {
        let result = Project::create(
            Uuid::new_v4(),
            "Apollo".to_string(),
            None,
            NaiveDate::from_ymd_opt(2024, 9, 30),
            NaiveDate::from_ymd_opt(2024, 5, 1),
            &ctx(9),
        );
        assert!(matches!(result, Err(DomainError::InvalidDateRange { .. })));
    }

    #[test]
    fn test_project_update_keeps_unchanged_fields() {
        let mut project = new_project();
        project
            .update(
                ProjectChanges {
                    name: Some("Artemis".to_string()),
                    ..Default::default()
                },
                &ctx(10),
            )
            .unwrap();

        assert_eq!(project.name(), "Artemis");
        assert_eq!(project.description(), Some("Moonshot"));
        assert_eq!(project.pending_events().len(), 2);
    }

    #[test]
    fn test_project_update_without_changes_fails() {
        let mut project = new_project();
        let result = project.update(ProjectChanges::default(), &ctx(10));
        assert_eq!(result.unwrap_err(), DomainError::NoChanges);
        assert_eq!(project.pending_events().len(), 1);
    }

    #[test]
    fn test_project_update_clears_dates_and_description() {
        let mut project = new_project();
        project
            .update(
                ProjectChanges {
                    description: Some(None),
                    end_date: Some(None),
                    ..Default::default()
                },
                &ctx(10),
            )
            .unwrap();

        assert_eq!(project.description(), None);
        assert_eq!(project.fields().end_date, None);
        assert_eq!(project.fields().start_date, NaiveDate::from_ymd_opt(2024, 5, 1));
    }

    #[test]
    fn test_project_update_checks_combined_dates() {
        let mut project = new_project();
        let result = project.update(
            ProjectChanges {
                start_date: Some(NaiveDate::from_ymd_opt(2024, 10, 1)),
                ..Default::default()
            },
            &ctx(10),
        );
        assert!(matches!(result, Err(DomainError::InvalidDateRange { .. })));
    }

    #[test]
    fn test_replayed_project_rejects_backdated_delete() {
        let live = new_project();
        let mut replayed = Project::blank(live.id());
        replayed.replay(live.pending_events().to_vec());

        let result = replayed.delete(&ctx(8));
        assert!(matches!(result, Err(DomainError::OutOfOrder { .. })));
        assert!(!replayed.is_deleted());
    }

    #[test]
    fn test_deleted_project_rejects_changes() {
        let mut project = new_project();
        project.delete(&ctx(11)).unwrap();
        assert!(project.is_deleted());

        assert!(matches!(
            project.delete(&ctx(12)),
            Err(DomainError::Deleted { .. })
        ));
        assert!(matches!(
            project.update(
                ProjectChanges {
                    name: Some("Gemini".to_string()),
                    ..Default::default()
                },
                &ctx(12)
            ),
            Err(DomainError::Deleted { .. })
        ));
    }

    #[test]
    fn test_replay_matches_live_state() {
        let mut live = new_project();
        live.update(
            ProjectChanges {
                description: Some(Some("Crewed landing".to_string())),
                ..Default::default()
            },
            &ctx(13),
        )
        .unwrap();
        live.delete(&ctx(14)).unwrap();

        let history: Vec<EventEnvelope<ProjectEvent>> = live.pending_events().to_vec();
        let mut replayed = Project::blank(live.id());
        replayed.replay(history);

        assert_eq!(replayed.fields(), live.fields());
        assert_eq!(replayed.version(), 2);
    }
}
