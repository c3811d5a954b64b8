//! Error handling module
//!
//! Application-level error type for command handlers and startup.

use uuid::Uuid;

use crate::domain::DomainError;
use crate::event_store::EventStoreError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors
    #[error("Project not found: {0}")]
    ProjectNotFound(Uuid),

    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Version conflict: expected {expected}, found {actual}")]
    VersionConflict { expected: i64, actual: i64 },

    #[error(transparent)]
    Domain(#[from] DomainError),

    // Infrastructure errors
    #[error(transparent)]
    EventStore(EventStoreError),

    #[error(transparent)]
    Replay(#[from] crate::replay::ReplayError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<EventStoreError> for AppError {
    fn from(err: EventStoreError) -> Self {
        match err {
            EventStoreError::ConcurrencyConflict {
                expected, actual, ..
            } => AppError::VersionConflict { expected, actual },
            other => AppError::EventStore(other),
        }
    }
}

impl AppError {
    /// Stable machine-readable code
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::ProjectNotFound(_) => "project_not_found",
            AppError::TaskNotFound(_) => "task_not_found",
            AppError::VersionConflict { .. } => "version_conflict",
            AppError::Domain(domain_err) => match domain_err {
                DomainError::EmptyField(_) => "empty_field",
                DomainError::InvalidHours(_) => "invalid_hours",
                DomainError::InvalidDateRange { .. } => "invalid_date_range",
                DomainError::Deleted { .. } => "deleted",
                DomainError::NotCreated { .. } => "not_created",
                DomainError::OutOfOrder { .. } => "out_of_order",
                DomainError::NoChanges => "no_changes",
                DomainError::BusinessRuleViolation(_) => "business_rule_violation",
            },
            AppError::EventStore(_) => "event_store_error",
            AppError::Replay(_) => "replay_error",
            AppError::Database(_) => "database_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Check if this is a client error (caller's fault)
    pub fn is_client_error(&self) -> bool {
        match self {
            AppError::ProjectNotFound(_)
            | AppError::TaskNotFound(_)
            | AppError::VersionConflict { .. } => true,
            AppError::Domain(domain_err) => domain_err.is_client_error(),
            _ => false,
        }
    }
}
