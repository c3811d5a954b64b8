//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use thiserror::Error;

use super::HoursError;

/// Domain-specific errors
///
/// Raised by aggregate business methods before any event is constructed.
/// Replaying already-accepted events never produces one of these.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// A required field was empty
    #[error("Field '{0}' must not be empty")]
    EmptyField(&'static str),

    /// Invalid effort value
    #[error("Invalid hours: {0}")]
    InvalidHours(#[from] HoursError),

    /// End date precedes start date
    #[error("End date {end} is before start date {start}")]
    InvalidDateRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    /// Operation on an entity that was deleted
    #[error("{kind} {id} has been deleted")]
    Deleted { kind: &'static str, id: uuid::Uuid },

    /// Operation on an entity that was never created
    #[error("{kind} has not been created")]
    NotCreated { kind: &'static str },

    /// Event instant earlier than the entity's latest event
    #[error("Operation at {attempted} precedes the latest event at {last}")]
    OutOfOrder {
        last: chrono::DateTime<chrono::Utc>,
        attempted: chrono::DateTime<chrono::Utc>,
    },

    /// A change request that would not change anything
    #[error("No changes provided")]
    NoChanges,

    /// Business rule violation
    #[error("Business rule violation: {0}")]
    BusinessRuleViolation(String),
}

impl DomainError {
    pub fn deleted(kind: &'static str, id: uuid::Uuid) -> Self {
        Self::Deleted { kind, id }
    }

    /// Check if this is a client error (caller's fault)
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::NotCreated { .. })
    }
}
