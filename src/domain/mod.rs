//! Domain module
//!
//! Core domain types and business logic.

pub mod context;
pub mod error;
pub mod events;
pub mod hours;

pub use context::OperationContext;
pub use error::DomainError;
pub use events::{
    DomainEvent, EventDecodeError, EventKind, EventPayload, ProjectCreated, ProjectDeleted,
    ProjectEvent, ProjectUpdated, RecordedEvent, TaskCreated, TaskDeleted, TaskEvent, TaskStatus,
    TaskStatusChanged, TaskUpdated,
};
pub use hours::{Hours, HoursError};
