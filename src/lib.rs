//! task_chronicle Library
//!
//! Event-sourced projects and tasks with day-granularity history snapshots
//! for point-in-time reads.

pub mod aggregate;
pub mod domain;
pub mod event_store;
pub mod handlers;
pub mod projection;
pub mod publisher;
pub mod read_model;
pub mod replay;
pub mod repository;
pub mod timezone;

pub mod config;
pub mod db;
mod error;

pub use config::Config;
pub use domain::{DomainError, DomainEvent, EventKind, Hours, OperationContext, RecordedEvent};
pub use error::{AppError, AppResult};
