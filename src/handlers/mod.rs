//! Command Handlers module
//!
//! Command-side helpers that coordinate several aggregates through the
//! repository.

mod children;
mod commands;
mod project_handler;

#[cfg(test)]
mod tests;

pub use children::task_ids_for_project;
pub use commands::*;
pub use project_handler::{CreateTaskHandler, DeleteProjectHandler};
