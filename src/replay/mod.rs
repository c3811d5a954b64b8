//! Replay module
//!
//! Full regeneration of the read model from the event log.

mod service;

pub use service::{ReplayError, ReplayService, ReplaySummary};
