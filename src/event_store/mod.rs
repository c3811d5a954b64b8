//! Event Store module
//!
//! Persistence layer for Event Sourcing.
//! Handles storing and retrieving events from PostgreSQL, with an in-memory
//! store for tests and embedded use.

mod error;
mod memory;
mod postgres;
mod publishing;
mod store;

pub use error::EventStoreError;
pub use memory::InMemoryEventStore;
pub use postgres::PgEventStore;
pub use publishing::PublishingEventStore;
pub use store::{EventStore, NewEvent, StoredEvent};
