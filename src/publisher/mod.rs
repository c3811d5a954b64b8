//! Publisher module
//!
//! Routes stored events to the projection handlers subscribed to them.

mod event_publisher;

pub use event_publisher::{EventHandler, EventPublisher, ExclusivePublisher, PublishReport};
