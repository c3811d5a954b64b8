//! Child derivation
//!
//! There is no project→tasks index on the write side. The live tasks of a
//! project are derived by scanning every `TaskCreated` event and subtracting
//! every `TaskDeleted` event, so each call is O(log size).

use std::collections::HashSet;

use uuid::Uuid;

use crate::domain::{EventKind, TaskEvent};
use crate::event_store::{EventStore, EventStoreError};

/// Ids of the tasks created under `project_id` and not deleted since,
/// in creation order
pub async fn task_ids_for_project(
    store: &dyn EventStore,
    project_id: Uuid,
) -> Result<Vec<Uuid>, EventStoreError> {
    let created = store
        .events_by_type(EventKind::TaskCreated.as_str(), None, None)
        .await?;
    let deleted = store
        .events_by_type(EventKind::TaskDeleted.as_str(), None, None)
        .await?;

    let mut removed = HashSet::new();
    for record in &deleted {
        if let TaskEvent::Deleted(e) = record.decode_as::<TaskEvent>()?.event {
            if e.project_id == project_id {
                removed.insert(record.aggregate_id);
            }
        }
    }

    let mut children = Vec::new();
    for record in &created {
        if let TaskEvent::Created(e) = record.decode_as::<TaskEvent>()?.event {
            if e.project_id == project_id && !removed.contains(&record.aggregate_id) {
                children.push(record.aggregate_id);
            }
        }
    }

    tracing::debug!(
        project_id = %project_id,
        scanned = created.len() + deleted.len(),
        children = children.len(),
        "Derived project children from event log"
    );
    Ok(children)
}
