//! In-memory event store
//!
//! Thread-safe implementation of [`EventStore`] for tests and embedded use.
//! The version check and the insert happen under one write lock, which is
//! the in-process equivalent of the database transaction.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use super::{EventStore, EventStoreError, NewEvent, StoredEvent};

#[derive(Default)]
struct Inner {
    /// Every event in storage order
    log: Vec<StoredEvent>,
    versions: HashMap<Uuid, i64>,
}

/// Event store that keeps the log in a vector
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored events
    pub fn len(&self) -> usize {
        self.inner.read().log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn select<F>(&self, filter: F) -> Vec<StoredEvent>
    where
        F: Fn(&StoredEvent) -> bool,
    {
        self.inner
            .read()
            .log
            .iter()
            .filter(|e| filter(e))
            .cloned()
            .collect()
    }
}

fn by_time(mut events: Vec<StoredEvent>) -> Vec<StoredEvent> {
    // Stable sort keeps storage order among equal instants
    events.sort_by_key(|e| e.occurred_at);
    events
}

fn by_version(mut events: Vec<StoredEvent>) -> Vec<StoredEvent> {
    events.sort_by_key(|e| e.version);
    events
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
        events: Vec<NewEvent>,
        expected_version: i64,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let mut inner = self.inner.write();

        let current_version = inner.versions.get(&aggregate_id).copied().unwrap_or(-1);
        if current_version != expected_version {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual: current_version,
            });
        }

        let stored_at = Utc::now();
        let mut stored = Vec::with_capacity(events.len());
        for (offset, event) in events.into_iter().enumerate() {
            let record = StoredEvent {
                event_id: event.event_id,
                aggregate_type: aggregate_type.to_string(),
                aggregate_id,
                version: expected_version + 1 + offset as i64,
                event_type: event.event_type,
                payload: event.payload,
                occurred_at: event.occurred_at,
                position: inner.log.len() as i64 + 1,
                stored_at,
            };
            inner.log.push(record.clone());
            stored.push(record);
        }

        let last_version = expected_version + stored.len() as i64;
        inner.versions.insert(aggregate_id, last_version);
        drop(inner);

        tracing::debug!(
            aggregate_type,
            aggregate_id = %aggregate_id,
            from_version = expected_version + 1,
            count = stored.len(),
            "Appended events"
        );

        Ok(stored)
    }

    async fn stream_version(&self, aggregate_id: Uuid) -> Result<i64, EventStoreError> {
        Ok(self
            .inner
            .read()
            .versions
            .get(&aggregate_id)
            .copied()
            .unwrap_or(-1))
    }

    async fn events_for(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, EventStoreError> {
        Ok(by_version(self.select(|e| e.aggregate_id == aggregate_id)))
    }

    async fn events_until(
        &self,
        aggregate_id: Uuid,
        point_in_time: DateTime<Utc>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        Ok(by_version(self.select(|e| {
            e.aggregate_id == aggregate_id && e.occurred_at <= point_in_time
        })))
    }

    async fn events_by_type(
        &self,
        event_type: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        Ok(by_time(self.select(|e| {
            e.event_type == event_type
                && from.map_or(true, |from| e.occurred_at >= from)
                && to.map_or(true, |to| e.occurred_at <= to)
        })))
    }

    async fn all_events(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        Ok(by_time(self.select(|_| true)))
    }

    async fn has_events(&self) -> Result<bool, EventStoreError> {
        Ok(!self.inner.read().log.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn event(tag: &str, occurred_at: DateTime<Utc>) -> NewEvent {
        NewEvent {
            event_id: Uuid::new_v4(),
            event_type: tag.to_string(),
            payload: json!({}),
            occurred_at,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_append_assigns_contiguous_versions() {
        let store = InMemoryEventStore::new();
        let id = Uuid::new_v4();

        let first = store
            .append("Task", id, vec![event("TaskCreated", t0())], -1)
            .await
            .unwrap();
        assert_eq!(first[0].version, 0);

        let next = store
            .append(
                "Task",
                id,
                vec![event("TaskUpdated", t0()), event("TaskUpdated", t0())],
                0,
            )
            .await
            .unwrap();
        assert_eq!(next.iter().map(|e| e.version).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(store.stream_version(id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_conflict_writes_nothing() {
        let store = InMemoryEventStore::new();
        let id = Uuid::new_v4();
        store
            .append("Task", id, vec![event("TaskCreated", t0())], -1)
            .await
            .unwrap();

        let err = store
            .append(
                "Task",
                id,
                vec![event("TaskUpdated", t0()), event("TaskUpdated", t0())],
                -1,
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EventStoreError::ConcurrencyConflict { expected: -1, actual: 0, .. }
        ));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_append_is_noop() {
        let store = InMemoryEventStore::new();
        let stored = store.append("Task", Uuid::new_v4(), vec![], 5).await.unwrap();
        assert!(stored.is_empty());
        assert!(!store.has_events().await.unwrap());
    }

    #[tokio::test]
    async fn test_events_until_cuts_at_instant() {
        let store = InMemoryEventStore::new();
        let id = Uuid::new_v4();
        let events = (0..3)
            .map(|h| event("TaskUpdated", t0() + Duration::hours(h)))
            .collect();
        store.append("Task", id, events, -1).await.unwrap();

        let until = store
            .events_until(id, t0() + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(until.len(), 2);
        assert_eq!(until[1].version, 1);
    }

    #[tokio::test]
    async fn test_all_events_orders_by_time_then_storage() {
        let store = InMemoryEventStore::new();
        let late = Uuid::new_v4();
        let early = Uuid::new_v4();
        let tie = Uuid::new_v4();

        store
            .append("Task", late, vec![event("TaskCreated", t0() + Duration::hours(2))], -1)
            .await
            .unwrap();
        store
            .append("Task", early, vec![event("TaskCreated", t0())], -1)
            .await
            .unwrap();
        store
            .append("Task", tie, vec![event("TaskCreated", t0())], -1)
            .await
            .unwrap();

        let order: Vec<Uuid> = store
            .all_events()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.aggregate_id)
            .collect();
        assert_eq!(order, vec![early, tie, late]);
    }

    #[tokio::test]
    async fn test_events_by_type_filters_window() {
        let store = InMemoryEventStore::new();
        for h in 0..4 {
            store
                .append(
                    "Task",
                    Uuid::new_v4(),
                    vec![event("TaskCreated", t0() + Duration::hours(h))],
                    -1,
                )
                .await
                .unwrap();
        }
        store
            .append("Project", Uuid::new_v4(), vec![event("ProjectCreated", t0())], -1)
            .await
            .unwrap();

        let all = store.events_by_type("TaskCreated", None, None).await.unwrap();
        assert_eq!(all.len(), 4);

        let window = store
            .events_by_type(
                "TaskCreated",
                Some(t0() + Duration::hours(1)),
                Some(t0() + Duration::hours(2)),
            )
            .await
            .unwrap();
        assert_eq!(window.len(), 2);
    }
}
