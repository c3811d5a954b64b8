//! Aggregate Repository
//!
//! Loads aggregates by replaying their events and saves them by appending the
//! pending buffer under optimistic concurrency. Conflicts are returned to the
//! caller unchanged; retrying is the command layer's decision.

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::aggregate::{Aggregate, EventEnvelope};
use crate::event_store::{EventStore, EventStoreError, NewEvent, StoredEvent};

pub struct Repository<A> {
    store: Arc<dyn EventStore>,
    _aggregate: PhantomData<fn() -> A>,
}

impl<A> Clone for Repository<A> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _aggregate: PhantomData,
        }
    }
}

impl<A: Aggregate> Repository<A> {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            store,
            _aggregate: PhantomData,
        }
    }

    /// Rebuild an aggregate from its full history
    ///
    /// `None` when no event was ever stored for `id`.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<A>, EventStoreError> {
        let events = self.store.events_for(id).await?;
        Self::rehydrate(id, &events)
    }

    /// Rebuild an aggregate from the events that occurred up to `instant`
    pub async fn get_as_of(
        &self,
        id: Uuid,
        instant: DateTime<Utc>,
    ) -> Result<Option<A>, EventStoreError> {
        let events = self.store.events_until(id, instant).await?;
        Self::rehydrate(id, &events)
    }

    /// Append the pending events at the aggregate's version, then clear them
    ///
    /// Nothing is written when the buffer is empty.
    pub async fn save(&self, aggregate: &mut A) -> Result<Vec<StoredEvent>, EventStoreError> {
        if aggregate.pending_events().is_empty() {
            return Ok(Vec::new());
        }

        let events = aggregate
            .pending_events()
            .iter()
            .map(NewEvent::from_envelope)
            .collect::<Result<Vec<_>, _>>()?;

        let stored = self
            .store
            .append(A::aggregate_type(), aggregate.id(), events, aggregate.version())
            .await?;

        aggregate.clear_buffer();

        tracing::debug!(
            aggregate_type = A::aggregate_type(),
            aggregate_id = %aggregate.id(),
            version = aggregate.version(),
            appended = stored.len(),
            "Aggregate saved"
        );
        Ok(stored)
    }

    fn rehydrate(id: Uuid, events: &[StoredEvent]) -> Result<Option<A>, EventStoreError> {
        if events.is_empty() {
            return Ok(None);
        }

        let envelopes = events
            .iter()
            .map(StoredEvent::decode_as::<A::Event>)
            .collect::<Result<Vec<EventEnvelope<A::Event>>, _>>()?;

        let mut aggregate = A::blank(id);
        aggregate.replay(envelopes);
        Ok(Some(aggregate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{Task, TaskChanges};
    use crate::domain::{Hours, OperationContext, TaskStatus};
    use crate::event_store::InMemoryEventStore;
    use chrono::TimeZone;

    fn ctx(day: u32, hour: u32) -> OperationContext {
        OperationContext::new("alice").at(Utc.with_ymd_and_hms(2024, 4, day, hour, 0, 0).unwrap())
    }

    fn repository() -> Repository<Task> {
        Repository::new(Arc::new(InMemoryEventStore::new()))
    }

    fn new_task(context: &OperationContext) -> Task {
        Task::create(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Draft plan".to_string(),
            None,
            Hours::from_integer(40).unwrap(),
            None,
            None,
            context,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let repo = repository();
        assert!(repo.get_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load_round_trips_state_and_version() {
        let repo = repository();
        let mut task = new_task(&ctx(1, 9));
        task.change_status(TaskStatus::InProgress, &ctx(1, 14)).unwrap();

        let stored = repo.save(&mut task).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(task.version(), 1);
        assert!(task.pending_events().is_empty());

        let loaded = repo.get_by_id(task.id()).await.unwrap().unwrap();
        assert_eq!(loaded.version(), 1);
        assert_eq!(loaded.fields(), task.fields());
    }

    #[tokio::test]
    async fn test_save_without_pending_events_is_noop() {
        let repo = repository();
        let mut task = new_task(&ctx(1, 9));
        repo.save(&mut task).await.unwrap();

        let stored = repo.save(&mut task).await.unwrap();
        assert!(stored.is_empty());
        assert_eq!(task.version(), 0);
    }

    #[tokio::test]
    async fn test_stale_save_reports_conflict_and_keeps_buffer() {
        let repo = repository();
        let mut task = new_task(&ctx(1, 9));
        repo.save(&mut task).await.unwrap();

        let mut first = repo.get_by_id(task.id()).await.unwrap().unwrap();
        let mut second = repo.get_by_id(task.id()).await.unwrap().unwrap();

        first.change_status(TaskStatus::Done, &ctx(2, 9)).unwrap();
        tokio_test::assert_ok!(repo.save(&mut first).await);

        second
            .update(
                TaskChanges {
                    title: Some("Renamed".to_string()),
                    ..TaskChanges::default()
                },
                &ctx(2, 10),
            )
            .unwrap();
        let err = tokio_test::assert_err!(repo.save(&mut second).await);

        match err {
            EventStoreError::ConcurrencyConflict {
                expected, actual, ..
            } => {
                assert_eq!(expected, 0);
                assert_eq!(actual, 1);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(second.pending_events().len(), 1);
    }

    #[tokio::test]
    async fn test_get_as_of_replays_prefix_of_history() {
        let repo = repository();
        let mut task = new_task(&ctx(1, 9));
        task.change_status(TaskStatus::InProgress, &ctx(2, 9)).unwrap();
        task.change_status(TaskStatus::Done, &ctx(3, 9)).unwrap();
        repo.save(&mut task).await.unwrap();

        let past = repo
            .get_as_of(task.id(), Utc.with_ymd_and_hms(2024, 4, 2, 12, 0, 0).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(past.status(), TaskStatus::InProgress);
        assert_eq!(past.version(), 1);

        let before = repo
            .get_as_of(task.id(), Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap())
            .await
            .unwrap();
        assert!(before.is_none());
    }
}
