//! Aggregate module
//!
//! Aggregate Root pattern implementation for Event Sourcing.
//!
//! Business methods validate first and only then call [`Aggregate::apply`];
//! [`Aggregate::when`] is the pure state transition and has no failure path,
//! so replaying events that were once accepted can never fail.

pub mod project;
pub mod task;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{DomainError, EventPayload};

pub use project::{Project, ProjectChanges, ProjectFields};
pub use task::{Task, TaskChanges, TaskFields};

/// An event plus the envelope data assigned when it was raised
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope<E> {
    pub event_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub event: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(event: E, occurred_at: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at,
            event,
        }
    }
}

/// Identity, version and pending buffer shared by every aggregate
#[derive(Debug, Clone)]
pub struct AggregateRoot<E> {
    id: Uuid,
    /// Last persisted or replayed version; -1 before any event
    version: i64,
    /// Instant of the latest applied or replayed event
    last_occurred_at: Option<DateTime<Utc>>,
    pending: Vec<EventEnvelope<E>>,
}

impl<E> AggregateRoot<E> {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            version: -1,
            last_occurred_at: None,
            pending: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn last_occurred_at(&self) -> Option<DateTime<Utc>> {
        self.last_occurred_at
    }

    pub fn pending(&self) -> &[EventEnvelope<E>] {
        &self.pending
    }

    fn record(&mut self, envelope: EventEnvelope<E>) {
        self.last_occurred_at = Some(envelope.occurred_at);
        self.pending.push(envelope);
    }

    fn advance(&mut self, occurred_at: DateTime<Utc>) {
        self.version += 1;
        self.last_occurred_at = Some(occurred_at);
    }

    fn commit(&mut self) {
        self.version += self.pending.len() as i64;
        self.pending.clear();
    }
}

/// Aggregate trait that all aggregates must implement
pub trait Aggregate: Sized + Send + Sync {
    /// The type of events this aggregate handles
    type Event: EventPayload;

    /// Get the aggregate type name (for storage)
    fn aggregate_type() -> &'static str;

    /// Blank instance that events are replayed onto
    fn blank(id: Uuid) -> Self;

    fn root(&self) -> &AggregateRoot<Self::Event>;

    fn root_mut(&mut self) -> &mut AggregateRoot<Self::Event>;

    /// Pure state transition for one event
    fn when(&mut self, event: &Self::Event, occurred_at: DateTime<Utc>);

    fn id(&self) -> Uuid {
        self.root().id()
    }

    /// Version of the last persisted or replayed event
    fn version(&self) -> i64 {
        self.root().version()
    }

    /// Reject an instant earlier than the aggregate's latest event
    ///
    /// The log is replayed in `occurred_at` order, so a stream's events must
    /// never go back in time.
    fn ensure_chronological(&self, at: DateTime<Utc>) -> Result<(), DomainError> {
        match self.root().last_occurred_at() {
            Some(last) if at < last => Err(DomainError::OutOfOrder { last, attempted: at }),
            _ => Ok(()),
        }
    }

    /// Apply a new event and buffer it for persistence
    fn apply(&mut self, event: Self::Event, occurred_at: DateTime<Utc>) {
        self.when(&event, occurred_at);
        self.root_mut().record(EventEnvelope::new(event, occurred_at));
    }

    /// Rebuild state from history without buffering
    fn replay<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = EventEnvelope<Self::Event>>,
    {
        for envelope in events {
            self.when(&envelope.event, envelope.occurred_at);
            self.root_mut().advance(envelope.occurred_at);
        }
    }

    /// Events applied since the last save
    fn pending_events(&self) -> &[EventEnvelope<Self::Event>] {
        self.root().pending()
    }

    /// Drop the buffer once its events are persisted
    fn clear_buffer(&mut self) {
        self.root_mut().commit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventDecodeError, EventKind};
    use chrono::TimeZone;

    #[derive(Debug, Clone, PartialEq)]
    struct Bumped(i64);

    impl EventPayload for Bumped {
        fn kind(&self) -> EventKind {
            EventKind::TaskUpdated
        }

        fn encode(&self) -> Result<serde_json::Value, serde_json::Error> {
            Ok(serde_json::json!(self.0))
        }

        fn decode(_: EventKind, _: &serde_json::Value) -> Result<Self, EventDecodeError> {
            Ok(Bumped(0))
        }
    }

    struct Counter {
        root: AggregateRoot<Bumped>,
        total: i64,
    }

    impl Aggregate for Counter {
        type Event = Bumped;

        fn aggregate_type() -> &'static str {
            "Counter"
        }

        fn blank(id: Uuid) -> Self {
            Self {
                root: AggregateRoot::new(id),
                total: 0,
            }
        }

        fn root(&self) -> &AggregateRoot<Bumped> {
            &self.root
        }

        fn root_mut(&mut self) -> &mut AggregateRoot<Bumped> {
            &mut self.root
        }

        fn when(&mut self, event: &Bumped, _: DateTime<Utc>) {
            self.total += event.0;
        }
    }

    #[test]
    fn test_blank_aggregate_has_version_minus_one() {
        let counter = Counter::blank(Uuid::new_v4());
        assert_eq!(counter.version(), -1);
        assert!(counter.pending_events().is_empty());
    }

    #[test]
    fn test_apply_buffers_without_advancing_version() {
        let mut counter = Counter::blank(Uuid::new_v4());
        counter.apply(Bumped(2), Utc::now());
        counter.apply(Bumped(3), Utc::now());

        assert_eq!(counter.total, 5);
        assert_eq!(counter.version(), -1);
        assert_eq!(counter.pending_events().len(), 2);
    }

    #[test]
    fn test_clear_buffer_advances_version() {
        let mut counter = Counter::blank(Uuid::new_v4());
        counter.apply(Bumped(2), Utc::now());
        counter.apply(Bumped(3), Utc::now());
        counter.clear_buffer();

        assert_eq!(counter.version(), 1);
        assert!(counter.pending_events().is_empty());
    }

    #[test]
    fn test_earlier_instant_is_rejected_after_apply_and_replay() {
        let nine = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let ten = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();

        let mut counter = Counter::blank(Uuid::new_v4());
        assert!(counter.ensure_chronological(nine).is_ok());
        counter.apply(Bumped(1), ten);

        assert!(counter.ensure_chronological(ten).is_ok());
        assert_eq!(
            counter.ensure_chronological(nine),
            Err(DomainError::OutOfOrder {
                last: ten,
                attempted: nine,
            })
        );

        let mut replayed = Counter::blank(counter.id());
        replayed.replay(vec![EventEnvelope::new(Bumped(1), ten)]);
        assert_eq!(replayed.root().last_occurred_at(), Some(ten));
        assert!(replayed.ensure_chronological(nine).is_err());
    }

    #[test]
    fn test_replay_counts_versions_and_does_not_buffer() {
        let mut counter = Counter::blank(Uuid::new_v4());
        let history = (1..=3).map(|n| EventEnvelope::new(Bumped(n), Utc::now()));
        counter.replay(history);

        assert_eq!(counter.total, 6);
        assert_eq!(counter.version(), 2);
        assert!(counter.pending_events().is_empty());
    }
}
