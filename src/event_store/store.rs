//! Event Store contract
//!
//! Append-only log with optimistic concurrency and the read access patterns
//! used by the repository, the replay service and command helpers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::aggregate::EventEnvelope;
use crate::domain::{DomainEvent, EventDecodeError, EventKind, EventPayload, RecordedEvent};

use super::EventStoreError;

/// Event to be appended, already serialized
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl NewEvent {
    /// Serialize a buffered aggregate event
    pub fn from_envelope<E: EventPayload>(
        envelope: &EventEnvelope<E>,
    ) -> Result<Self, EventStoreError> {
        Ok(Self {
            event_id: envelope.event_id,
            event_type: envelope.event.kind().as_str().to_string(),
            payload: envelope.event.encode()?,
            occurred_at: envelope.occurred_at,
        })
    }
}

/// Stored event from the log
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    /// Position within the aggregate's stream, contiguous from 0
    pub version: i64,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
    /// Global storage order, breaks ties on `occurred_at`
    pub position: i64,
    pub stored_at: DateTime<Utc>,
}

impl StoredEvent {
    /// Decode into the published form
    pub fn decode(&self) -> Result<RecordedEvent, EventStoreError> {
        let event = DomainEvent::decode(&self.event_type, &self.payload)
            .map_err(|source| self.decode_error(source))?;

        Ok(RecordedEvent {
            event_id: self.event_id,
            aggregate_id: self.aggregate_id,
            occurred_at: self.occurred_at,
            event,
        })
    }

    /// Decode into one aggregate's event type
    pub fn decode_as<E: EventPayload>(&self) -> Result<EventEnvelope<E>, EventStoreError> {
        let kind: EventKind = self
            .event_type
            .parse()
            .map_err(|source| self.decode_error(source))?;
        let event = E::decode(kind, &self.payload).map_err(|source| self.decode_error(source))?;

        Ok(EventEnvelope {
            event_id: self.event_id,
            occurred_at: self.occurred_at,
            event,
        })
    }

    fn decode_error(&self, source: EventDecodeError) -> EventStoreError {
        EventStoreError::Decode {
            event_id: self.event_id,
            source,
        }
    }
}

/// Append-only event log
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append events if the stream is still at `expected_version`
    ///
    /// Appended events get versions `expected_version + 1 ..= expected_version + N`.
    /// On a version mismatch nothing is written and
    /// [`EventStoreError::ConcurrencyConflict`] reports both versions.
    async fn append(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
        events: Vec<NewEvent>,
        expected_version: i64,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Highest stored version for the aggregate, -1 when it has no events
    async fn stream_version(&self, aggregate_id: Uuid) -> Result<i64, EventStoreError>;

    /// All events of one aggregate, ascending by version
    async fn events_for(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Events of one aggregate that occurred at or before `point_in_time`
    async fn events_until(
        &self,
        aggregate_id: Uuid,
        point_in_time: DateTime<Utc>,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Events of one type across all aggregates, ascending by time
    ///
    /// Both window bounds are inclusive.
    async fn events_by_type(
        &self,
        event_type: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// The whole log by occurrence time, ties broken by storage order
    async fn all_events(&self) -> Result<Vec<StoredEvent>, EventStoreError>;

    async fn has_events(&self) -> Result<bool, EventStoreError>;
}
