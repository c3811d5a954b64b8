//! Store-to-publisher bridge
//!
//! Wraps an [`EventStore`] so that every successful append is followed by
//! publication of the new events. Publishing starts only after the append has
//! committed, one event at a time in version order, so projections see each
//! aggregate's events in sequence and writers never wait on a transaction
//! held open by projection work. Readers may briefly observe an event that is
//! durable but not yet projected.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::publisher::EventPublisher;

use super::{EventStore, EventStoreError, NewEvent, StoredEvent};

pub struct PublishingEventStore {
    inner: Arc<dyn EventStore>,
    publisher: Arc<EventPublisher>,
}

impl PublishingEventStore {
    pub fn new(inner: Arc<dyn EventStore>, publisher: Arc<EventPublisher>) -> Self {
        Self { inner, publisher }
    }

    async fn publish_appended(&self, stored: &[StoredEvent]) {
        for record in stored {
            match record.decode() {
                Ok(event) => {
                    let report = self.publisher.publish(&event).await;
                    tracing::debug!(
                        event_type = %record.event_type,
                        aggregate_id = %record.aggregate_id,
                        version = record.version,
                        handled = report.handled,
                        failed = report.failed,
                        "Published event"
                    );
                }
                Err(e) => {
                    // Durable but unprojectable until a rebuild
                    tracing::error!(
                        event_id = %record.event_id,
                        event_type = %record.event_type,
                        error = %e,
                        "Appended event could not be decoded for publishing"
                    );
                }
            }
        }
    }
}

#[async_trait]
impl EventStore for PublishingEventStore {
    async fn append(
        &self,
        aggregate_type: &str,
        aggregate_id: Uuid,
        events: Vec<NewEvent>,
        expected_version: i64,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let stored = self
            .inner
            .append(aggregate_type, aggregate_id, events, expected_version)
            .await?;

        self.publish_appended(&stored).await;

        Ok(stored)
    }

    async fn stream_version(&self, aggregate_id: Uuid) -> Result<i64, EventStoreError> {
        self.inner.stream_version(aggregate_id).await
    }

    async fn events_for(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.inner.events_for(aggregate_id).await
    }

    async fn events_until(
        &self,
        aggregate_id: Uuid,
        point_in_time: DateTime<Utc>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.inner.events_until(aggregate_id, point_in_time).await
    }

    async fn events_by_type(
        &self,
        event_type: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.inner.events_by_type(event_type, from, to).await
    }

    async fn all_events(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.inner.all_events().await
    }

    async fn has_events(&self) -> Result<bool, EventStoreError> {
        self.inner.has_events().await
    }
}
