//! Replay Service
//!
//! Regenerates the read model by pushing the whole event log through the same
//! publisher and handlers that serve live traffic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

use crate::event_store::{EventStore, EventStoreError};
use crate::projection::{self, ProjectionError, SnapshotPolicy};
use crate::publisher::EventPublisher;
use crate::read_model::ReadModel;
use crate::timezone::DayBoundary;

/// Progress is logged every this many events
const PROGRESS_INTERVAL: usize = 1000;

/// Replay errors
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error(transparent)]
    EventStore(#[from] EventStoreError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

/// Outcome of one pass over the event log
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Events in the log when the pass started
    pub total: usize,
    /// Events decoded and handed to the publisher
    pub published: usize,
    /// Events that could not be decoded
    pub skipped: usize,
    /// The pass stopped early on request
    pub cancelled: bool,
}

pub struct ReplayService {
    store: Arc<dyn EventStore>,
    publisher: Arc<EventPublisher>,
    read_model: ReadModel,
    policy: SnapshotPolicy,
    registered: AtomicBool,
}

impl ReplayService {
    pub fn new(
        store: Arc<dyn EventStore>,
        publisher: Arc<EventPublisher>,
        read_model: ReadModel,
        policy: SnapshotPolicy,
    ) -> Self {
        Self {
            store,
            publisher,
            read_model,
            policy,
            registered: AtomicBool::new(false),
        }
    }

    pub fn read_model(&self) -> &ReadModel {
        &self.read_model
    }

    pub fn day_boundary(&self) -> DayBoundary {
        self.policy.day_boundary()
    }

    /// Subscribe the projection handlers; later calls do nothing
    ///
    /// Returns whether this call performed the registration.
    pub fn register_projections(&self) -> bool {
        if self.registered.swap(true, Ordering::SeqCst) {
            tracing::debug!("Projections already registered");
            return false;
        }
        projection::register_all(&self.publisher, &self.read_model, self.policy);
        true
    }

    pub async fn has_events(&self) -> Result<bool, ReplayError> {
        Ok(self.store.has_events().await?)
    }

    /// Publish every stored event in time order
    ///
    /// Holds the publisher exclusively for the whole pass, so live publishes
    /// wait until it ends. Undecodable events are logged and skipped. The
    /// cancel flag is checked between events.
    pub async fn replay_all(
        &self,
        cancel: &watch::Receiver<bool>,
    ) -> Result<ReplaySummary, ReplayError> {
        self.run(false, cancel).await
    }

    /// Clear every current and history row, then replay the log
    ///
    /// The clear happens under the same exclusive hold as the replay.
    pub async fn rebuild(
        &self,
        cancel: &watch::Receiver<bool>,
    ) -> Result<ReplaySummary, ReplayError> {
        self.run(true, cancel).await
    }

    async fn run(
        &self,
        clear_first: bool,
        cancel: &watch::Receiver<bool>,
    ) -> Result<ReplaySummary, ReplayError> {
        self.register_projections();

        let exclusive = self.publisher.exclusive().await;
        if clear_first {
            self.read_model.clear().await?;
        }
        let events = self.store.all_events().await?;

        let mut summary = ReplaySummary {
            total: events.len(),
            ..ReplaySummary::default()
        };
        tracing::info!(total = summary.total, "Replay started");

        for (index, record) in events.iter().enumerate() {
            let cancelled = *cancel.borrow();
            if cancelled {
                summary.cancelled = true;
                tracing::warn!(
                    processed = index,
                    total = summary.total,
                    "Replay cancelled"
                );
                break;
            }

            match record.decode() {
                Ok(event) => {
                    let report = exclusive.publish(&event).await;
                    if report.failed > 0 {
                        tracing::warn!(
                            event_id = %record.event_id,
                            event_type = %record.event_type,
                            failed = report.failed,
                            "Replayed event was not fully projected"
                        );
                    }
                    summary.published += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        event_id = %record.event_id,
                        event_type = %record.event_type,
                        aggregate_id = %record.aggregate_id,
                        error = %e,
                        "Skipping undecodable event during replay"
                    );
                    summary.skipped += 1;
                }
            }

            if (index + 1) % PROGRESS_INTERVAL == 0 {
                tracing::info!(
                    processed = index + 1,
                    total = summary.total,
                    "Replay progress"
                );
            }
        }

        tracing::info!(
            total = summary.total,
            published = summary.published,
            skipped = summary.skipped,
            cancelled = summary.cancelled,
            "Replay finished"
        );
        Ok(summary)
    }
}
