//! Event Publisher
//!
//! In-process fan-out from stored events to projection handlers.
//! Delivery is best effort: a failing handler is logged and counted, never
//! reported to the writer, and the read side is only repaired by a rebuild.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use parking_lot::RwLock;
use tokio::sync::{RwLock as AsyncRwLock, RwLockWriteGuard};

use crate::domain::{EventKind, RecordedEvent};
use crate::projection::ProjectionError;

/// Handler for one kind of event
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &RecordedEvent) -> Result<(), ProjectionError>;
}

/// Outcome of delivering one event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Handlers that completed successfully
    pub handled: usize,
    /// Handlers that returned an error, panicked or timed out
    pub failed: usize,
}

/// In-process publish/subscribe dispatcher
pub struct EventPublisher {
    handlers: RwLock<HashMap<EventKind, Vec<Arc<dyn EventHandler>>>>,
    handler_timeout: Option<Duration>,
    /// Live publishes share this gate; a rebuild holds it exclusively
    gate: AsyncRwLock<()>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            handler_timeout: None,
            gate: AsyncRwLock::new(()),
        }
    }

    /// Bound each handler invocation; `None` waits indefinitely
    pub fn with_handler_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handler_timeout = timeout;
        self
    }

    /// Register a handler for a concrete event kind
    pub fn subscribe(&self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        tracing::debug!(
            event_type = %kind,
            handler = handler.name(),
            "Registered event handler"
        );
        self.handlers.write().entry(kind).or_default().push(handler);
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.handlers.read().get(&kind).map_or(0, Vec::len)
    }

    /// Deliver an event to every handler subscribed to its kind
    ///
    /// Waits while a rebuild holds the publisher exclusively.
    pub async fn publish(&self, event: &RecordedEvent) -> PublishReport {
        let _shared = self.gate.read().await;
        self.deliver(event).await
    }

    /// Take the publisher exclusively until the returned guard is dropped
    pub async fn exclusive(&self) -> ExclusivePublisher<'_> {
        let guard = self.gate.write().await;
        tracing::info!("Publisher switched to exclusive mode");
        ExclusivePublisher {
            publisher: self,
            _guard: guard,
        }
    }

    async fn deliver(&self, event: &RecordedEvent) -> PublishReport {
        let kind = event.kind();

        // Clone the list so no lock is held across handler awaits
        let handlers: Vec<Arc<dyn EventHandler>> = self
            .handlers
            .read()
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        if handlers.is_empty() {
            tracing::warn!(
                event_type = %kind,
                event_id = %event.event_id,
                "No handlers subscribed to event type"
            );
            return PublishReport::default();
        }

        let outcomes = join_all(handlers.iter().map(|handler| self.run(handler, event))).await;

        let handled = outcomes.iter().filter(|ok| **ok).count();
        PublishReport {
            handled,
            failed: outcomes.len() - handled,
        }
    }

    async fn run(&self, handler: &Arc<dyn EventHandler>, event: &RecordedEvent) -> bool {
        let invocation = AssertUnwindSafe(handler.handle(event)).catch_unwind();

        let outcome = match self.handler_timeout {
            Some(limit) => match tokio::time::timeout(limit, invocation).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::error!(
                        handler = handler.name(),
                        event_type = %event.kind(),
                        event_id = %event.event_id,
                        timeout_ms = limit.as_millis() as u64,
                        "Event handler timed out"
                    );
                    return false;
                }
            },
            None => invocation.await,
        };

        match outcome {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::error!(
                    handler = handler.name(),
                    event_type = %event.kind(),
                    event_id = %event.event_id,
                    aggregate_id = %event.aggregate_id,
                    error = %e,
                    "Event handler failed"
                );
                false
            }
            Err(_) => {
                tracing::error!(
                    handler = handler.name(),
                    event_type = %event.kind(),
                    event_id = %event.event_id,
                    "Event handler panicked"
                );
                false
            }
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive access to the publisher, used by the rebuild path
pub struct ExclusivePublisher<'a> {
    publisher: &'a EventPublisher,
    _guard: RwLockWriteGuard<'a, ()>,
}

impl ExclusivePublisher<'_> {
    /// Deliver through the same handlers as live traffic
    pub async fn publish(&self, event: &RecordedEvent) -> PublishReport {
        self.publisher.deliver(event).await
    }
}

impl Drop for ExclusivePublisher<'_> {
    fn drop(&mut self) {
        tracing::info!("Publisher left exclusive mode");
    }
}
