//! Common test utilities

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use task_chronicle::aggregate::{Project, Task};
use task_chronicle::domain::OperationContext;
use task_chronicle::event_store::{EventStore, InMemoryEventStore, PublishingEventStore};
use task_chronicle::projection::{ReadModelQueries, SnapshotPolicy};
use task_chronicle::publisher::EventPublisher;
use task_chronicle::read_model::ReadModel;
use task_chronicle::replay::ReplayService;
use task_chronicle::repository::Repository;
use task_chronicle::timezone::{DayBoundary, Zone};

/// Setup test database - truncate every table for a fresh state
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    sqlx::query(
        "TRUNCATE TABLE events, projects, tasks, project_history, task_history, system_metadata",
    )
    .execute(&pool)
    .await
    .expect("Failed to clean up DB");

    pool
}

/// UTC instant on 2024-01-`day`
pub fn utc(day: u32, hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, hour, minute, second)
        .unwrap()
}

/// Context for `actor` with the clock pinned to `at`
pub fn ctx_at(actor: &str, at: DateTime<Utc>) -> OperationContext {
    OperationContext::new(actor).at(at)
}

/// In-memory wiring of store, publisher, projections and replay
pub struct Harness {
    pub raw: Arc<InMemoryEventStore>,
    pub store: Arc<dyn EventStore>,
    pub read_model: ReadModel,
    pub replay: ReplayService,
    pub queries: ReadModelQueries,
}

impl Harness {
    pub fn new(zone: &str) -> Self {
        Self::over(Arc::new(InMemoryEventStore::new()), ReadModel::in_memory(), zone)
    }

    /// Fresh publisher and projections over an existing log and read model
    pub fn over(raw: Arc<InMemoryEventStore>, read_model: ReadModel, zone: &str) -> Self {
        let boundary = DayBoundary::new(zone.parse::<Zone>().expect("valid zone"));
        let publisher = Arc::new(EventPublisher::new());
        let replay = ReplayService::new(
            raw.clone(),
            publisher.clone(),
            read_model.clone(),
            SnapshotPolicy::new(boundary),
        );
        replay.register_projections();

        Self {
            store: Arc::new(PublishingEventStore::new(raw.clone(), publisher)),
            queries: ReadModelQueries::new(read_model.clone(), boundary),
            raw,
            read_model,
            replay,
        }
    }

    pub fn tasks(&self) -> Repository<Task> {
        Repository::new(self.store.clone())
    }

    pub fn projects(&self) -> Repository<Project> {
        Repository::new(self.store.clone())
    }
}
