//! PostgreSQL Event Store
//!
//! Atomic event persistence with optimistic concurrency control.
//! The version check and the inserts share one transaction, and the unique
//! index on `(aggregate_id, version)` settles races between writers that both
//! passed the check.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{EventStore, EventStoreError, NewEvent, StoredEvent};

/// Name of the unique index on `(aggregate_id, version)`
const VERSION_CONSTRAINT: &str = "uq_events_aggregate_version";

const SELECT_COLUMNS: &str = r#"
    SELECT event_id, aggregate_type, aggregate_id, version, event_type,
           payload, occurred_at, position, stored_at
    FROM events
"#;

type EventTuple = (
    Uuid,
    String,
    Uuid,
    i64,
    String,
    serde_json::Value,
    DateTime<Utc>,
    i64,
    DateTime<Utc>,
);

fn from_tuple(
    (
        event_id,
        aggregate_type,
        aggregate_id,
        version,
        event_type,
        payload,
        occurred_at,
        position,
        stored_at,
    ): EventTuple,
) -> StoredEvent {
    StoredEvent {
        event_id,
        aggregate_type,
        aggregate_id,
        version,
        event_type,
        payload,
        occurred_at,
        position,
        stored_at,
    }
}

/// Event Store backed by the `events` table
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    /// Create a new PgEventStore with a database pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get current version of an aggregate inside a transaction
    async fn current_version(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        aggregate_id: Uuid,
    ) -> Result<i64, EventStoreError> {
        let version: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(version), -1) FROM events WHERE aggregate_id = $1
            "#,
        )
        .bind(aggregate_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(version)
    }

    async fn fetch(
        &self,
        sql: &str,
        aggregate_id: Uuid,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let events = sqlx::query_as::<_, EventTuple>(sql)
            .bind(aggregate_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(from_tuple)
            .collect();

        Ok(events)
    }
}

fn is_version_collision(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.is_unique_violation() && db.constraint() == Some(VERSION_CONSTRAINT)
        }
        _ => false,
    }
}

#[async_trait]
impl EventStore for PgEventStore {
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

        let mut tx = self.pool.begin().await?;

        // Verify expected version (optimistic locking)
        let current_version = self.current_version(&mut tx, aggregate_id).await?;
        if current_version != expected_version {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual: current_version,
            });
        }

        let mut stored = Vec::with_capacity(events.len());

        for (offset, event) in events.into_iter().enumerate() {
            let version = expected_version + 1 + offset as i64;

            let inserted = sqlx::query_as::<_, EventTuple>(
                r#"
                INSERT INTO events (
                    event_id, aggregate_type, aggregate_id, version,
                    event_type, payload, occurred_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING event_id, aggregate_type, aggregate_id, version, event_type,
                          payload, occurred_at, position, stored_at
                "#,
            )
            .bind(event.event_id)
            .bind(aggregate_type)
            .bind(aggregate_id)
            .bind(version)
            .bind(&event.event_type)
            .bind(&event.payload)
            .bind(event.occurred_at)
            .fetch_one(&mut *tx)
            .await;

            match inserted {
                Ok(row) => stored.push(from_tuple(row)),
                Err(e) if is_version_collision(&e) => {
                    // A concurrent writer committed first; nothing of ours is kept
                    tx.rollback().await?;
                    let actual = self.stream_version(aggregate_id).await?;
                    tracing::warn!(
                        aggregate_id = %aggregate_id,
                        expected = expected_version,
                        actual,
                        "Concurrent append lost the version race"
                    );
                    return Err(EventStoreError::ConcurrencyConflict {
                        aggregate_id,
                        expected: expected_version,
                        actual,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        tx.commit().await?;

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
        let version: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(version), -1) FROM events WHERE aggregate_id = $1",
        )
        .bind(aggregate_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(version)
    }

    async fn events_for(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, EventStoreError> {
        let sql = format!("{SELECT_COLUMNS} WHERE aggregate_id = $1 ORDER BY version ASC");
        self.fetch(&sql, aggregate_id).await
    }

    async fn events_until(
        &self,
        aggregate_id: Uuid,
        point_in_time: DateTime<Utc>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE aggregate_id = $1 AND occurred_at <= $2 ORDER BY version ASC"
        );
        let events = sqlx::query_as::<_, EventTuple>(&sql)
            .bind(aggregate_id)
            .bind(point_in_time)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(from_tuple)
            .collect();

        Ok(events)
    }

    async fn events_by_type(
        &self,
        event_type: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let sql = format!(
            r#"{SELECT_COLUMNS}
            WHERE event_type = $1
              AND ($2::timestamptz IS NULL OR occurred_at >= $2)
              AND ($3::timestamptz IS NULL OR occurred_at <= $3)
            ORDER BY occurred_at ASC, position ASC"#
        );
        let events = sqlx::query_as::<_, EventTuple>(&sql)
            .bind(event_type)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(from_tuple)
            .collect();

        Ok(events)
    }

    async fn all_events(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY occurred_at ASC, position ASC");
        let events = sqlx::query_as::<_, EventTuple>(&sql)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(from_tuple)
            .collect();

        Ok(events)
    }

    async fn has_events(&self) -> Result<bool, EventStoreError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM events)")
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }
}
