//! Snapshot upsert policy
//!
//! One history row per entity per local date. Events landing on the same date
//! collapse into that row, the first event on a new date starts a new row, and
//! rows of earlier dates are never touched again.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::read_model::{EntityState, HistoryRow, HistoryTable};
use crate::timezone::DayBoundary;

use super::ProjectionError;

/// Which write the policy performed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotWrite {
    Inserted(NaiveDate),
    Overwritten(NaiveDate),
}

impl SnapshotWrite {
    pub fn date(&self) -> NaiveDate {
        match self {
            SnapshotWrite::Inserted(date) | SnapshotWrite::Overwritten(date) => *date,
        }
    }
}

/// Shared by every mutating handler of every entity kind
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotPolicy {
    day_boundary: DayBoundary,
}

impl SnapshotPolicy {
    pub fn new(day_boundary: DayBoundary) -> Self {
        Self { day_boundary }
    }

    pub fn day_boundary(&self) -> DayBoundary {
        self.day_boundary
    }

    /// Record `state` as the end-of-day state for the local date of
    /// `occurred_at`
    pub async fn upsert<S, T>(
        &self,
        table: &T,
        entity_id: Uuid,
        state: &S,
        occurred_at: DateTime<Utc>,
    ) -> Result<SnapshotWrite, ProjectionError>
    where
        S: EntityState,
        T: HistoryTable<S> + ?Sized,
    {
        let snapshot_date = self.day_boundary.local_date(occurred_at);
        let row = HistoryRow {
            entity_id,
            snapshot_date,
            state: state.clone(),
            stored_at: Utc::now(),
        };

        if table.find(entity_id, snapshot_date).await?.is_some() {
            table.overwrite(&row).await?;
            tracing::debug!(
                kind = S::KIND,
                entity_id = %entity_id,
                snapshot_date = %snapshot_date,
                "Snapshot overwritten"
            );
            return Ok(SnapshotWrite::Overwritten(snapshot_date));
        }

        match table.insert(&row).await {
            Ok(()) => {
                tracing::debug!(
                    kind = S::KIND,
                    entity_id = %entity_id,
                    snapshot_date = %snapshot_date,
                    "Snapshot inserted"
                );
                Ok(SnapshotWrite::Inserted(snapshot_date))
            }
            // Lost a race with another writer for the same day
            Err(ProjectionError::DuplicateSnapshot { .. }) => {
                table.overwrite(&row).await?;
                Ok(SnapshotWrite::Overwritten(snapshot_date))
            }
            Err(e) => Err(e),
        }
    }
}
