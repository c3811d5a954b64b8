//! In-memory read-model tables
//!
//! Mirror the uniqueness rules of the PostgreSQL tables so projection logic
//! behaves the same against either backend.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::projection::ProjectionError;

use super::{CurrentRow, CurrentTable, EntityState, HistoryRow, HistoryTable, MetadataStore};

pub struct InMemoryCurrentTable<S> {
    rows: RwLock<BTreeMap<Uuid, CurrentRow<S>>>,
}

impl<S> InMemoryCurrentTable<S> {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<S> Default for InMemoryCurrentTable<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<S: EntityState> CurrentTable<S> for InMemoryCurrentTable<S> {
    async fn get(&self, id: Uuid) -> Result<Option<CurrentRow<S>>, ProjectionError> {
        Ok(self.rows.read().get(&id).cloned())
    }

    async fn upsert(&self, row: &CurrentRow<S>) -> Result<(), ProjectionError> {
        self.rows.write().insert(row.state.entity_id(), row.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<CurrentRow<S>>, ProjectionError> {
        Ok(self.rows.read().values().cloned().collect())
    }

    async fn clear(&self) -> Result<(), ProjectionError> {
        self.rows.write().clear();
        Ok(())
    }
}

/// History rows keyed by (entity id, snapshot date)
pub struct InMemoryHistoryTable<S> {
    rows: RwLock<BTreeMap<(Uuid, NaiveDate), HistoryRow<S>>>,
}

impl<S> InMemoryHistoryTable<S> {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<S> Default for InMemoryHistoryTable<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<S: EntityState> HistoryTable<S> for InMemoryHistoryTable<S> {
    async fn find(
        &self,
        entity_id: Uuid,
        snapshot_date: NaiveDate,
    ) -> Result<Option<HistoryRow<S>>, ProjectionError> {
        Ok(self.rows.read().get(&(entity_id, snapshot_date)).cloned())
    }

    async fn insert(&self, row: &HistoryRow<S>) -> Result<(), ProjectionError> {
        let mut rows = self.rows.write();
        let key = (row.entity_id, row.snapshot_date);
        if rows.contains_key(&key) {
            return Err(ProjectionError::DuplicateSnapshot {
                entity_id: row.entity_id,
                snapshot_date: row.snapshot_date,
            });
        }
        rows.insert(key, row.clone());
        Ok(())
    }

    async fn overwrite(&self, row: &HistoryRow<S>) -> Result<(), ProjectionError> {
        let mut rows = self.rows.write();
        match rows.get_mut(&(row.entity_id, row.snapshot_date)) {
            Some(existing) => {
                existing.state = row.state.clone();
                existing.stored_at = row.stored_at;
                Ok(())
            }
            None => Err(ProjectionError::MissingRow {
                kind: S::KIND,
                id: row.entity_id,
            }),
        }
    }

    async fn as_of(
        &self,
        entity_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<HistoryRow<S>>, ProjectionError> {
        let rows = self.rows.read();
        let latest = rows
            .range((entity_id, NaiveDate::MIN)..=(entity_id, date))
            .next_back()
            .map(|(_, row)| row.clone());
        Ok(latest)
    }

    async fn all_as_of(&self, date: NaiveDate) -> Result<Vec<HistoryRow<S>>, ProjectionError> {
        let rows = self.rows.read();
        // Keys are ordered by date within each entity, so the last write wins
        let mut latest: BTreeMap<Uuid, &HistoryRow<S>> = BTreeMap::new();
        for ((entity_id, snapshot_date), row) in rows.iter() {
            if *snapshot_date <= date {
                latest.insert(*entity_id, row);
            }
        }
        Ok(latest.into_values().cloned().collect())
    }

    async fn for_entity(&self, entity_id: Uuid) -> Result<Vec<HistoryRow<S>>, ProjectionError> {
        let rows = self.rows.read();
        Ok(rows
            .range((entity_id, NaiveDate::MIN)..=(entity_id, NaiveDate::MAX))
            .map(|(_, row)| row.clone())
            .collect())
    }

    async fn clear(&self) -> Result<(), ProjectionError> {
        self.rows.write().clear();
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryMetadata {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryMetadata {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadata {
    async fn get(&self, key: &str) -> Result<Option<String>, ProjectionError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ProjectionError> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read_model::ProjectState;
    use chrono::{TimeZone, Utc};

    fn state(id: Uuid, name: &str) -> ProjectState {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        ProjectState {
            id,
            name: name.to_string(),
            description: None,
            start_date: None,
            end_date: None,
            created_at: at,
            created_by: "alice".to_string(),
            updated_at: at,
            updated_by: "alice".to_string(),
        }
    }

    fn row(id: Uuid, day: u32, name: &str) -> HistoryRow<ProjectState> {
        HistoryRow {
            entity_id: id,
            snapshot_date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            state: state(id, name),
            stored_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_history_insert_rejects_duplicate_key() {
        let table = InMemoryHistoryTable::new();
        let id = Uuid::new_v4();
        table.insert(&row(id, 1, "a")).await.unwrap();

        let err = table.insert(&row(id, 1, "b")).await.unwrap_err();
        assert!(matches!(err, ProjectionError::DuplicateSnapshot { .. }));
    }

    #[tokio::test]
    async fn test_history_as_of_picks_latest_not_after_date() {
        let table = InMemoryHistoryTable::new();
        let id = Uuid::new_v4();
        let other = Uuid::new_v4();
        table.insert(&row(id, 2, "d2")).await.unwrap();
        table.insert(&row(id, 5, "d5")).await.unwrap();
        table.insert(&row(other, 3, "other")).await.unwrap();

        let on = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        assert!(table.as_of(id, on(1)).await.unwrap().is_none());
        assert_eq!(table.as_of(id, on(4)).await.unwrap().unwrap().state.name, "d2");
        assert_eq!(table.as_of(id, on(9)).await.unwrap().unwrap().state.name, "d5");

        let all = table.all_as_of(on(4)).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_metadata_round_trip() {
        let metadata = InMemoryMetadata::new();
        assert_eq!(metadata.get("timezone").await.unwrap(), None);

        metadata.set("timezone", "Asia/Tokyo").await.unwrap();
        assert_eq!(
            metadata.get("timezone").await.unwrap().as_deref(),
            Some("Asia/Tokyo")
        );
    }
}
