use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{EntityStore, StoreResult};
use crate::models::log_entry::{LogEntry, TimeRange};
use crate::models::log_type::LogType;
use crate::models::tracker::Tracker;

/// Process-local store. Used when no database is configured, and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    log_types: RwLock<HashMap<Uuid, LogType>>,
    entries: RwLock<HashMap<Uuid, LogEntry>>,
    trackers: RwLock<HashMap<Uuid, Tracker>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn insert_log_type(&self, log_type: &LogType) -> StoreResult<()> {
        self.log_types
            .write()
            .await
            .insert(log_type.id, log_type.clone());
        Ok(())
    }

    async fn get_log_type(&self, id: Uuid) -> StoreResult<Option<LogType>> {
        Ok(self.log_types.read().await.get(&id).cloned())
    }

    async fn list_log_types_by_owner(&self, owner: &str) -> StoreResult<Vec<LogType>> {
        let mut types: Vec<LogType> = self
            .log_types
            .read()
            .await
            .values()
            .filter(|t| t.user_id == owner)
            .cloned()
            .collect();
        types.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));
        Ok(types)
    }

    async fn update_log_type(&self, log_type: &LogType) -> StoreResult<()> {
        if let Some(existing) = self.log_types.write().await.get_mut(&log_type.id) {
            *existing = log_type.clone();
        }
        Ok(())
    }

    async fn delete_log_type(&self, id: Uuid) -> StoreResult<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.type_id != id);
        let removed = (before - entries.len()) as u64;
        self.log_types.write().await.remove(&id);
        Ok(removed)
    }

    async fn insert_entry(&self, entry: &LogEntry) -> StoreResult<()> {
        self.entries.write().await.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn get_entry(&self, id: Uuid) -> StoreResult<Option<LogEntry>> {
        Ok(self.entries.read().await.get(&id).cloned())
    }

    async fn update_entry(&self, entry: &LogEntry) -> StoreResult<()> {
        if let Some(existing) = self.entries.write().await.get_mut(&entry.id) {
            *existing = entry.clone();
        }
        Ok(())
    }

    async fn delete_entry(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.entries.write().await.remove(&id).is_some())
    }

    async fn list_entries_by_owner(&self, owner: &str) -> StoreResult<Vec<LogEntry>> {
        let mut entries: Vec<LogEntry> = self
            .entries
            .read()
            .await
            .values()
            .filter(|e| e.user_id == owner)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }

    async fn list_entries_by_owner_and_type(
        &self,
        owner: &str,
        type_id: Uuid,
        range: TimeRange,
    ) -> StoreResult<Vec<LogEntry>> {
        let mut entries: Vec<LogEntry> = self
            .entries
            .read()
            .await
            .values()
            .filter(|e| e.user_id == owner && e.type_id == type_id && range.contains(e.timestamp))
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }

    async fn find_entry_in_range(
        &self,
        owner: &str,
        type_id: Uuid,
        range: TimeRange,
    ) -> StoreResult<Option<LogEntry>> {
        Ok(self
            .list_entries_by_owner_and_type(owner, type_id, range)
            .await?
            .into_iter()
            .next())
    }

    async fn insert_tracker(&self, tracker: &Tracker) -> StoreResult<()> {
        self.trackers
            .write()
            .await
            .insert(tracker.id, tracker.clone());
        Ok(())
    }

    async fn get_tracker(&self, id: Uuid) -> StoreResult<Option<Tracker>> {
        Ok(self.trackers.read().await.get(&id).cloned())
    }

    async fn list_trackers_by_owner(&self, owner: &str) -> StoreResult<Vec<Tracker>> {
        let mut trackers: Vec<Tracker> = self
            .trackers
            .read()
            .await
            .values()
            .filter(|t| t.user_id == owner)
            .cloned()
            .collect();
        trackers.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));
        Ok(trackers)
    }

    async fn update_tracker(&self, tracker: &Tracker) -> StoreResult<()> {
        if let Some(existing) = self.trackers.write().await.get_mut(&tracker.id) {
            *existing = tracker.clone();
        }
        Ok(())
    }

    async fn delete_tracker(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.trackers.write().await.remove(&id).is_some())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use super::*;

    fn log_type(owner: &str) -> LogType {
        LogType {
            id: Uuid::new_v4(),
            user_id: owner.into(),
            name: "Exercise".into(),
            icon_id: None,
            fields: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    fn entry(owner: &str, type_id: Uuid, timestamp: i64) -> LogEntry {
        LogEntry {
            id: Uuid::new_v4(),
            user_id: owner.into(),
            type_id,
            timestamp,
            values: BTreeMap::new(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn deleting_log_type_cascades_entries() {
        let store = MemoryStore::new();
        let exercise = log_type("u1");
        let water = log_type("u1");
        store.insert_log_type(&exercise).await.unwrap();
        store.insert_log_type(&water).await.unwrap();
        store.insert_entry(&entry("u1", exercise.id, 1)).await.unwrap();
        store.insert_entry(&entry("u1", exercise.id, 2)).await.unwrap();
        store.insert_entry(&entry("u1", water.id, 3)).await.unwrap();

        assert_eq!(store.delete_log_type(exercise.id).await.unwrap(), 2);
        assert!(store.get_log_type(exercise.id).await.unwrap().is_none());
        let left = store.list_entries_by_owner("u1").await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].type_id, water.id);
    }

    #[tokio::test]
    async fn typed_listing_filters_owner_type_and_range() {
        let store = MemoryStore::new();
        let t = log_type("u1");
        store.insert_entry(&entry("u1", t.id, 100)).await.unwrap();
        store.insert_entry(&entry("u1", t.id, 50)).await.unwrap();
        store.insert_entry(&entry("u1", t.id, 200)).await.unwrap();
        store.insert_entry(&entry("u2", t.id, 100)).await.unwrap();
        store.insert_entry(&entry("u1", Uuid::new_v4(), 100)).await.unwrap();

        let found = store
            .list_entries_by_owner_and_type("u1", t.id, TimeRange::new(50, 200))
            .await
            .unwrap();
        let stamps: Vec<i64> = found.iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![50, 100]);

        let first = store
            .find_entry_in_range("u1", t.id, TimeRange::new(60, 300))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.timestamp, 100);
    }

    #[tokio::test]
    async fn owner_listing_is_newest_first() {
        let store = MemoryStore::new();
        let t = Uuid::new_v4();
        for ts in [5, 1, 9] {
            store.insert_entry(&entry("u1", t, ts)).await.unwrap();
        }
        let stamps: Vec<i64> = store
            .list_entries_by_owner("u1")
            .await
            .unwrap()
            .iter()
            .map(|e| e.timestamp)
            .collect();
        assert_eq!(stamps, vec![9, 5, 1]);
    }
}
