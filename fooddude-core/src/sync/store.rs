//! Remote document store interface and the in-memory implementation.
//!
//! A store keeps one document per (user, date). Each document maps meal
//! names to ordered arrays of entries, and every change is pushed in full to
//! live subscribers.

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;

use super::error::StoreError;
use crate::models::{DayLog, FoodEntry, MealSlot};

/// Validated day snapshots pushed by a subscription.
pub type SnapshotStream = BoxStream<'static, DayLog>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Appends one entry to the meal's array, creating the document if needed.
    async fn append(
        &self,
        user: &str,
        date: NaiveDate,
        meal: MealSlot,
        entry: &FoodEntry,
    ) -> Result<(), StoreError>;

    /// Overwrites the meal's array.
    async fn replace(
        &self,
        user: &str,
        date: NaiveDate,
        meal: MealSlot,
        entries: &[FoodEntry],
    ) -> Result<(), StoreError>;

    /// Reads the current document. A missing document is an empty day.
    async fn fetch(&self, user: &str, date: NaiveDate) -> Result<DayLog, StoreError>;

    /// Streams the full document now and after every change.
    async fn subscribe(&self, user: &str, date: NaiveDate) -> Result<SnapshotStream, StoreError>;
}

/// Validates raw documents, dropping any that do not fit the day schema.
pub(crate) fn quarantine_malformed<S>(documents: S) -> SnapshotStream
where
    S: Stream<Item = Value> + Send + 'static,
{
    documents
        .filter_map(|doc| async move {
            match DayLog::from_document(&doc) {
                Ok(day) => Some(day),
                Err(e) => {
                    tracing::warn!("Quarantined remote snapshot: {}", e);
                    None
                }
            }
        })
        .boxed()
}

type DocKey = (String, NaiveDate);

#[derive(Default)]
struct MemoryState {
    documents: HashMap<DocKey, Value>,
    channels: HashMap<DocKey, broadcast::Sender<Value>>,
    offline: bool,
    rejecting: bool,
    writes: usize,
}

impl MemoryState {
    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline {
            Err(StoreError::Unreachable("store is offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        self.check_online()?;
        if self.rejecting {
            Err(StoreError::Rejected("store is rejecting writes".to_string()))
        } else {
            Ok(())
        }
    }

    fn publish(&mut self, key: &DocKey) {
        self.writes += 1;
        if let (Some(doc), Some(sender)) = (self.documents.get(key), self.channels.get(key)) {
            let _ = sender.send(doc.clone());
        }
        self.prune_channels();
    }

    /// Drops channels whose subscribers have all gone away.
    fn prune_channels(&mut self) {
        self.channels.retain(|_, sender| sender.receiver_count() > 0);
    }

    fn meal_array(&mut self, key: DocKey, meal: MealSlot) -> &mut Vec<Value> {
        let doc = self
            .documents
            .entry(key)
            .or_insert_with(|| Value::Object(Map::new()));
        if !doc.is_object() {
            *doc = Value::Object(Map::new());
        }
        let Value::Object(fields) = doc else {
            unreachable!("document was just made an object")
        };
        let field = fields
            .entry(meal.as_str())
            .or_insert_with(|| Value::Array(Vec::new()));
        if !field.is_array() {
            *field = Value::Array(Vec::new());
        }
        match field {
            Value::Array(items) => items,
            _ => unreachable!("field was just made an array"),
        }
    }
}

/// In-process document store.
///
/// Used as the store double in tests and for running without a server. It
/// keeps raw JSON documents so snapshots go through the same validation as
/// network documents, and it can be switched offline to simulate outages.
#[derive(Default)]
pub struct MemoryDocumentStore {
    state: Mutex<MemoryState>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with [`StoreError::Unreachable`].
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// While rejecting, writes fail with [`StoreError::Rejected`].
    pub fn set_rejecting(&self, rejecting: bool) {
        self.lock().rejecting = rejecting;
    }

    /// Number of days with a live subscription channel.
    pub fn channel_count(&self) -> usize {
        self.lock().channels.len()
    }

    /// Writes a raw document as another device would, notifying subscribers.
    pub fn put_raw(&self, user: &str, date: NaiveDate, document: Value) {
        let mut state = self.lock();
        let key = (user.to_string(), date);
        state.documents.insert(key.clone(), document);
        state.publish(&key);
    }

    pub fn raw(&self, user: &str, date: NaiveDate) -> Option<Value> {
        self.lock().documents.get(&(user.to_string(), date)).cloned()
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // A poisoned lock only means a test panicked mid-write; the map is
        // still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn entry_value(entry: &FoodEntry) -> Result<Value, StoreError> {
    serde_json::to_value(entry).map_err(|e| StoreError::Rejected(e.to_string()))
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn append(
        &self,
        user: &str,
        date: NaiveDate,
        meal: MealSlot,
        entry: &FoodEntry,
    ) -> Result<(), StoreError> {
        let value = entry_value(entry)?;
        let mut state = self.lock();
        state.check_writable()?;

        let key = (user.to_string(), date);
        state.meal_array(key.clone(), meal).push(value);
        state.publish(&key);
        Ok(())
    }

    async fn replace(
        &self,
        user: &str,
        date: NaiveDate,
        meal: MealSlot,
        entries: &[FoodEntry],
    ) -> Result<(), StoreError> {
        let values = entries
            .iter()
            .map(entry_value)
            .collect::<Result<Vec<_>, _>>()?;
        let mut state = self.lock();
        state.check_writable()?;

        let key = (user.to_string(), date);
        *state.meal_array(key.clone(), meal) = values;
        state.publish(&key);
        Ok(())
    }

    async fn fetch(&self, user: &str, date: NaiveDate) -> Result<DayLog, StoreError> {
        let state = self.lock();
        state.check_online()?;

        match state.documents.get(&(user.to_string(), date)) {
            Some(doc) => Ok(DayLog::from_document(doc)?),
            None => Ok(DayLog::new()),
        }
    }

    async fn subscribe(&self, user: &str, date: NaiveDate) -> Result<SnapshotStream, StoreError> {
        let mut state = self.lock();
        state.check_online()?;

        let key = (user.to_string(), date);
        let current = state
            .documents
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        state.prune_channels();
        let receiver = state
            .channels
            .entry(key)
            .or_insert_with(|| broadcast::channel(16).0)
            .subscribe();

        let updates = stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(doc) => return Some((doc, receiver)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!("Snapshot subscriber skipped {} update(s)", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(quarantine_malformed(stream::once(async move { current }).chain(updates)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn toast() -> FoodEntry {
        FoodEntry::new("Toast", 80, 3.0, 15.0, 1.0)
    }

    #[tokio::test]
    async fn test_append_then_fetch() {
        let store = MemoryDocumentStore::new();
        store.append("u1", date(), MealSlot::Breakfast, &toast()).await.unwrap();
        store.append("u1", date(), MealSlot::Breakfast, &toast()).await.unwrap();

        let day = store.fetch("u1", date()).await.unwrap();
        assert_eq!(day.entries(MealSlot::Breakfast).len(), 2);
        assert!(store.fetch("u2", date()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_overwrites_only_that_meal() {
        let store = MemoryDocumentStore::new();
        store.append("u1", date(), MealSlot::Lunch, &toast()).await.unwrap();
        store.append("u1", date(), MealSlot::Dinner, &toast()).await.unwrap();
        store.replace("u1", date(), MealSlot::Lunch, &[]).await.unwrap();

        let day = store.fetch("u1", date()).await.unwrap();
        assert!(day.entries(MealSlot::Lunch).is_empty());
        assert_eq!(day.entries(MealSlot::Dinner).len(), 1);
        assert_eq!(store.raw("u1", date()).unwrap()["Lunch"], json!([]));
    }

    #[tokio::test]
    async fn test_offline_fails() {
        let store = MemoryDocumentStore::new();
        store.set_offline(true);
        let err = store.append("u1", date(), MealSlot::Lunch, &toast()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unreachable(_)));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_rejects_malformed_document() {
        let store = MemoryDocumentStore::new();
        store.put_raw("u1", date(), json!({"Lunch": {"not": "a list"}}));
        let err = store.fetch("u1", date()).await.unwrap_err();
        assert!(matches!(err, StoreError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_subscribe_pushes_current_then_changes_and_skips_malformed() {
        let store = MemoryDocumentStore::new();
        let mut snapshots = store.subscribe("u1", date()).await.unwrap();

        assert!(snapshots.next().await.unwrap().is_empty());

        store.put_raw("u1", date(), json!({"Dinner": 42}));
        store.append("u1", date(), MealSlot::Dinner, &toast()).await.unwrap();

        let day = snapshots.next().await.unwrap();
        assert_eq!(day.entries(MealSlot::Dinner), &[toast()]);
    }

    #[tokio::test]
    async fn test_rejecting_store_refuses_writes() {
        let store = MemoryDocumentStore::new();
        store.set_rejecting(true);
        let err = store.replace("u1", date(), MealSlot::Lunch, &[]).await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
        assert!(store.raw("u1", date()).is_none());
    }

    #[tokio::test]
    async fn test_channels_dropped_after_last_subscriber_leaves() {
        let store = MemoryDocumentStore::new();
        let first = store.subscribe("u1", date()).await.unwrap();
        let other_day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let second = store.subscribe("u1", other_day).await.unwrap();
        assert_eq!(store.channel_count(), 2);

        drop(first);
        store.append("u1", date(), MealSlot::Lunch, &toast()).await.unwrap();
        assert_eq!(store.channel_count(), 1);

        drop(second);
        store.append("u1", other_day, MealSlot::Lunch, &toast()).await.unwrap();
        assert_eq!(store.channel_count(), 0);
    }
}
