//! In-memory food log, the single source of truth for what the user sees.
//!
//! Mutators update the day immediately and hand the matching
//! [`PendingMutation`] to the sync worker without waiting for it. Remote
//! snapshots replace a day wholesale.

use chrono::NaiveDate;
use futures::StreamExt;
use std::collections::BTreeMap;

use crate::models::{DayLog, FoodEntry, MealSlot, MutationOp, PendingMutation};
use crate::sync::{SnapshotStream, SyncHandle};

#[derive(Debug, Default)]
pub struct LogStore {
    days: BTreeMap<NaiveDate, DayLog>,
    sync: Option<SyncHandle>,
}

impl LogStore {
    /// A log with no sync attached. Edits stay local.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sync(sync: SyncHandle) -> Self {
        Self {
            days: BTreeMap::new(),
            sync: Some(sync),
        }
    }

    /// The day's log. Dates never touched read as an empty day.
    pub fn day(&self, date: NaiveDate) -> DayLog {
        self.days.get(&date).cloned().unwrap_or_default()
    }

    pub fn entries(&self, date: NaiveDate, meal: MealSlot) -> &[FoodEntry] {
        self.days
            .get(&date)
            .map(|day| day.entries(meal))
            .unwrap_or(&[])
    }

    pub fn add_entry(&mut self, date: NaiveDate, meal: MealSlot, entry: FoodEntry) {
        tracing::debug!("Adding {} to {} {}", entry.name, date, meal);
        self.days
            .entry(date)
            .or_default()
            .entries_mut(meal)
            .push(entry.clone());
        self.emit(PendingMutation::append(date, meal, entry));
    }

    /// Removes the entry at `index`. Out-of-range indexes change nothing.
    pub fn delete_entry(&mut self, date: NaiveDate, meal: MealSlot, index: usize) -> Option<FoodEntry> {
        let entries = self.days.get_mut(&date)?.entries_mut(meal);
        if index >= entries.len() {
            return None;
        }
        let removed = entries.remove(index);
        let remaining = entries.clone();
        self.emit(PendingMutation::replace_slot(date, meal, remaining));
        Some(removed)
    }

    /// Empties the meal and returns how many entries were removed.
    pub fn clear_meal(&mut self, date: NaiveDate, meal: MealSlot) -> usize {
        let Some(day) = self.days.get_mut(&date) else {
            return 0;
        };
        let entries = day.entries_mut(meal);
        if entries.is_empty() {
            return 0;
        }
        let removed = entries.len();
        entries.clear();
        self.emit(PendingMutation::clear_slot(date, meal));
        removed
    }

    /// Replaces the local day with a remote snapshot. Last writer wins.
    pub fn apply_remote_snapshot(&mut self, date: NaiveDate, snapshot: DayLog) {
        tracing::debug!("Applying remote snapshot for {}", date);
        self.days.insert(date, snapshot);
    }

    /// Re-applies changes that have not reached the store yet on top of the
    /// current days. Nothing is submitted again.
    pub fn replay_pending<'a, I>(&mut self, pending: I)
    where
        I: IntoIterator<Item = &'a PendingMutation>,
    {
        for mutation in pending {
            let entries = self
                .days
                .entry(mutation.date)
                .or_default()
                .entries_mut(mutation.meal);
            match &mutation.op {
                MutationOp::Append(entry) => entries.push(entry.clone()),
                MutationOp::ReplaceSlot(replacement) => *entries = replacement.clone(),
                MutationOp::ClearSlot => entries.clear(),
            }
        }
    }

    /// Applies every snapshot from `snapshots` to `date`, calling `on_change`
    /// with the updated day each time. Returns when the stream ends.
    pub async fn follow<F>(
        &mut self,
        date: NaiveDate,
        mut snapshots: SnapshotStream,
        mut on_change: F,
    ) where
        F: FnMut(&DayLog),
    {
        while let Some(snapshot) = snapshots.next().await {
            self.apply_remote_snapshot(date, snapshot);
            if let Some(day) = self.days.get(&date) {
                on_change(day);
            }
        }
    }

    fn emit(&self, mutation: PendingMutation) {
        if let Some(sync) = &self.sync {
            sync.submit(mutation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{DocumentStore, MemoryDocumentStore, SyncEngine, SyncRequest, SyncWorker};
    use futures::StreamExt;
    use std::sync::Arc;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn entry(name: &str) -> FoodEntry {
        FoodEntry::new(name, 100, 2.0, 10.0, 1.0)
    }

    #[test]
    fn test_add_then_delete_last_restores_day() {
        let mut log = LogStore::new();
        log.add_entry(date(), MealSlot::Lunch, entry("Soup"));
        let before = log.day(date());

        log.add_entry(date(), MealSlot::Lunch, entry("Bread"));
        let last = log.entries(date(), MealSlot::Lunch).len() - 1;
        let removed = log.delete_entry(date(), MealSlot::Lunch, last).unwrap();

        assert_eq!(removed.name, "Bread");
        assert_eq!(log.day(date()), before);
    }

    #[test]
    fn test_missing_day_reads_empty() {
        let log = LogStore::new();
        assert!(log.day(date()).is_empty());
        assert!(log.entries(date(), MealSlot::Dinner).is_empty());
    }

    #[test]
    fn test_mutations_are_submitted() {
        let (handle, mut rx) = SyncHandle::channel();
        let mut log = LogStore::with_sync(handle);

        log.add_entry(date(), MealSlot::Dinner, entry("Rice"));
        log.add_entry(date(), MealSlot::Dinner, entry("Beans"));
        log.delete_entry(date(), MealSlot::Dinner, 0);
        log.clear_meal(date(), MealSlot::Dinner);

        let kinds: Vec<&str> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|request| match request {
                SyncRequest::Persist(m) => m.op.kind(),
                other => panic!("unexpected request {:?}", other),
            })
            .collect();
        assert_eq!(kinds, vec!["append", "append", "replace-slot", "clear-slot"]);
    }

    #[test]
    fn test_out_of_range_delete_is_noop() {
        let (handle, mut rx) = SyncHandle::channel();
        let mut log = LogStore::with_sync(handle);
        log.add_entry(date(), MealSlot::Lunch, entry("Soup"));
        let _ = rx.try_recv();

        assert!(log.delete_entry(date(), MealSlot::Lunch, 5).is_none());
        assert!(log.delete_entry(date(), MealSlot::Snacks, 0).is_none());
        assert_eq!(log.entries(date(), MealSlot::Lunch).len(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_clear_empty_meal_queues_nothing() {
        let (handle, mut rx) = SyncHandle::channel();
        let mut log = LogStore::with_sync(handle);

        assert_eq!(log.clear_meal(date(), MealSlot::Snacks), 0);
        log.add_entry(date(), MealSlot::Lunch, entry("Soup"));
        let _ = rx.try_recv();
        assert_eq!(log.clear_meal(date(), MealSlot::Snacks), 0);

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_replay_pending_rebuilds_local_changes_without_resubmitting() {
        let (handle, mut rx) = SyncHandle::channel();
        let mut log = LogStore::with_sync(handle);
        let pending = vec![
            PendingMutation::append(date(), MealSlot::Lunch, entry("Soup")),
            PendingMutation::append(date(), MealSlot::Lunch, entry("Bread")),
            PendingMutation::replace_slot(date(), MealSlot::Lunch, vec![entry("Bread")]),
            PendingMutation::append(date(), MealSlot::Dinner, entry("Rice")),
            PendingMutation::clear_slot(date(), MealSlot::Dinner),
        ];

        log.replay_pending(&pending);

        let names: Vec<_> = log
            .entries(date(), MealSlot::Lunch)
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, vec!["Bread"]);
        assert!(log.entries(date(), MealSlot::Dinner).is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_follow_feeds_snapshots_into_log() {
        let store = MemoryDocumentStore::new();
        let snapshots = store.subscribe("u1", date()).await.unwrap();
        store
            .append("u1", date(), MealSlot::Snacks, &entry("Chips"))
            .await
            .unwrap();
        store.put_raw("u1", date(), serde_json::json!({"Snacks": "broken"}));
        store
            .replace("u1", date(), MealSlot::Snacks, &[entry("Nuts")])
            .await
            .unwrap();

        let mut log = LogStore::new();
        let mut seen = Vec::new();
        let followed = log.follow(date(), snapshots, |day| {
            seen.push(day.entries(MealSlot::Snacks).len());
        });
        // The stream never ends on its own; stop once the updates are drained.
        let _ = tokio::time::timeout(std::time::Duration::from_millis(200), followed).await;

        assert_eq!(seen, vec![0, 1, 1]);
        let names: Vec<_> = log
            .entries(date(), MealSlot::Snacks)
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, vec!["Nuts"]);
    }

    #[tokio::test]
    async fn test_snapshot_after_local_clear_wins_over_remote_append() {
        let store = Arc::new(MemoryDocumentStore::new());
        store
            .append("u1", date(), MealSlot::Lunch, &entry("A"))
            .await
            .unwrap();

        let engine = Arc::new(SyncEngine::new(store.clone(), "u1"));
        let (handle, _task) = SyncWorker::spawn(engine);
        let mut log = LogStore::with_sync(handle.clone());
        log.apply_remote_snapshot(date(), store.fetch("u1", date()).await.unwrap());

        // Another device appends B before our clear reaches the store.
        store
            .append("u1", date(), MealSlot::Lunch, &entry("B"))
            .await
            .unwrap();
        let mut snapshots = store.subscribe("u1", date()).await.unwrap();
        let _current = snapshots.next().await.unwrap();

        assert_eq!(log.clear_meal(date(), MealSlot::Lunch), 1);
        handle.settled().await;

        let snapshot = snapshots.next().await.unwrap();
        log.apply_remote_snapshot(date(), snapshot);

        assert!(log.entries(date(), MealSlot::Lunch).is_empty());
        let remote = store.fetch("u1", date()).await.unwrap();
        assert!(remote.entries(MealSlot::Lunch).is_empty());
    }
}
