//! Fan-out of day document changes to WebSocket subscribers.

use chrono::NaiveDate;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

/// Tracks subscribers per (user, date) for broadcasting updated documents.
pub struct DayHub {
    channels: RwLock<HashMap<(String, NaiveDate), broadcast::Sender<Value>>>,
}

impl DayHub {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribes to updates for one user's day.
    pub async fn subscribe(&self, user_id: &str, date: NaiveDate) -> broadcast::Receiver<Value> {
        let key = (user_id.to_string(), date);

        let mut channels = self.channels.write().await;

        if let Some(sender) = channels.get(&key) {
            sender.subscribe()
        } else {
            let (sender, receiver) = broadcast::channel(16);
            channels.insert(key, sender);
            receiver
        }
    }

    /// Sends the full updated document to everyone watching that day.
    pub async fn broadcast(&self, user_id: &str, date: NaiveDate, document: Value) {
        let key = (user_id.to_string(), date);

        let channels = self.channels.read().await;

        if let Some(sender) = channels.get(&key) {
            // No receivers left is fine
            let _ = sender.send(document);
        }
    }
}

impl DayHub {
    /// Forgets the day's channel once nobody is subscribed to it.
    pub async fn release(&self, user_id: &str, date: NaiveDate) {
        let key = (user_id.to_string(), date);

        let mut channels = self.channels.write().await;

        if channels
            .get(&key)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(&key);
        }
    }

    /// Number of days with a live channel.
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

impl Default for DayHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[tokio::test]
    async fn test_subscribe_and_broadcast() {
        let hub = DayHub::new();
        let mut rx = hub.subscribe("alice", date()).await;

        hub.broadcast("alice", date(), json!({"Lunch": []})).await;

        assert_eq!(rx.try_recv().unwrap(), json!({"Lunch": []}));
    }

    #[tokio::test]
    async fn test_days_and_users_are_isolated() {
        let hub = DayHub::new();
        let other_day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let mut rx_day = hub.subscribe("alice", other_day).await;
        let mut rx_user = hub.subscribe("bob", date()).await;

        hub.broadcast("alice", date(), json!({})).await;

        assert!(rx_day.try_recv().is_err());
        assert!(rx_user.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_release_drops_channel_after_last_subscriber() {
        let hub = DayHub::new();
        let first = hub.subscribe("alice", date()).await;
        let second = hub.subscribe("alice", date()).await;
        assert_eq!(hub.channel_count().await, 1);

        drop(first);
        hub.release("alice", date()).await;
        assert_eq!(hub.channel_count().await, 1);

        drop(second);
        hub.release("alice", date()).await;
        assert_eq!(hub.channel_count().await, 0);

        // Broadcasting to a released day is a no-op.
        hub.broadcast("alice", date(), json!({})).await;
        assert_eq!(hub.channel_count().await, 0);
    }
}
