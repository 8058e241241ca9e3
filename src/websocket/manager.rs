//! Broadcast hub for data change events

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

/// A single data mutation, published after the write commits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Collection the change belongs to (`bookings`, `providers`, ...)
    pub collection: String,
    /// Id of the changed record
    pub id: String,
    /// `created`, `updated` or `deleted`
    pub action: String,
    /// Current record state, when cheap to include
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl ChangeEvent {
    pub fn new(collection: &str, id: &str, action: &str) -> Self {
        Self {
            collection: collection.to_string(),
            id: id.to_string(),
            action: action.to_string(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// True if this event falls under `topic` (`collection` or `collection:id`)
    pub fn matches(&self, topic: &str) -> bool {
        match topic.split_once(':') {
            Some((collection, id)) => collection == self.collection && id == self.id,
            None => topic == self.collection,
        }
    }
}

/// Fan-out point for change events
///
/// Slow subscribers lag rather than block writers; a lagged receiver skips
/// the missed events and keeps going.
pub struct ChangeHub {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an event; a hub with no subscribers drops it silently.
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_matching() {
        let event = ChangeEvent::new("bookings", "b-1", "updated");
        assert!(event.matches("bookings"));
        assert!(event.matches("bookings:b-1"));
        assert!(!event.matches("bookings:b-2"));
        assert!(!event.matches("providers"));
    }

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let hub = ChangeHub::new();
        let mut rx = hub.subscribe();
        hub.publish(ChangeEvent::new("providers", "p-1", "created"));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.collection, "providers");
        assert_eq!(event.action, "created");
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let hub = ChangeHub::new();
        hub.publish(ChangeEvent::new("bookings", "b-1", "created"));
        assert_eq!(hub.subscriber_count(), 0);
    }
}
