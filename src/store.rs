//! Shared Store Contract
//!
//! The leadership engine never talks to a concrete cache. It consumes a
//! namespaced key-value store offering atomic conditional writes, TTL expiry
//! and removal notifications through the traits below.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Error type for store operations.
///
/// Every variant is considered transient by the leadership engine.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Notification that an entry disappeared from a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreEvent {
    /// Deleted by a write from any process.
    Removed { key: String },
    /// Dropped because its TTL elapsed without renewal.
    Expired { key: String },
}

impl StoreEvent {
    /// Key of the entry that disappeared.
    pub fn key(&self) -> &str {
        match self {
            StoreEvent::Removed { key } | StoreEvent::Expired { key } => key,
        }
    }
}

/// Receiving end of a namespace's removal notifications.
///
/// The store only enqueues; consumers drain on their own task. Dropping the
/// subscription unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::UnboundedReceiver<StoreEvent>,
}

impl Subscription {
    pub fn new(events: mpsc::UnboundedReceiver<StoreEvent>) -> Self {
        Self { events }
    }

    /// Waits for the next notification. `None` once the store side is gone.
    pub async fn recv(&mut self) -> Option<StoreEvent> {
        self.events.recv().await
    }

    /// Stops delivery. Events already queued are discarded.
    pub fn unsubscribe(mut self) {
        self.events.close();
    }
}

/// A store connection able to open namespaced handles.
#[async_trait]
pub trait SharedStore: Send + Sync {
    /// Acquires a handle scoped to `namespace`.
    ///
    /// Failure here is fatal for the caller (a view cannot start without it).
    async fn open_namespace(&self, namespace: &str) -> Result<Arc<dyn NamespaceStore>, StoreError>;
}

/// Operations on a single namespace. All writes carrying a `ttl` replace the
/// entry's expiry.
#[async_trait]
pub trait NamespaceStore: Send + Sync {
    /// Current value of `key`, if present and not expired.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Atomically stores `value` only if `key` is absent.
    ///
    /// Returns `None` on success, otherwise the value already present.
    async fn put_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<Option<String>, StoreError>;

    /// Atomically replaces `expected` with `new_value`.
    ///
    /// Fails if the key is absent or holds a different value.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        new_value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Unconditional upsert.
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Atomically deletes `key` only if it holds `expected`.
    async fn remove_if_equals(&self, key: &str, expected: &str) -> Result<bool, StoreError>;

    /// Unconditional delete.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Snapshot of live keys.
    async fn keys(&self) -> Result<HashSet<String>, StoreError>;

    /// Registers for removal and expiry notifications on this namespace.
    fn subscribe(&self) -> Result<Subscription, StoreError>;

    /// Releases the handle. Called once when the owning view stops.
    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_key() {
        let removed = StoreEvent::Removed { key: "a".to_string() };
        let expired = StoreEvent::Expired { key: "b".to_string() };
        assert_eq!(removed.key(), "a");
        assert_eq!(expired.key(), "b");
    }

    #[test]
    fn test_event_serialization() {
        let event = StoreEvent::Expired {
            key: "__leader".to_string(),
        };
        let serialized = serde_json::to_vec(&event).unwrap();
        let deserialized: StoreEvent = serde_json::from_slice(&serialized).unwrap();

        match deserialized {
            StoreEvent::Expired { key } => assert_eq!(key, "__leader"),
            _ => panic!("Wrong event type"),
        }
    }

    #[tokio::test]
    async fn test_subscription_receives_until_unsubscribed() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscription = Subscription::new(rx);

        tx.send(StoreEvent::Removed { key: "m1".to_string() }).unwrap();
        assert_eq!(subscription.recv().await.unwrap().key(), "m1");

        subscription.unsubscribe();
        assert!(tx.send(StoreEvent::Removed { key: "m2".to_string() }).is_err());
    }
}
