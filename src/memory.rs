//! In-Memory Store
//!
//! A process-local implementation of the shared store contract. Entries carry
//! an expiry instant and are purged lazily on every call, or periodically when
//! a reaper is spawned. Useful for tests and for single-process deployments
//! where every member lives in the same runtime.

use crate::store::{NamespaceStore, SharedStore, StoreError, StoreEvent, Subscription};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Floor applied to the reaper period.
const MIN_REAP_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct NamespaceState {
    entries: HashMap<String, Entry>,
    subscribers: Vec<mpsc::UnboundedSender<StoreEvent>>,
}

impl NamespaceState {
    fn purge_expired(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(key, _)| key.clone())
            .collect();

        for key in expired {
            self.entries.remove(&key);
            tracing::trace!(key = %key, "Entry expired");
            self.notify(StoreEvent::Expired { key });
        }
    }

    fn notify(&mut self, event: StoreEvent) {
        // closed receivers are unsubscribed consumers
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn value(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|e| e.value.as_str())
    }

    fn insert(&mut self, key: &str, value: &str, ttl: Duration) {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    fn delete(&mut self, key: &str) -> bool {
        if self.entries.remove(key).is_some() {
            self.notify(StoreEvent::Removed { key: key.to_string() });
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    namespaces: HashMap<String, NamespaceState>,
}

/// Shared TTL store held in process memory.
///
/// Cloning shares both the data and the availability switch. Use
/// [`InMemoryStore::connection`] for a handle with its own switch, which lets
/// a test partition one member from the store while others keep working.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
    available: Arc<AtomicBool>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// A new handle over the same data with an independent availability switch.
    pub fn connection(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Makes every call through this handle fail with `StoreError::Unavailable`
    /// while `false`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Drops every expired entry in every namespace, emitting `Expired` events.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        match self.state.lock() {
            Ok(mut state) => {
                for ns in state.namespaces.values_mut() {
                    ns.purge_expired(now);
                }
            }
            Err(_) => tracing::error!("In-memory store lock poisoned, skipping purge"),
        }
    }

    /// Spawns a background task purging expired entries every `period`, so
    /// expiry notifications fire even when nobody touches the namespace.
    ///
    /// Must be called from within a tokio runtime. A zero `period` is raised
    /// to one millisecond.
    pub fn spawn_reaper(&self, period: Duration) -> JoinHandle<()> {
        let store = self.clone();
        let period = period.max(MIN_REAP_PERIOD);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                store.purge_expired();
            }
        })
    }

    fn with_namespace<R>(
        &self,
        namespace: &str,
        f: impl FnOnce(&mut NamespaceState) -> R,
    ) -> Result<R, StoreError> {
        if !self.is_available() {
            return Err(StoreError::Unavailable(format!(
                "connection to namespace '{}' is down",
                namespace
            )));
        }

        let mut state = self
            .state
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))?;
        let ns = state.namespaces.entry(namespace.to_string()).or_default();
        ns.purge_expired(Instant::now());
        Ok(f(ns))
    }
}

#[async_trait]
impl SharedStore for InMemoryStore {
    async fn open_namespace(&self, namespace: &str) -> Result<Arc<dyn NamespaceStore>, StoreError> {
        self.with_namespace(namespace, |_| ())?;
        tracing::debug!(namespace = namespace, "Opened in-memory namespace");
        Ok(Arc::new(MemoryNamespace {
            store: self.clone(),
            namespace: namespace.to_string(),
        }))
    }
}

/// Handle over one namespace of an [`InMemoryStore`].
#[derive(Debug)]
struct MemoryNamespace {
    store: InMemoryStore,
    namespace: String,
}

#[async_trait]
impl NamespaceStore for MemoryNamespace {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.store
            .with_namespace(&self.namespace, |ns| ns.value(key).map(str::to_string))
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<Option<String>, StoreError> {
        self.store.with_namespace(&self.namespace, |ns| {
            if let Some(existing) = ns.value(key) {
                return Some(existing.to_string());
            }
            ns.insert(key, value, ttl);
            None
        })
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        new_value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.store.with_namespace(&self.namespace, |ns| {
            if ns.value(key) == Some(expected) {
                ns.insert(key, new_value, ttl);
                true
            } else {
                false
            }
        })
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.store
            .with_namespace(&self.namespace, |ns| ns.insert(key, value, ttl))
    }

    async fn remove_if_equals(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        self.store.with_namespace(&self.namespace, |ns| {
            if ns.value(key) == Some(expected) {
                ns.delete(key)
            } else {
                false
            }
        })
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.store.with_namespace(&self.namespace, |ns| {
            ns.delete(key);
        })
    }

    async fn keys(&self) -> Result<HashSet<String>, StoreError> {
        self.store
            .with_namespace(&self.namespace, |ns| ns.entries.keys().cloned().collect())
    }

    fn subscribe(&self) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.store
            .with_namespace(&self.namespace, |ns| ns.subscribers.push(tx))?;
        Ok(Subscription::new(rx))
    }

    async fn close(&self) {
        tracing::debug!(namespace = %self.namespace, "Closed in-memory namespace");
    }
}

// ============================================================================
// TESTS
// ============================================================================
