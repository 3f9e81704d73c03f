//! Leadership Engine
//!
//! Drives one process's belief about its own leadership in one namespace,
//! arbitrated solely by the store's atomic conditional writes.
//!
//! Each engine runs on its own tokio task. Periodic ticks (every half lease)
//! and leader-key removal notifications are multiplexed onto that task, so
//! ticks for one engine never interleave.
//!
//! # Consistency
//!
//! Leadership is a lease without fencing tokens. A leader cut off from the
//! store keeps believing it leads until its next renewal attempt fails, while
//! the others may already have elected a successor once its entry expired.
//! Callers needing stronger guarantees must fence downstream work themselves.

use crate::member::{LeadershipRole, Member, MemberId, FOLLOWER_FLAG, LEADER_KEY};
use crate::metrics::{self, LeadershipMetrics};
use crate::store::{NamespaceStore, StoreError, StoreEvent, Subscription};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Default lease applied to the leader key and membership entries.
pub const DEFAULT_LEASE_DURATION: Duration = Duration::from_secs(30);

/// Default bound on a single store call.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(3);

/// Lease timing configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadershipConfig {
    /// TTL of the leader key and of every membership entry
    pub lease_duration: Duration,
    /// Upper bound on each store call before it counts as failed
    pub operation_timeout: Duration,
}

impl Default for LeadershipConfig {
    fn default() -> Self {
        Self {
            lease_duration: DEFAULT_LEASE_DURATION,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }
}

impl LeadershipConfig {
    pub fn new(lease_duration: Duration) -> Self {
        Self {
            lease_duration,
            ..Default::default()
        }
    }

    /// Interval between ticks: half the lease.
    pub fn renewal_period(&self) -> Duration {
        self.lease_duration / 2
    }

    /// Checks the timing is usable.
    ///
    /// The operation timeout must be shorter than the renewal period: a
    /// leader whose renewal hangs must give up before its lease can expire
    /// under it.
    pub fn validate(&self) -> Result<(), ClusterError> {
        if self.renewal_period().is_zero() {
            return Err(ClusterError::Configuration(format!(
                "lease duration must be positive, got {:?}",
                self.lease_duration
            )));
        }
        if self.operation_timeout.is_zero() {
            return Err(ClusterError::Configuration(
                "operation timeout must be positive".to_string(),
            ));
        }
        if self.operation_timeout >= self.renewal_period() {
            return Err(ClusterError::Configuration(format!(
                "operation timeout {:?} must be shorter than the renewal period {:?}",
                self.operation_timeout,
                self.renewal_period()
            )));
        }
        Ok(())
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// Error type surfaced to callers of the cluster API.
///
/// Only construction and lifecycle failures show up here; per-tick store
/// failures are absorbed by the engine.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Cluster service is closed")]
    Closed,
}

// ============================================================================
// EVENTS
// ============================================================================

/// Local leadership change, broadcast to view subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeadershipEvent {
    Acquired { namespace: String, member_id: MemberId },
    Lost { namespace: String, member_id: MemberId },
}

/// Channels an engine publishes through. Owned by the view so they outlive
/// any single start/stop cycle.
#[derive(Debug, Clone)]
pub(crate) struct LeadershipPublisher {
    pub(crate) local: Arc<watch::Sender<Member>>,
    pub(crate) events: broadcast::Sender<LeadershipEvent>,
    pub(crate) metrics: LeadershipMetrics,
}

/// Runs a store call bounded by `limit`.
pub(crate) async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(StoreError::Timeout(limit)))
}

// ============================================================================
// LEADERSHIP ENGINE
// ============================================================================

pub(crate) struct LeadershipEngine {
    namespace: String,
    member_id: MemberId,
    role: LeadershipRole,
    store: Arc<dyn NamespaceStore>,
    config: LeadershipConfig,
    publisher: LeadershipPublisher,
}

/// Control handle for a running engine task.
#[derive(Debug)]
pub(crate) struct EngineHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl EngineHandle {
    /// Stops the schedule, then waits for the engine to release its entries.
    pub(crate) async fn stop(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Leadership engine task failed");
        }
    }

    /// Kills the task without releasing anything, as a crash would.
    #[cfg(test)]
    pub(crate) fn abort(self) {
        self.task.abort();
    }
}

impl LeadershipEngine {
    pub(crate) fn new(
        namespace: impl Into<String>,
        member_id: impl Into<MemberId>,
        store: Arc<dyn NamespaceStore>,
        config: LeadershipConfig,
        publisher: LeadershipPublisher,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            member_id: member_id.into(),
            role: LeadershipRole::Stopped,
            store,
            config,
            publisher,
        }
    }

    /// Registers the membership entry, subscribes to leader-key removals and
    /// spawns the election loop. The first tick runs immediately.
    pub(crate) async fn start(mut self) -> Result<EngineHandle, ClusterError> {
        let lease = self.config.lease_duration;
        self.call(self.store.put(&self.member_id, FOLLOWER_FLAG, lease))
            .await?;

        let subscription = match self.store.subscribe() {
            Ok(subscription) => subscription,
            Err(e) => {
                let _ = self.call(self.store.remove(&self.member_id)).await;
                return Err(e.into());
            }
        };

        self.transition(LeadershipRole::Follower, "started");

        tracing::info!(
            namespace = %self.namespace,
            member_id = %self.member_id,
            lease_ms = lease.as_millis() as u64,
            "Starting leadership engine"
        );

        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(subscription, shutdown_rx));

        Ok(EngineHandle { shutdown, task })
    }

    // ========================================================================
    // MAIN LOOP
    // ========================================================================

    async fn run(mut self, subscription: Subscription, mut shutdown: oneshot::Receiver<()>) {
        let mut subscription = Some(subscription);
        let mut ticker = tokio::time::interval(self.config.renewal_period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                // Sender dropped counts as a stop request too
                _ = &mut shutdown => break,

                _ = ticker.tick() => self.guarded_tick().await,

                event = next_event(&mut subscription) => match event {
                    Some(event) if event.key() == LEADER_KEY => {
                        self.publisher.metrics.inc_notifications();
                        tracing::debug!(
                            namespace = %self.namespace,
                            member_id = %self.member_id,
                            event = ?event,
                            "Leader key disappeared, running election"
                        );
                        self.guarded_tick().await;
                    }
                    Some(_) => {}
                    None => {
                        tracing::warn!(
                            namespace = %self.namespace,
                            member_id = %self.member_id,
                            "Store notifications closed, relying on periodic ticks"
                        );
                        subscription = None;
                    }
                },
            }
        }

        drop(ticker);
        if let Some(subscription) = subscription.take() {
            subscription.unsubscribe();
        }

        self.release().await;
    }

    async fn guarded_tick(&mut self) {
        let started = Instant::now();

        if AssertUnwindSafe(self.tick()).catch_unwind().await.is_err() {
            tracing::error!(
                namespace = %self.namespace,
                member_id = %self.member_id,
                "Election tick panicked, schedule continues"
            );
        }

        self.publisher.metrics.observe_tick(started.elapsed());
    }

    /// One election round: renew if leading, try to acquire if following,
    /// then refresh the membership entry.
    pub(crate) async fn tick(&mut self) {
        self.publisher.metrics.inc_ticks();

        if self.role == LeadershipRole::Leader {
            self.renew().await;
        }

        if self.role == LeadershipRole::Follower {
            let lease = self.config.lease_duration;
            let result = self
                .call(self.store.put_if_absent(LEADER_KEY, &self.member_id, lease))
                .await;

            match result {
                Ok(None) => self.transition(LeadershipRole::Leader, "acquired vacant leader key"),
                Ok(Some(holder)) if holder == self.member_id => {
                    self.transition(LeadershipRole::Leader, "recovered own leader key");
                    // the surviving entry still carries its old expiry
                    self.renew().await;
                }
                Ok(Some(holder)) => {
                    tracing::trace!(
                        namespace = %self.namespace,
                        member_id = %self.member_id,
                        leader = %holder,
                        "Leader key held by another member"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        namespace = %self.namespace,
                        member_id = %self.member_id,
                        error = %e,
                        "Failed to contend for leadership"
                    );
                }
            }
        }

        self.refresh_membership().await;
    }

    async fn renew(&mut self) {
        let lease = self.config.lease_duration;
        let result = self
            .call(self.store.compare_and_swap(LEADER_KEY, &self.member_id, &self.member_id, lease))
            .await;

        match result {
            Ok(true) => {
                self.publisher.metrics.inc_renewals();
                tracing::trace!(
                    namespace = %self.namespace,
                    member_id = %self.member_id,
                    "Renewed leader lease"
                );
            }
            Ok(false) => self.transition(LeadershipRole::Follower, "leader key expired or taken"),
            Err(e) => {
                tracing::warn!(
                    namespace = %self.namespace,
                    member_id = %self.member_id,
                    error = %e,
                    "Failed to renew leader lease"
                );
                self.transition(LeadershipRole::Follower, "renewal failed");
            }
        }
    }

    async fn refresh_membership(&self) {
        let member = self.publisher.local.borrow().clone();
        let lease = self.config.lease_duration;

        match self
            .call(self.store.put(&self.member_id, member.membership_flag(), lease))
            .await
        {
            Ok(()) => metrics::trace_membership_refreshed(
                &self.namespace,
                &self.member_id,
                member.is_leader(),
            ),
            Err(e) => {
                tracing::warn!(
                    namespace = %self.namespace,
                    member_id = %self.member_id,
                    error = %e,
                    "Failed to refresh membership entry"
                );
            }
        }
    }

    /// Best-effort release of the leader key and membership entry.
    async fn release(mut self) {
        if self.role == LeadershipRole::Leader {
            match self
                .call(self.store.remove_if_equals(LEADER_KEY, &self.member_id))
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(
                        namespace = %self.namespace,
                        member_id = %self.member_id,
                        "Leader key already gone or taken over"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        namespace = %self.namespace,
                        member_id = %self.member_id,
                        error = %e,
                        "Failed to release leader key, lease will expire"
                    );
                }
            }
        }

        if let Err(e) = self.call(self.store.remove(&self.member_id)).await {
            tracing::warn!(
                namespace = %self.namespace,
                member_id = %self.member_id,
                error = %e,
                "Failed to remove membership entry, lease will expire"
            );
        }

        self.transition(LeadershipRole::Stopped, "stopped");

        tracing::info!(
            namespace = %self.namespace,
            member_id = %self.member_id,
            "Leadership engine stopped"
        );
    }

    // ========================================================================
    // ROLE TRANSITIONS
    // ========================================================================

    fn transition(&mut self, role: LeadershipRole, reason: &str) {
        let old_role = self.role;
        if old_role == role {
            return;
        }

        self.role = role;
        let member =
            Member::new(self.member_id.clone()).with_leadership(role == LeadershipRole::Leader);
        self.publisher.local.send_replace(member);
        self.publisher.metrics.set_role(role);

        tracing::debug!(
            namespace = %self.namespace,
            member_id = %self.member_id,
            from_role = %old_role,
            to_role = %role,
            "Leadership role changed"
        );

        if role == LeadershipRole::Leader {
            self.publisher.metrics.inc_acquisitions();
            metrics::trace_became_leader(&self.namespace, &self.member_id, reason);
            let _ = self.publisher.events.send(LeadershipEvent::Acquired {
                namespace: self.namespace.clone(),
                member_id: self.member_id.clone(),
            });
        } else if old_role == LeadershipRole::Leader {
            self.publisher.metrics.inc_losses();
            metrics::trace_leadership_lost(&self.namespace, &self.member_id, reason);
            let _ = self.publisher.events.send(LeadershipEvent::Lost {
                namespace: self.namespace.clone(),
                member_id: self.member_id.clone(),
            });
        }
    }

    async fn call<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        let result = bounded(self.config.operation_timeout, call).await;
        if result.is_err() {
            self.publisher.metrics.inc_store_errors();
        }
        result
    }

    #[cfg(test)]
    pub(crate) fn role(&self) -> LeadershipRole {
        self.role
    }
}

async fn next_event(subscription: &mut Option<Subscription>) -> Option<StoreEvent> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => futures::future::pending().await,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::store::SharedStore;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};

    const LEASE: Duration = Duration::from_secs(10);

    /// Namespace whose first `put_if_absent` panics; everything else passes
    /// through to the wrapped store.
    struct PanicOnceStore {
        inner: Arc<dyn NamespaceStore>,
        armed: AtomicBool,
    }

    #[async_trait]
    impl NamespaceStore for PanicOnceStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get(key).await
        }

        async fn put_if_absent(
            &self,
            key: &str,
            value: &str,
            ttl: Duration,
        ) -> Result<Option<String>, StoreError> {
            if self.armed.swap(false, Ordering::SeqCst) {
                panic!("store client bug");
            }
            self.inner.put_if_absent(key, value, ttl).await
        }

        async fn compare_and_swap(
            &self,
            key: &str,
            expected: &str,
            new_value: &str,
            ttl: Duration,
        ) -> Result<bool, StoreError> {
            self.inner.compare_and_swap(key, expected, new_value, ttl).await
        }

        async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
            self.inner.put(key, value, ttl).await
        }

        async fn remove_if_equals(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
            self.inner.remove_if_equals(key, expected).await
        }

        async fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.inner.remove(key).await
        }

        async fn keys(&self) -> Result<HashSet<String>, StoreError> {
            self.inner.keys().await
        }

        fn subscribe(&self) -> Result<Subscription, StoreError> {
            self.inner.subscribe()
        }
    }

    fn publisher(member_id: &str) -> LeadershipPublisher {
        let (events, _) = broadcast::channel(16);
        LeadershipPublisher {
            local: Arc::new(watch::Sender::new(Member::new(member_id))),
            events,
            metrics: LeadershipMetrics::new("ns", member_id),
        }
    }

    async fn engine(store: &InMemoryStore, member_id: &str) -> LeadershipEngine {
        let ns = store.open_namespace("ns").await.unwrap();
        let config = LeadershipConfig::new(LEASE);
        let mut engine = LeadershipEngine::new("ns", member_id, ns, config, publisher(member_id));
        engine.role = LeadershipRole::Follower;
        engine
    }

    async fn leader_value(store: &InMemoryStore) -> Option<String> {
        let ns = store.open_namespace("ns").await.unwrap();
        ns.get(LEADER_KEY).await.unwrap()
    }

    #[test]
    fn test_config_default() {
        let config = LeadershipConfig::default();
        assert_eq!(config.lease_duration, DEFAULT_LEASE_DURATION);
        assert_eq!(config.renewal_period(), Duration::from_secs(15));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_zero_lease() {
        let config = LeadershipConfig::new(Duration::ZERO);
        assert!(matches!(config.validate(), Err(ClusterError::Configuration(_))));

        // half of one nanosecond rounds to zero
        let config = LeadershipConfig::new(Duration::from_nanos(1));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_rejects_zero_timeout() {
        let config = LeadershipConfig {
            operation_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_rejects_timeout_outlasting_renewal() {
        // default 3s timeout against a 1s renewal period
        let config = LeadershipConfig::new(Duration::from_secs(2));
        assert!(matches!(config.validate(), Err(ClusterError::Configuration(_))));

        let config = LeadershipConfig {
            lease_duration: Duration::from_secs(6),
            operation_timeout: Duration::from_secs(3),
        };
        assert!(config.validate().is_err());

        let config = LeadershipConfig {
            lease_duration: Duration::from_secs(2),
            operation_timeout: Duration::from_millis(500),
        };
        assert!(config.validate().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_acquires_vacant_key() {
        let store = InMemoryStore::new();
        let mut engine = engine(&store, "m1").await;

        engine.tick().await;

        assert_eq!(engine.role(), LeadershipRole::Leader);
        assert!(engine.publisher.local.borrow().is_leader());
        assert_eq!(leader_value(&store).await, Some("m1".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_follower_when_key_held_by_other() {
        let store = InMemoryStore::new();
        let mut m1 = engine(&store, "m1").await;
        let mut m2 = engine(&store, "m2").await;

        m1.tick().await;
        m2.tick().await;

        assert_eq!(m1.role(), LeadershipRole::Leader);
        assert_eq!(m2.role(), LeadershipRole::Follower);
        assert_eq!(leader_value(&store).await, Some("m1".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_own_key_and_refreshes_lease() {
        let store = InMemoryStore::new();
        let ns = store.open_namespace("ns").await.unwrap();
        ns.put(LEADER_KEY, "m1", LEASE).await.unwrap();

        tokio::time::advance(Duration::from_secs(9)).await;
        let mut engine = engine(&store, "m1").await;
        engine.tick().await;
        assert_eq!(engine.role(), LeadershipRole::Leader);

        // past the original expiry, the renewed entry survives
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(leader_value(&store).await, Some("m1".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_leader_steps_down_when_key_taken() {
        let store = InMemoryStore::new();
        let mut engine = engine(&store, "m1").await;
        engine.tick().await;

        let ns = store.open_namespace("ns").await.unwrap();
        ns.put(LEADER_KEY, "m2", LEASE).await.unwrap();

        engine.tick().await;
        assert_eq!(engine.role(), LeadershipRole::Follower);
        assert_eq!(engine.publisher.metrics.losses_total(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_renewal_keeps_leadership_stable() {
        let store = InMemoryStore::new();
        let mut engine = engine(&store, "m1").await;

        for _ in 0..20 {
            engine.tick().await;
            tokio::time::advance(LEASE / 2).await;
        }

        assert_eq!(engine.role(), LeadershipRole::Leader);
        assert_eq!(engine.publisher.metrics.acquisitions_total(), 1);
        assert_eq!(engine.publisher.metrics.renewals_total(), 19);
        assert_eq!(leader_value(&store).await, Some("m1".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_failure_counts_as_lost_leadership() {
        let store = InMemoryStore::new();
        let connection = store.connection();
        let mut engine = engine(&connection, "m1").await;
        engine.tick().await;
        assert_eq!(engine.role(), LeadershipRole::Leader);

        connection.set_available(false);
        engine.tick().await;

        assert_eq!(engine.role(), LeadershipRole::Follower);
        assert!(engine.publisher.metrics.store_errors_total() >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_membership_entry_tracks_role() {
        let store = InMemoryStore::new();
        let mut m1 = engine(&store, "m1").await;
        let mut m2 = engine(&store, "m2").await;
        m1.tick().await;
        m2.tick().await;

        let ns = store.open_namespace("ns").await.unwrap();
        assert_eq!(ns.get("m1").await.unwrap(), Some("true".to_string()));
        assert_eq!(ns.get("m2").await.unwrap(), Some("false".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_on_transitions() {
        let store = InMemoryStore::new();
        let mut engine = engine(&store, "m1").await;
        let mut events = engine.publisher.events.subscribe();

        engine.tick().await;
        let ns = store.open_namespace("ns").await.unwrap();
        ns.remove(LEADER_KEY).await.unwrap();
        ns.put(LEADER_KEY, "m2", LEASE).await.unwrap();
        engine.tick().await;

        assert_eq!(
            events.recv().await.unwrap(),
            LeadershipEvent::Acquired {
                namespace: "ns".to_string(),
                member_id: "m1".to_string()
            }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            LeadershipEvent::Lost {
                namespace: "ns".to_string(),
                member_id: "m1".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_releases_leader_key_and_membership() {
        let store = InMemoryStore::new();
        let ns = store.open_namespace("ns").await.unwrap();
        let publisher = publisher("m1");
        let local = Arc::clone(&publisher.local);

        let config = LeadershipConfig::new(LEASE);
        let engine = LeadershipEngine::new("ns", "m1", Arc::clone(&ns), config, publisher);
        let handle = engine.start().await.unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(local.borrow().is_leader());

        handle.stop().await;

        assert!(!local.borrow().is_leader());
        assert_eq!(ns.get(LEADER_KEY).await.unwrap(), None);
        assert_eq!(ns.get("m1").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_tick_keeps_schedule_running() {
        let store = InMemoryStore::new();
        let ns = store.open_namespace("ns").await.unwrap();
        let flaky: Arc<dyn NamespaceStore> = Arc::new(PanicOnceStore {
            inner: Arc::clone(&ns),
            armed: AtomicBool::new(true),
        });
        let publisher = publisher("m1");
        let local = Arc::clone(&publisher.local);
        let metrics = publisher.metrics.clone();

        let config = LeadershipConfig::new(LEASE);
        let engine = LeadershipEngine::new("ns", "m1", flaky, config.clone(), publisher);
        let handle = engine.start().await.unwrap();

        // first tick panicked before acquiring
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!local.borrow().is_leader());
        assert_eq!(ns.get(LEADER_KEY).await.unwrap(), None);
        assert_eq!(metrics.ticks_total(), 1);

        tokio::time::sleep(config.renewal_period()).await;
        assert!(local.borrow().is_leader());
        assert_eq!(ns.get(LEADER_KEY).await.unwrap(), Some("m1".to_string()));
        assert_eq!(metrics.ticks_total(), 2);

        assert!(!handle.task.is_finished());
        handle.stop().await;
        assert_eq!(ns.get(LEADER_KEY).await.unwrap(), None);
        assert_eq!(ns.get("m1").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_fails_when_store_unreachable() {
        let store = InMemoryStore::new();
        let ns = store.open_namespace("ns").await.unwrap();
        store.set_available(false);

        let config = LeadershipConfig::new(LEASE);
        let engine = LeadershipEngine::new("ns", "m1", ns, config, publisher("m1"));
        let result = engine.start().await;

        assert!(matches!(result, Err(ClusterError::Store(StoreError::Unavailable(_)))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_call_times_out() {
        let result: Result<(), StoreError> = bounded(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(())
        })
        .await;

        assert_eq!(result, Err(StoreError::Timeout(Duration::from_millis(50))));
    }
}
