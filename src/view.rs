//! Cluster View
//!
//! Per-namespace façade composing the local member, its leadership engine and
//! read accessors over the shared store.

use crate::engine::{
    bounded, ClusterError, EngineHandle, LeadershipConfig, LeadershipEngine, LeadershipEvent,
    LeadershipPublisher,
};
use crate::member::{Member, MemberId, LEADER_KEY};
use crate::metrics::LeadershipMetrics;
use crate::store::{NamespaceStore, SharedStore};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, RwLock};

const EVENT_CAPACITY: usize = 64;

/// Resources held while the view is started.
struct Running {
    store: Arc<dyn NamespaceStore>,
    engine: EngineHandle,
}

/// One member's view of a cluster namespace.
///
/// Accessors never fail: before `start()`, after `stop()` or while the store
/// is unreachable they answer with an empty list, `None` or `false`.
pub struct ClusterView {
    namespace: String,
    member_id: MemberId,
    config: LeadershipConfig,
    store: Arc<dyn SharedStore>,
    publisher: LeadershipPublisher,
    running: RwLock<Option<Running>>,
}

impl std::fmt::Debug for ClusterView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterView")
            .field("namespace", &self.namespace)
            .field("member_id", &self.member_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ClusterView {
    /// Creates a stopped view.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::Configuration` for an empty namespace or member
    /// id, or an invalid lease.
    pub fn new(
        namespace: impl Into<String>,
        member_id: impl Into<MemberId>,
        config: LeadershipConfig,
        store: Arc<dyn SharedStore>,
    ) -> Result<Self, ClusterError> {
        let namespace = namespace.into();
        let member_id = member_id.into();

        if namespace.is_empty() {
            return Err(ClusterError::Configuration("namespace must not be empty".to_string()));
        }
        if member_id.is_empty() {
            return Err(ClusterError::Configuration("member id must not be empty".to_string()));
        }
        if member_id == LEADER_KEY {
            return Err(ClusterError::Configuration(format!(
                "member id '{}' is reserved",
                LEADER_KEY
            )));
        }
        config.validate()?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let publisher = LeadershipPublisher {
            local: Arc::new(watch::Sender::new(Member::new(member_id.clone()))),
            events,
            metrics: LeadershipMetrics::new(namespace.clone(), member_id.clone()),
        };

        Ok(Self {
            namespace,
            member_id,
            config,
            store,
            publisher,
            running: RwLock::new(None),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn metrics(&self) -> &LeadershipMetrics {
        &self.publisher.metrics
    }

    pub async fn is_started(&self) -> bool {
        self.running.read().await.is_some()
    }

    /// Opens the namespace and starts the leadership engine. No-op if already
    /// started.
    ///
    /// # Errors
    ///
    /// Fails if the namespace cannot be opened or the initial membership entry
    /// cannot be written. Nothing stays acquired on failure.
    pub async fn start(&self) -> Result<(), ClusterError> {
        let mut running = self.running.write().await;
        if running.is_some() {
            return Ok(());
        }

        let store = self.store.open_namespace(&self.namespace).await?;
        let engine = LeadershipEngine::new(
            self.namespace.clone(),
            self.member_id.clone(),
            Arc::clone(&store),
            self.config.clone(),
            self.publisher.clone(),
        );

        match engine.start().await {
            Ok(engine) => {
                *running = Some(Running { store, engine });
                tracing::info!(
                    namespace = %self.namespace,
                    member_id = %self.member_id,
                    "Cluster view started"
                );
                Ok(())
            }
            Err(e) => {
                store.close().await;
                tracing::warn!(
                    namespace = %self.namespace,
                    member_id = %self.member_id,
                    error = %e,
                    "Cluster view failed to start"
                );
                Err(e)
            }
        }
    }

    /// Stops the engine, releasing leadership and membership, then closes the
    /// namespace handle. No-op if not started.
    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        let Some(Running { store, engine }) = running.take() else {
            return;
        };

        engine.stop().await;
        store.close().await;

        tracing::info!(
            namespace = %self.namespace,
            member_id = %self.member_id,
            "Cluster view stopped"
        );
    }

    /// This process's member; its leadership flag is the engine's belief.
    pub fn local_member(&self) -> Member {
        self.publisher.local.borrow().clone()
    }

    /// Follows local member changes.
    pub fn watch_local_member(&self) -> watch::Receiver<Member> {
        self.publisher.local.subscribe()
    }

    /// Local leadership acquired/lost notifications.
    pub fn events(&self) -> broadcast::Receiver<LeadershipEvent> {
        self.publisher.events.subscribe()
    }

    /// All members with a live membership entry, sorted by id.
    ///
    /// Leadership flags are always `false` here; use [`ClusterView::leader`]
    /// to learn who leads.
    pub async fn members(&self) -> Vec<Member> {
        let Some(store) = self.store_handle().await else {
            return Vec::new();
        };

        match bounded(self.config.operation_timeout, store.keys()).await {
            Ok(keys) => {
                let mut members: Vec<Member> = keys
                    .into_iter()
                    .filter(|key| key != LEADER_KEY)
                    .map(|key| Member::new(key))
                    .collect();
                members.sort_by(|a, b| a.id().cmp(b.id()));
                members
            }
            Err(e) => {
                tracing::debug!(namespace = %self.namespace, error = %e, "Failed to list members");
                Vec::new()
            }
        }
    }

    /// Current leader according to the leader key.
    pub async fn leader(&self) -> Option<Member> {
        self.leader_id().await.map(|id| Member::leader(id))
    }

    /// Whether `id` currently holds the leader key.
    pub async fn is_leader(&self, id: &str) -> bool {
        self.leader_id().await.is_some_and(|leader| leader == id)
    }

    async fn leader_id(&self) -> Option<MemberId> {
        let store = self.store_handle().await?;

        match bounded(self.config.operation_timeout, store.get(LEADER_KEY)).await {
            Ok(leader) => leader,
            Err(e) => {
                tracing::debug!(
                    namespace = %self.namespace,
                    error = %e,
                    "Failed to read leader key"
                );
                None
            }
        }
    }

    async fn store_handle(&self) -> Option<Arc<dyn NamespaceStore>> {
        self.running
            .read()
            .await
            .as_ref()
            .map(|running| Arc::clone(&running.store))
    }

    /// Drops the engine without releasing anything, as a process crash would.
    #[cfg(test)]
    pub(crate) async fn crash(&self) {
        if let Some(Running { engine, .. }) = self.running.write().await.take() {
            engine.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use std::time::Duration;

    const LEASE: Duration = Duration::from_secs(10);

    fn view(store: &InMemoryStore, member_id: &str) -> ClusterView {
        let config = LeadershipConfig::new(LEASE);
        ClusterView::new("orders", member_id, config, Arc::new(store.clone())).unwrap()
    }

    #[test]
    fn test_rejects_empty_namespace() {
        let store = InMemoryStore::new();
        let result = ClusterView::new("", "m1", LeadershipConfig::default(), Arc::new(store));
        assert!(matches!(result, Err(ClusterError::Configuration(_))));
    }

    #[test]
    fn test_rejects_reserved_member_id() {
        let store = InMemoryStore::new();
        let config = LeadershipConfig::default();
        let result = ClusterView::new("orders", LEADER_KEY, config, Arc::new(store));
        assert!(matches!(result, Err(ClusterError::Configuration(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_accessors_before_start() {
        let store = InMemoryStore::new();
        let view = view(&store, "m1");

        assert!(!view.is_started().await);
        assert!(view.members().await.is_empty());
        assert!(view.leader().await.is_none());
        assert!(!view.is_leader("m1").await);
        assert_eq!(view.local_member(), Member::new("m1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_member_leads() {
        let store = InMemoryStore::new();
        let view = view(&store, "m1");
        view.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(view.local_member().is_leader());
        assert_eq!(view.leader().await, Some(Member::leader("m1")));
        assert!(view.is_leader("m1").await);
        assert_eq!(view.members().await, vec![Member::new("m1")]);

        view.stop().await;
        assert!(!view.local_member().is_leader());
        assert!(view.leader().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_members_exclude_leader_key() {
        let store = InMemoryStore::new();
        let m1 = view(&store, "m1");
        let m2 = view(&store, "m2");
        m1.start().await.unwrap();
        m2.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let ids: Vec<String> = m2.members().await.iter().map(|m| m.id().to_string()).collect();
        assert_eq!(ids, vec!["m1".to_string(), "m2".to_string()]);
        assert!(m2.members().await.iter().all(|m| !m.is_leader()));

        m1.stop().await;
        m2.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let store = InMemoryStore::new();
        let view = view(&store, "m1");
        view.start().await.unwrap();
        view.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(view.metrics().acquisitions_total(), 1);
        view.stop().await;
        view.stop().await;
        assert!(!view.is_started().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_failure_leaves_view_stopped() {
        let store = InMemoryStore::new();
        store.set_available(false);
        let view = view(&store, "m1");

        assert!(matches!(view.start().await, Err(ClusterError::Store(_))));
        assert!(!view.is_started().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_accessors_absorb_store_errors() {
        let store = InMemoryStore::new();
        let connection = store.connection();
        let view = view(&connection, "m1");
        view.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        connection.set_available(false);
        assert!(view.members().await.is_empty());
        assert!(view.leader().await.is_none());
        assert!(!view.is_leader("m1").await);

        connection.set_available(true);
        view.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_local_member() {
        let store = InMemoryStore::new();
        let view = view(&store, "m1");
        let mut local = view.watch_local_member();

        view.start().await.unwrap();
        local.wait_for(|member| member.is_leader()).await.unwrap();

        view.stop().await;
        assert!(!local.borrow_and_update().is_leader());
    }
}
