use crate::config::{random_member_id, ClusterConfig};
use crate::engine::{ClusterError, LeadershipConfig};
use crate::memory::InMemoryStore;
use crate::service::ClusterService;
use crate::store::SharedStore;
use std::sync::Arc;

/// Builder for `ClusterService`.
///
/// Provides a fluent API for configuring and creating a `ClusterService`.
pub struct ClusterServiceBuilder {
    id: Option<String>,
    namespace: Option<String>,
    store: Option<Arc<dyn SharedStore>>,
    config: LeadershipConfig,
}

impl ClusterServiceBuilder {
    /// Creates a new builder with default lease timing.
    pub fn new() -> Self {
        Self {
            id: None,
            namespace: None,
            store: None,
            config: LeadershipConfig::default(),
        }
    }

    /// Starts from a deserialized configuration.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::Configuration` if the lease timing is invalid.
    pub fn from_config(config: &ClusterConfig) -> Result<Self, ClusterError> {
        Ok(Self {
            id: config.id.clone(),
            namespace: config.namespace.clone(),
            store: None,
            config: config.leadership()?,
        })
    }

    /// Sets the member id. A random one is generated if unset.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the namespace opened by `ClusterService::default_view`.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Sets the shared store connection (required).
    pub fn with_store(mut self, store: impl SharedStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Uses an existing shared store handle.
    pub fn with_shared_store(mut self, store: Arc<dyn SharedStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Uses a fresh process-local store.
    pub fn with_memory_store(mut self) -> Self {
        self.store = Some(Arc::new(InMemoryStore::new()));
        self
    }

    /// Modifies the lease timing via a closure.
    pub fn configure<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut LeadershipConfig),
    {
        f(&mut self.config);
        self
    }

    /// Builds the `ClusterService`.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::Configuration` if no store was set or the
    /// configuration is invalid.
    pub fn build(self) -> Result<ClusterService, ClusterError> {
        let store = self.store.ok_or_else(|| {
            ClusterError::Configuration("a shared store is required for ClusterService".to_string())
        })?;
        let id = self.id.unwrap_or_else(random_member_id);

        let service = ClusterService::new(id, self.config, store)?;
        Ok(match self.namespace {
            Some(namespace) => service.with_default_namespace(namespace),
            None => service,
        })
    }
}

impl Default for ClusterServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
