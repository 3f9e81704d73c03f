use crate::engine::{ClusterError, LeadershipConfig};
use crate::member::MemberId;
use crate::store::SharedStore;
use crate::view::ClusterView;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Default)]
struct Views {
    by_namespace: HashMap<String, Arc<ClusterView>>,
    closed: bool,
}

/// Entry point: owns the member id and one lazily started view per namespace.
///
/// All views share the same store connection.
pub struct ClusterService {
    id: MemberId,
    config: LeadershipConfig,
    default_namespace: Option<String>,
    store: Arc<dyn SharedStore>,
    views: Mutex<Views>,
}

impl std::fmt::Debug for ClusterService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterService")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("default_namespace", &self.default_namespace)
            .finish_non_exhaustive()
    }
}

impl ClusterService {
    pub fn new(
        id: impl Into<MemberId>,
        config: LeadershipConfig,
        store: Arc<dyn SharedStore>,
    ) -> Result<Self, ClusterError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ClusterError::Configuration(
                "cluster id must not be empty".to_string(),
            ));
        }
        config.validate()?;

        Ok(Self {
            id,
            config,
            default_namespace: None,
            store,
            views: Mutex::new(Views::default()),
        })
    }

    /// Id this process writes under in every namespace.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &LeadershipConfig {
        &self.config
    }

    /// Sets the namespace `default_view` opens.
    pub fn with_default_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.default_namespace = Some(namespace.into());
        self
    }

    pub fn default_namespace(&self) -> Option<&str> {
        self.default_namespace.as_deref()
    }

    /// Returns the view for the configured default namespace.
    ///
    /// # Errors
    ///
    /// `ClusterError::Configuration` if no default namespace was set,
    /// otherwise the same errors as [`ClusterService::get_view`].
    pub async fn default_view(&self) -> Result<Arc<ClusterView>, ClusterError> {
        let namespace = self.default_namespace.as_deref().ok_or_else(|| {
            ClusterError::Configuration("no default namespace configured".to_string())
        })?;
        self.get_view(namespace).await
    }

    /// Returns the started view for `namespace`, creating it on first use.
    ///
    /// # Errors
    ///
    /// Configuration or store errors from creating the view. A view that
    /// failed to start is not remembered, so the next call retries.
    pub async fn get_view(&self, namespace: &str) -> Result<Arc<ClusterView>, ClusterError> {
        let mut views = self.views.lock().await;
        if views.closed {
            return Err(ClusterError::Closed);
        }
        if let Some(view) = views.by_namespace.get(namespace) {
            return Ok(Arc::clone(view));
        }

        let view = ClusterView::new(
            namespace,
            self.id.clone(),
            self.config.clone(),
            Arc::clone(&self.store),
        )?;
        view.start().await?;

        let view = Arc::new(view);
        views.by_namespace.insert(namespace.to_string(), Arc::clone(&view));

        tracing::debug!(cluster_id = %self.id, namespace = namespace, "Created cluster view");
        Ok(view)
    }

    /// Namespaces with an open view, sorted.
    pub async fn namespaces(&self) -> Vec<String> {
        let views = self.views.lock().await;
        let mut namespaces: Vec<String> = views.by_namespace.keys().cloned().collect();
        namespaces.sort();
        namespaces
    }

    /// Whether this process leads `namespace`. `false` if no view is open
    /// for it; this never opens one.
    pub async fn is_leader(&self, namespace: &str) -> bool {
        let views = self.views.lock().await;
        views
            .by_namespace
            .get(namespace)
            .is_some_and(|view| view.local_member().is_leader())
    }

    /// Stops and forgets the view for `namespace`. Returns whether one existed.
    pub async fn release_view(&self, namespace: &str) -> bool {
        let view = self.views.lock().await.by_namespace.remove(namespace);
        match view {
            Some(view) => {
                view.stop().await;
                true
            }
            None => false,
        }
    }

    /// Stops every view. Later `get_view` calls fail with `ClusterError::Closed`.
    pub async fn close(&self) {
        let views: Vec<Arc<ClusterView>> = {
            let mut views = self.views.lock().await;
            views.closed = true;
            views.by_namespace.drain().map(|(_, view)| view).collect()
        };

        for view in &views {
            view.stop().await;
        }

        tracing::info!(cluster_id = %self.id, views = views.len(), "Cluster service closed");
    }
}
