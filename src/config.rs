use crate::engine::{
    ClusterError, LeadershipConfig, DEFAULT_LEASE_DURATION, DEFAULT_OPERATION_TIMEOUT,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Serializable cluster service configuration.
///
/// ```
/// use lease_cluster::ClusterConfig;
///
/// let config: ClusterConfig =
///     serde_json::from_str(r#"{ "id": "node-1", "namespace": "scheduler" }"#).unwrap();
/// assert_eq!(config.member_id(), "node-1");
/// assert_eq!(config.namespace.as_deref(), Some("scheduler"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Identifies this process's writes. Random when unset.
    pub id: Option<String>,
    /// Namespace opened by `ClusterService::default_view`. Other namespaces
    /// can still be opened per call to `get_view`.
    pub namespace: Option<String>,
    /// TTL applied to leader and membership entries, in milliseconds.
    pub lease_duration_ms: u64,
    /// Bound on each store call, in milliseconds.
    pub operation_timeout_ms: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            id: None,
            namespace: None,
            lease_duration_ms: DEFAULT_LEASE_DURATION.as_millis() as u64,
            operation_timeout_ms: DEFAULT_OPERATION_TIMEOUT.as_millis() as u64,
        }
    }
}

impl ClusterConfig {
    /// Configured id, or a fresh random one.
    pub fn member_id(&self) -> String {
        self.id.clone().unwrap_or_else(random_member_id)
    }

    pub fn leadership(&self) -> Result<LeadershipConfig, ClusterError> {
        let config = LeadershipConfig {
            lease_duration: Duration::from_millis(self.lease_duration_ms),
            operation_timeout: Duration::from_millis(self.operation_timeout_ms),
        };
        config.validate()?;
        Ok(config)
    }
}

/// 128 random bits, hex encoded.
pub fn random_member_id() -> String {
    format!("{:032x}", rand::rng().random::<u128>())
}
