//! Leadership Metrics and Observability
//!
//! Per-view counters for the election loop, exported in Prometheus text format,
//! plus tracing helpers for role transitions.

use crate::member::LeadershipRole;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Leadership metrics for one member in one namespace.
///
/// Cheap to clone; all clones share the same counters.
#[derive(Debug, Clone)]
pub struct LeadershipMetrics {
    inner: Arc<LeadershipMetricsInner>,
}

#[derive(Debug)]
struct LeadershipMetricsInner {
    namespace: String,
    member_id: String,

    // Gauges
    role: AtomicU64, // 0=stopped, 1=follower, 2=leader

    // Counters
    ticks_total: AtomicU64,
    renewals_total: AtomicU64,
    acquisitions_total: AtomicU64,
    losses_total: AtomicU64,
    store_errors_total: AtomicU64,
    notifications_total: AtomicU64,

    #[cfg(feature = "observability")]
    tick_duration: Option<prometheus::Histogram>,
}

impl LeadershipMetrics {
    pub fn new(namespace: impl Into<String>, member_id: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let member_id = member_id.into();

        Self {
            inner: Arc::new(LeadershipMetricsInner {
                #[cfg(feature = "observability")]
                tick_duration: prometheus::Histogram::with_opts(
                    prometheus::HistogramOpts::new(
                        "lease_cluster_tick_duration_seconds",
                        "Election tick duration in seconds",
                    )
                    .const_label("namespace", namespace.as_str())
                    .const_label("member_id", member_id.as_str()),
                )
                .ok(),
                namespace,
                member_id,
                role: AtomicU64::new(RoleMetric::Stopped as u64),
                ticks_total: AtomicU64::new(0),
                renewals_total: AtomicU64::new(0),
                acquisitions_total: AtomicU64::new(0),
                losses_total: AtomicU64::new(0),
                store_errors_total: AtomicU64::new(0),
                notifications_total: AtomicU64::new(0),
            }),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    pub fn member_id(&self) -> &str {
        &self.inner.member_id
    }

    pub fn set_role(&self, role: LeadershipRole) {
        self.inner
            .role
            .store(RoleMetric::from(role) as u64, Ordering::Relaxed);
    }

    pub fn inc_ticks(&self) {
        self.inner.ticks_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_renewals(&self) {
        self.inner.renewals_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_acquisitions(&self) {
        self.inner.acquisitions_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_losses(&self) {
        self.inner.losses_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_store_errors(&self) {
        self.inner.store_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_notifications(&self) {
        self.inner.notifications_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Observes how long one tick took.
    pub fn observe_tick(&self, duration: Duration) {
        #[cfg(feature = "observability")]
        if let Some(histogram) = &self.inner.tick_duration {
            histogram.observe(duration.as_secs_f64());
        }
        let _ = duration;
    }

    /// Registers the tick-duration histogram with `registry`.
    ///
    /// The histogram carries `namespace` and `member_id` const labels, so
    /// several views can share one registry. Registering the same view twice
    /// fails with `prometheus::Error::AlreadyReg`.
    #[cfg(feature = "observability")]
    pub fn register(&self, registry: &prometheus::Registry) -> prometheus::Result<()> {
        match &self.inner.tick_duration {
            Some(histogram) => registry.register(Box::new(histogram.clone())),
            None => Ok(()),
        }
    }

    pub fn role(&self) -> u64 {
        self.inner.role.load(Ordering::Relaxed)
    }
    pub fn ticks_total(&self) -> u64 {
        self.inner.ticks_total.load(Ordering::Relaxed)
    }
    pub fn renewals_total(&self) -> u64 {
        self.inner.renewals_total.load(Ordering::Relaxed)
    }
    pub fn acquisitions_total(&self) -> u64 {
        self.inner.acquisitions_total.load(Ordering::Relaxed)
    }
    pub fn losses_total(&self) -> u64 {
        self.inner.losses_total.load(Ordering::Relaxed)
    }
    pub fn store_errors_total(&self) -> u64 {
        self.inner.store_errors_total.load(Ordering::Relaxed)
    }
    pub fn notifications_total(&self) -> u64 {
        self.inner.notifications_total.load(Ordering::Relaxed)
    }

    /// Exports metrics in Prometheus text format.
    pub fn to_prometheus_text(&self) -> String {
        let labels = format!(
            "namespace=\"{}\",member_id=\"{}\"",
            self.namespace(),
            self.member_id()
        );

        let mut output = String::new();

        macro_rules! metric {
            ($kind:expr, $name:expr, $help:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{}{{{}}} {}\n",
                    $name, $help, $name, $kind, $name, labels, $value
                ));
            };
        }

        metric!(
            "gauge",
            "lease_cluster_role",
            "Current role (0=stopped, 1=follower, 2=leader)",
            self.role()
        );
        metric!(
            "counter",
            "lease_cluster_ticks_total",
            "Election ticks executed",
            self.ticks_total()
        );
        metric!(
            "counter",
            "lease_cluster_renewals_total",
            "Successful leader lease renewals",
            self.renewals_total()
        );
        metric!(
            "counter",
            "lease_cluster_acquisitions_total",
            "Times leadership was acquired",
            self.acquisitions_total()
        );
        metric!(
            "counter",
            "lease_cluster_losses_total",
            "Times leadership was lost or released",
            self.losses_total()
        );
        metric!(
            "counter",
            "lease_cluster_store_errors_total",
            "Store calls that failed or timed out",
            self.store_errors_total()
        );
        metric!(
            "counter",
            "lease_cluster_notifications_total",
            "Leader key removal notifications handled",
            self.notifications_total()
        );

        #[cfg(feature = "observability")]
        if let Some(histogram) = &self.inner.tick_duration {
            use prometheus::core::Collector;
            use prometheus::Encoder;

            let mut buffer = Vec::new();
            match prometheus::TextEncoder::new().encode(&histogram.collect(), &mut buffer) {
                Ok(()) => output.push_str(&String::from_utf8_lossy(&buffer)),
                Err(e) => tracing::warn!(error = %e, "Failed to encode tick duration histogram"),
            }
        }

        output
    }
}

/// Role representation for metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum RoleMetric {
    Stopped = 0,
    Follower = 1,
    Leader = 2,
}

impl From<LeadershipRole> for RoleMetric {
    fn from(role: LeadershipRole) -> Self {
        match role {
            LeadershipRole::Stopped => RoleMetric::Stopped,
            LeadershipRole::Follower => RoleMetric::Follower,
            LeadershipRole::Leader => RoleMetric::Leader,
        }
    }
}

// ============================================================================
// TRACING HELPERS
// ============================================================================

/// Records acquiring leadership.
pub fn trace_became_leader(namespace: &str, member_id: &str, reason: &str) {
    tracing::info!(
        namespace = namespace,
        member_id = member_id,
        reason = reason,
        event = "became_leader",
        "Became leader"
    );
}

/// Records losing or giving up leadership.
pub fn trace_leadership_lost(namespace: &str, member_id: &str, reason: &str) {
    tracing::info!(
        namespace = namespace,
        member_id = member_id,
        reason = reason,
        event = "leadership_lost",
        "Lost leadership"
    );
}

/// Records a membership entry refresh.
pub fn trace_membership_refreshed(namespace: &str, member_id: &str, leader: bool) {
    tracing::trace!(
        namespace = namespace,
        member_id = member_id,
        leader = leader,
        event = "membership_refreshed",
        "Refreshed membership entry"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = LeadershipMetrics::new("orders", "m1");
        assert_eq!(metrics.namespace(), "orders");
        assert_eq!(metrics.member_id(), "m1");
        assert_eq!(metrics.role(), 0);
        assert_eq!(metrics.ticks_total(), 0);
    }

    #[test]
    fn test_metrics_counters() {
        let metrics = LeadershipMetrics::new("orders", "m1");

        metrics.inc_ticks();
        metrics.inc_ticks();
        metrics.inc_acquisitions();
        metrics.set_role(LeadershipRole::Leader);

        assert_eq!(metrics.ticks_total(), 2);
        assert_eq!(metrics.acquisitions_total(), 1);
        assert_eq!(metrics.role(), 2);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = LeadershipMetrics::new("orders", "m1");
        let clone = metrics.clone();

        clone.inc_store_errors();
        assert_eq!(metrics.store_errors_total(), 1);
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = LeadershipMetrics::new("orders", "m1");
        metrics.set_role(LeadershipRole::Follower);
        metrics.inc_renewals();

        let output = metrics.to_prometheus_text();

        assert!(output.contains("lease_cluster_role{namespace=\"orders\",member_id=\"m1\"} 1"));
        assert!(output
            .contains("lease_cluster_renewals_total{namespace=\"orders\",member_id=\"m1\"} 1"));
        assert!(output.contains("# TYPE lease_cluster_ticks_total counter"));
    }

    #[cfg(feature = "observability")]
    #[test]
    fn test_tick_duration_exported() {
        let metrics = LeadershipMetrics::new("orders", "m1");
        metrics.observe_tick(Duration::from_millis(5));

        let output = metrics.to_prometheus_text();
        assert!(output.contains("# TYPE lease_cluster_tick_duration_seconds histogram"));
        assert!(output.contains("lease_cluster_tick_duration_seconds_count"));
        assert!(output.contains("namespace=\"orders\""));
    }

    #[cfg(feature = "observability")]
    #[test]
    fn test_tick_duration_registered() {
        let registry = prometheus::Registry::new();
        let orders = LeadershipMetrics::new("orders", "m1");
        let billing = LeadershipMetrics::new("billing", "m1");

        orders.register(&registry).unwrap();
        billing.register(&registry).unwrap();
        assert!(orders.register(&registry).is_err());

        orders.observe_tick(Duration::from_millis(5));

        let families = registry.gather();
        let family = families
            .iter()
            .find(|f| f.get_name() == "lease_cluster_tick_duration_seconds")
            .unwrap();
        assert_eq!(family.get_metric().len(), 2);

        let sample_count: u64 = family
            .get_metric()
            .iter()
            .map(|m| m.get_histogram().get_sample_count())
            .sum();
        assert_eq!(sample_count, 1);
    }

    #[test]
    fn test_role_metric_conversion() {
        assert_eq!(RoleMetric::from(LeadershipRole::Stopped), RoleMetric::Stopped);
        assert_eq!(RoleMetric::from(LeadershipRole::Follower), RoleMetric::Follower);
        assert_eq!(RoleMetric::from(LeadershipRole::Leader), RoleMetric::Leader);
    }
}
