//! Lease-Based Cluster Leadership
//!
//! This crate elects a leader and tracks membership for named cluster
//! namespaces on top of a shared key-value store with TTL expiry and atomic
//! conditional writes. No consensus protocol is involved: the store's atomic
//! operations are the only arbiter between processes.
//!
//! ```no_run
//! use lease_cluster::ClusterServiceBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), lease_cluster::ClusterError> {
//! let service = ClusterServiceBuilder::new()
//!     .id("node-1")
//!     .with_memory_store()
//!     .configure(|c| c.lease_duration = Duration::from_secs(10))
//!     .build()?;
//!
//! let view = service.get_view("scheduler").await?;
//! if view.local_member().is_leader() {
//!     // run singleton work
//! }
//!
//! service.close().await;
//! # Ok(())
//! # }
//! ```

mod builder;
mod config;
pub mod engine;
pub mod member;
pub mod memory;
pub mod metrics;
mod service;
pub mod store;
mod view;


pub use builder::ClusterServiceBuilder;
pub use config::{random_member_id, ClusterConfig};
pub use engine::{ClusterError, LeadershipConfig, LeadershipEvent};
pub use member::{LeadershipRole, Member, MemberId, LEADER_KEY};
pub use memory::InMemoryStore;
pub use metrics::LeadershipMetrics;
pub use service::ClusterService;
pub use store::{NamespaceStore, SharedStore, StoreError, StoreEvent, Subscription};
pub use view::ClusterView;
