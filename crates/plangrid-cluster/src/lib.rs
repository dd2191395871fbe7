//! plangrid-cluster: distributed-mode coordination.
//!
//! In distributed mode a plan runs as a topology spread over manager and
//! worker nodes. This crate holds what the lifecycle core needs from the
//! cluster:
//!
//! ```text
//! Manager node
//!   ├── TopologyRunner::submit / kill
//!   └── StatusSynchronizer::remove         (on undeploy)
//!
//! Worker node
//!   ├── TopologyRunner::open_input / open_output
//!   └── StatusSynchronizer::publish_receiver_count
//!
//! SharedStatusMap  (cluster-visible, per-key pessimistic lock)
//!   └── "<plan>[<tenant>]" → ClusterStatusRecord
//! ```
//!
//! Every access to the shared map goes through [`StatusSynchronizer`], which
//! holds the per-key lock in a guard that always releases it.

pub mod error;
pub mod status_map;
pub mod synchronizer;
pub mod topology;

pub use error::{ClusterError, ClusterResult, TopologyError, TopologyResult};
pub use status_map::{InMemoryStatusMap, SharedStatusMap};
pub use synchronizer::{STATUS_MAP, StatusSynchronizer};
pub use topology::{TopologyOutput, TopologyRunner, topology_name};
