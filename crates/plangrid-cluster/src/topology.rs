//! Distributed topology runner contract.

use std::sync::Arc;
use std::time::Duration;

use plangrid_core::{EventSink, Plan, StreamSchema, TenantId};

use crate::error::TopologyResult;

/// Cluster-wide name of the topology running `plan_name` for `tenant`.
///
/// The same string keys the plan's record in the shared status map.
pub fn topology_name(plan_name: &str, tenant: TenantId) -> String {
    format!("{plan_name}[{tenant}]")
}

/// Runs plans as distributed topologies.
///
/// A manager node submits and kills topologies; a worker node wires the
/// local plan into the running topology through [`open_input`] and
/// [`open_output`].
///
/// [`open_input`]: TopologyRunner::open_input
/// [`open_output`]: TopologyRunner::open_output
pub trait TopologyRunner: Send + Sync {
    fn is_manager(&self) -> bool;

    fn is_worker(&self) -> bool;

    /// Submit `plan` with the stream definitions of its imports and exports.
    /// A runner whose backing service is not up yet fails with
    /// [`TopologyError::ServiceUnavailable`](crate::TopologyError::ServiceUnavailable).
    fn submit(
        &self,
        plan: &Plan,
        import_definitions: &[String],
        export_definitions: &[String],
        tenant: TenantId,
        retry_interval: Duration,
    ) -> TopologyResult<()>;

    fn kill(&self, plan_name: &str, tenant: TenantId) -> TopologyResult<()>;

    /// Sink that forwards events for the imported stream `local_name` into
    /// the topology's receiving stage.
    fn open_input(
        &self,
        plan: &Plan,
        tenant: TenantId,
        local_name: &str,
        schema: Option<&StreamSchema>,
    ) -> TopologyResult<Arc<dyn EventSink>>;

    /// Output stage through which the topology delivers exported events.
    fn open_output(&self, plan: &Plan, tenant: TenantId) -> TopologyResult<Box<dyn TopologyOutput>>;
}

/// The publishing end of a topology on a worker node.
pub trait TopologyOutput: Send + Sync {
    /// Route events the topology emits for `local_name` into `sink`.
    fn register(
        &self,
        local_name: &str,
        schema: Option<&StreamSchema>,
        sink: Arc<dyn EventSink>,
    ) -> TopologyResult<()>;

    fn shutdown(&self);
}
