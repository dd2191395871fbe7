//! A running execution plan and everything it holds.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use plangrid_cluster::TopologyOutput;
use plangrid_core::{EngineHandle, EventConsumer, EventProducer, Plan, StreamId, TenantId};
use tracing::{debug, error, info};

use crate::wiring::PlanMonitor;

/// One live plan of one tenant.
///
/// Owns the engine handle, the optional distributed output stage and the
/// producers/consumers subscribed on the plan's behalf. The engine handle is
/// shut down exactly once, however many times [`shutdown`](Self::shutdown)
/// is called.
pub struct LivePlanInstance {
    name: String,
    tenant: TenantId,
    plan: RwLock<Plan>,
    handle: Box<dyn EngineHandle>,
    distributed_output: Option<Box<dyn TopologyOutput>>,
    monitor: Arc<PlanMonitor>,
    producers: Mutex<Vec<Arc<dyn EventProducer>>>,
    consumers: Mutex<Vec<Arc<dyn EventConsumer>>>,
    shut_down: AtomicBool,
}

impl LivePlanInstance {
    pub fn new(
        tenant: TenantId,
        plan: Plan,
        handle: Box<dyn EngineHandle>,
        distributed_output: Option<Box<dyn TopologyOutput>>,
    ) -> Self {
        let monitor = Arc::new(PlanMonitor::new(
            &plan.name,
            tenant,
            plan.tracing_enabled,
            plan.statistics_enabled,
        ));
        Self {
            name: plan.name.clone(),
            tenant,
            plan: RwLock::new(plan),
            handle,
            distributed_output,
            monitor,
            producers: Mutex::new(Vec::new()),
            consumers: Mutex::new(Vec::new()),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tenant(&self) -> TenantId {
        self.tenant
    }

    /// Snapshot of the plan configuration.
    pub fn plan(&self) -> Plan {
        self.plan.read().clone()
    }

    pub fn handle(&self) -> &dyn EngineHandle {
        self.handle.as_ref()
    }

    pub fn distributed_output(&self) -> Option<&dyn TopologyOutput> {
        self.distributed_output.as_deref()
    }

    pub fn monitor(&self) -> &Arc<PlanMonitor> {
        &self.monitor
    }

    pub fn add_producer(&self, producer: Arc<dyn EventProducer>) {
        self.producers.lock().push(producer);
    }

    pub fn add_consumer(&self, consumer: Arc<dyn EventConsumer>) {
        self.consumers.lock().push(consumer);
    }

    pub fn producer_count(&self) -> usize {
        self.producers.lock().len()
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.lock().len()
    }

    /// True if a tracked producer publishes to `stream_id`.
    pub fn produces(&self, stream_id: &StreamId) -> bool {
        self.producers.lock().iter().any(|p| p.stream_id() == stream_id)
    }

    /// True if a tracked consumer reads from `stream_id`.
    pub fn consumes(&self, stream_id: &StreamId) -> bool {
        self.consumers.lock().iter().any(|c| c.stream_id() == stream_id)
    }

    /// Hand over every tracked producer and consumer, leaving none behind.
    pub fn take_subscriptions(&self) -> (Vec<Arc<dyn EventProducer>>, Vec<Arc<dyn EventConsumer>>) {
        let producers = std::mem::take(&mut *self.producers.lock());
        let consumers = std::mem::take(&mut *self.consumers.lock());
        (producers, consumers)
    }

    /// Apply a tracing toggle together with the rewritten plan text.
    pub fn set_tracing(&self, enabled: bool, text: String) {
        let mut plan = self.plan.write();
        plan.tracing_enabled = enabled;
        plan.text = text;
        self.monitor.set_tracing(enabled);
    }

    /// Apply a statistics toggle together with the rewritten plan text.
    pub fn set_statistics(&self, enabled: bool, text: String) {
        let mut plan = self.plan.write();
        plan.statistics_enabled = enabled;
        plan.text = text;
        self.monitor.set_statistics(enabled);
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Stop the distributed output stage and the engine. Failures are
    /// logged; nothing is propagated.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            debug!(tenant = self.tenant, plan = %self.name, "plan already shut down");
            return;
        }
        if let Some(output) = &self.distributed_output {
            output.shutdown();
        }
        match self.handle.shutdown() {
            Ok(()) => info!(tenant = self.tenant, plan = %self.name, "plan shut down"),
            Err(e) => error!(
                tenant = self.tenant,
                plan = %self.name,
                error = %e,
                "error in shutting down execution plan"
            ),
        }
    }
}
