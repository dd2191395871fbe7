//! Stream wiring between a live plan and the stream registry.
//!
//! ```text
//! registry stream ──► InputDispatcher ──► engine input handle      (local)
//!                                     └─► topology receiving stage (remote)
//!
//! engine output / topology output stage ──► OutputListener ──► registry stream
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use plangrid_core::{
    Direction, Event, EventConsumer, EventProducer, EventSink, StreamBinding, StreamId, TenantId,
};
use tracing::{debug, info};

/// Per-plan event tracing and statistics, shared by every wire of the plan.
#[derive(Debug)]
pub struct PlanMonitor {
    plan_name: String,
    tenant: TenantId,
    tracing: AtomicBool,
    statistics: AtomicBool,
    received: AtomicU64,
    emitted: AtomicU64,
}

impl PlanMonitor {
    pub fn new(plan_name: &str, tenant: TenantId, tracing: bool, statistics: bool) -> Self {
        Self {
            plan_name: plan_name.to_string(),
            tenant,
            tracing: AtomicBool::new(tracing),
            statistics: AtomicBool::new(statistics),
            received: AtomicU64::new(0),
            emitted: AtomicU64::new(0),
        }
    }

    pub fn set_tracing(&self, enabled: bool) {
        self.tracing.store(enabled, Ordering::Relaxed);
    }

    pub fn set_statistics(&self, enabled: bool) {
        self.statistics.store(enabled, Ordering::Relaxed);
    }

    pub fn tracing_enabled(&self) -> bool {
        self.tracing.load(Ordering::Relaxed)
    }

    pub fn statistics_enabled(&self) -> bool {
        self.statistics.load(Ordering::Relaxed)
    }

    /// Events received on imported streams while statistics were enabled.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Events emitted on exported streams while statistics were enabled.
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    fn observe(&self, direction: Direction, stream: &StreamId, events: &[Event]) {
        if self.statistics_enabled() {
            let counter = match direction {
                Direction::Import => &self.received,
                Direction::Export => &self.emitted,
            };
            counter.fetch_add(events.len() as u64, Ordering::Relaxed);
        }
        if self.tracing_enabled() {
            info!(
                target: "plangrid::event_trace",
                tenant = self.tenant,
                plan = %self.plan_name,
                %stream,
                ?direction,
                events = ?events,
                "event trace"
            );
        }
    }
}

/// Export side: receives the plan's output and publishes it to the stream.
pub struct OutputListener {
    stream_id: StreamId,
    local_name: String,
    plan_name: String,
    monitor: Arc<PlanMonitor>,
    downstream: RwLock<Option<Arc<dyn EventSink>>>,
}

impl OutputListener {
    pub fn new(plan_name: &str, binding: &StreamBinding, monitor: Arc<PlanMonitor>) -> Self {
        Self {
            stream_id: binding.stream_id.clone(),
            local_name: binding.local_name.clone(),
            plan_name: plan_name.to_string(),
            monitor,
            downstream: RwLock::new(None),
        }
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// Whether the registry has attached a downstream sink yet.
    pub fn is_attached(&self) -> bool {
        self.downstream.read().is_some()
    }
}

impl EventSink for OutputListener {
    fn publish(&self, events: &[Event]) {
        self.monitor.observe(Direction::Export, &self.stream_id, events);
        match self.downstream.read().as_ref() {
            Some(sink) => sink.publish(events),
            None => debug!(
                plan = %self.plan_name,
                stream = %self.stream_id,
                dropped = events.len(),
                "output not attached to a stream yet"
            ),
        }
    }
}

impl EventProducer for OutputListener {
    fn stream_id(&self) -> &StreamId {
        &self.stream_id
    }

    fn plan_name(&self) -> &str {
        &self.plan_name
    }

    fn attach(&self, sink: Arc<dyn EventSink>) {
        *self.downstream.write() = Some(sink);
    }
}

/// Where an [`InputDispatcher`] delivers its events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchKind {
    /// Straight into the engine's input handle on this node.
    Local,
    /// Into the receiving stage of the plan's distributed topology.
    Remote,
}

/// Import side: consumes a registry stream and feeds the plan.
pub struct InputDispatcher {
    stream_id: StreamId,
    local_name: String,
    plan_name: String,
    kind: DispatchKind,
    target: Arc<dyn EventSink>,
    monitor: Arc<PlanMonitor>,
}

impl InputDispatcher {
    pub fn new(
        plan_name: &str,
        binding: &StreamBinding,
        kind: DispatchKind,
        target: Arc<dyn EventSink>,
        monitor: Arc<PlanMonitor>,
    ) -> Self {
        Self {
            stream_id: binding.stream_id.clone(),
            local_name: binding.local_name.clone(),
            plan_name: plan_name.to_string(),
            kind,
            target,
            monitor,
        }
    }

    pub fn kind(&self) -> DispatchKind {
        self.kind
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }
}

impl EventConsumer for InputDispatcher {
    fn stream_id(&self) -> &StreamId {
        &self.stream_id
    }

    fn plan_name(&self) -> &str {
        &self.plan_name
    }

    fn consume(&self, events: &[Event]) {
        self.monitor.observe(Direction::Import, &self.stream_id, events);
        self.target.publish(events);
    }
}
