//! Shared fakes for lifecycle scenario tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use plangrid_cluster::{
    ClusterResult, InMemoryStatusMap, SharedStatusMap, TopologyError, TopologyOutput,
    TopologyResult, TopologyRunner,
};
use plangrid_core::{
    Attribute, ClusterStatusRecord, EngineError, EngineHandle, EngineResult, Event, EventConsumer,
    EventProducer, EventSink, ParsedPlan, Plan, PlanEngine, ProcessorConfig, StreamError, StreamId,
    StreamRegistry, StreamResult, StreamSchema, TenantId, annotation,
};
use plangrid_lifecycle::LifecycleCoordinator;
use plangrid_store::{ConfigFileStore, FsConfigStore, StoreError, StoreResult};

pub const ORDER_ALERTS: &str = r#"@Plan:name('OrderAlerts')
@Plan:description('Raises alerts for large orders')

@Import('Orders:1.0.0')
define stream OrdersIn (id string, price double);

@Export('Alerts:1.0.0')
define stream AlertsOut (id string);

from OrdersIn[price > 100] select id insert into AlertsOut;
"#;

/// A plan named `name` reading `Orders:1.0.0` and writing `Alerts:1.0.0`.
pub fn plan_text(name: &str) -> String {
    ORDER_ALERTS.replace("OrderAlerts", name)
}

pub fn event(n: i64) -> Event {
    Event {
        timestamp: n,
        data: vec![serde_json::json!(n)],
    }
}

pub fn stream(id: &str) -> StreamId {
    StreamId::parse(id).unwrap()
}

// ── Event sinks ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct CollectSink {
    events: Mutex<Vec<Event>>,
}

impl CollectSink {
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }
}

impl EventSink for CollectSink {
    fn publish(&self, events: &[Event]) {
        self.events.lock().extend_from_slice(events);
    }
}

// ── Engine ──────────────────────────────────────────────────────────

/// What the engine did with one instantiated plan.
#[derive(Default)]
pub struct HandleState {
    pub started: AtomicBool,
    pub shutdowns: AtomicUsize,
    pub restores: AtomicUsize,
    pub inputs: HashMap<String, Arc<CollectSink>>,
    pub callbacks: Mutex<HashMap<String, Arc<dyn EventSink>>>,
    fail_start: bool,
}

impl HandleState {
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    /// Emit `events` on the declared output stream `local_name`.
    pub fn emit(&self, local_name: &str, events: &[Event]) {
        let callback = self.callbacks.lock().get(local_name).cloned();
        if let Some(callback) = callback {
            callback.publish(events);
        }
    }
}

struct RecordingHandle(Arc<HandleState>);

impl EngineHandle for RecordingHandle {
    fn input_handle(&self, stream: &str) -> Option<Arc<dyn EventSink>> {
        self.0
            .inputs
            .get(stream)
            .map(|sink| Arc::clone(sink) as Arc<dyn EventSink>)
    }

    fn add_output_callback(&self, stream: &str, callback: Arc<dyn EventSink>) -> EngineResult<()> {
        self.0.callbacks.lock().insert(stream.to_string(), callback);
        Ok(())
    }

    fn start(&self) -> EngineResult<()> {
        if self.0.fail_start {
            return Err(EngineError::Runtime("refusing to start".to_string()));
        }
        self.0.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn shutdown(&self) -> EngineResult<()> {
        self.0.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn restore_snapshot(&self) -> EngineResult<()> {
        self.0.restores.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Engine that understands only the annotation grammar and records every
/// handle it hands out.
#[derive(Default)]
pub struct RecordingEngine {
    handles: Mutex<Vec<(String, Arc<HandleState>)>>,
    fail_instantiate: Mutex<HashSet<String>>,
    fail_start: Mutex<HashSet<String>>,
}

impl RecordingEngine {
    pub fn fail_instantiate(&self, plan_name: &str) {
        self.fail_instantiate.lock().insert(plan_name.to_string());
    }

    pub fn fail_start(&self, plan_name: &str) {
        self.fail_start.lock().insert(plan_name.to_string());
    }

    /// Most recent handle instantiated for `plan_name`.
    pub fn handle(&self, plan_name: &str) -> Option<Arc<HandleState>> {
        self.handles
            .lock()
            .iter()
            .rev()
            .find(|(name, _)| name == plan_name)
            .map(|(_, state)| Arc::clone(state))
    }

    pub fn instantiated(&self, plan_name: &str) -> usize {
        self.handles
            .lock()
            .iter()
            .filter(|(name, _)| name == plan_name)
            .count()
    }
}

fn plan_name_of(parsed: &ParsedPlan) -> String {
    annotation::find(&parsed.annotations, annotation::PLAN, Some(annotation::NAME))
        .unwrap_or_default()
        .to_string()
}

impl PlanEngine for RecordingEngine {
    fn parse(&self, text: &str) -> EngineResult<ParsedPlan> {
        annotation::scan(text).map_err(|e| EngineError::Parse(e.to_string()))
    }

    fn instantiate(&self, text: &str) -> EngineResult<Box<dyn EngineHandle>> {
        let parsed = self.parse(text)?;
        let name = plan_name_of(&parsed);
        if self.fail_instantiate.lock().contains(&name) {
            return Err(EngineError::Instantiate(format!("cannot build {name}")));
        }
        let state = Arc::new(HandleState {
            inputs: parsed
                .streams
                .iter()
                .map(|s| (s.name.clone(), Arc::new(CollectSink::default())))
                .collect(),
            fail_start: self.fail_start.lock().contains(&name),
            ..HandleState::default()
        });
        self.handles.lock().push((name, Arc::clone(&state)));
        Ok(Box::new(RecordingHandle(state)))
    }
}

// ── Stream registry ─────────────────────────────────────────────────

fn same<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Stream registry that records every subscription per tenant.
#[derive(Default)]
pub struct RecordingStreams {
    defined: Mutex<HashSet<(TenantId, StreamId)>>,
    refuse_subscribe: Mutex<HashSet<StreamId>>,
    producers: Mutex<Vec<(TenantId, Arc<dyn EventProducer>)>>,
    consumers: Mutex<Vec<(TenantId, Arc<dyn EventConsumer>)>>,
    junctions: Mutex<HashMap<(TenantId, StreamId), Arc<CollectSink>>>,
    unsubscribed: AtomicUsize,
}

impl RecordingStreams {
    pub fn define(&self, tenant: TenantId, id: &str) {
        self.defined.lock().insert((tenant, stream(id)));
    }

    pub fn undefine(&self, tenant: TenantId, id: &str) {
        self.defined.lock().remove(&(tenant, stream(id)));
    }

    pub fn refuse_subscribe(&self, id: &str) {
        self.refuse_subscribe.lock().insert(stream(id));
    }

    /// `(plan, stream)` of every subscribed producer of `tenant`.
    pub fn producers(&self, tenant: TenantId) -> Vec<(String, StreamId)> {
        self.producers
            .lock()
            .iter()
            .filter(|(t, _)| *t == tenant)
            .map(|(_, p)| (p.plan_name().to_string(), p.stream_id().clone()))
            .collect()
    }

    /// `(plan, stream)` of every subscribed consumer of `tenant`.
    pub fn consumers(&self, tenant: TenantId) -> Vec<(String, StreamId)> {
        self.consumers
            .lock()
            .iter()
            .filter(|(t, _)| *t == tenant)
            .map(|(_, c)| (c.plan_name().to_string(), c.stream_id().clone()))
            .collect()
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.unsubscribed.load(Ordering::SeqCst)
    }

    /// Deliver `events` to every consumer of `id` in `tenant`.
    pub fn publish(&self, tenant: TenantId, id: &str, events: &[Event]) {
        let id = stream(id);
        let targets: Vec<Arc<dyn EventConsumer>> = self
            .consumers
            .lock()
            .iter()
            .filter(|(t, c)| *t == tenant && c.stream_id() == &id)
            .map(|(_, c)| Arc::clone(c))
            .collect();
        for consumer in targets {
            consumer.consume(events);
        }
    }

    /// Events producers have published into `id`.
    pub fn received(&self, tenant: TenantId, id: &str) -> usize {
        self.junctions
            .lock()
            .get(&(tenant, stream(id)))
            .map_or(0, |sink| sink.len())
    }
}

impl StreamRegistry for RecordingStreams {
    fn resolve(&self, tenant: TenantId, stream_id: &StreamId) -> StreamResult<StreamSchema> {
        if !self.defined.lock().contains(&(tenant, stream_id.clone())) {
            return Err(StreamError::NotFound(stream_id.clone()));
        }
        Ok(StreamSchema {
            stream_id: stream_id.clone(),
            attributes: vec![Attribute {
                name: "id".to_string(),
                kind: "string".to_string(),
            }],
        })
    }

    fn subscribe_producer(&self, tenant: TenantId, producer: Arc<dyn EventProducer>) -> StreamResult<()> {
        if self.refuse_subscribe.lock().contains(producer.stream_id()) {
            return Err(StreamError::Subscribe {
                stream: producer.stream_id().clone(),
                reason: "refused".to_string(),
            });
        }
        let junction = Arc::clone(
            self.junctions
                .lock()
                .entry((tenant, producer.stream_id().clone()))
                .or_default(),
        );
        producer.attach(junction);
        self.producers.lock().push((tenant, producer));
        Ok(())
    }

    fn subscribe_consumer(&self, tenant: TenantId, consumer: Arc<dyn EventConsumer>) -> StreamResult<()> {
        if self.refuse_subscribe.lock().contains(consumer.stream_id()) {
            return Err(StreamError::Subscribe {
                stream: consumer.stream_id().clone(),
                reason: "refused".to_string(),
            });
        }
        self.consumers.lock().push((tenant, consumer));
        Ok(())
    }

    fn unsubscribe_producer(&self, tenant: TenantId, producer: &Arc<dyn EventProducer>) {
        self.unsubscribed.fetch_add(1, Ordering::SeqCst);
        self.producers
            .lock()
            .retain(|(t, p)| !(*t == tenant && same(p, producer)));
    }

    fn unsubscribe_consumer(&self, tenant: TenantId, consumer: &Arc<dyn EventConsumer>) {
        self.unsubscribed.fetch_add(1, Ordering::SeqCst);
        self.consumers
            .lock()
            .retain(|(t, c)| !(*t == tenant && same(c, consumer)));
    }
}

// ── Topology runner ─────────────────────────────────────────────────

pub const TOPOLOGY_SERVICE: &str = "topology-manager";

#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub plan: String,
    pub tenant: TenantId,
    pub imports: Vec<String>,
    pub exports: Vec<String>,
}

#[derive(Default)]
pub struct RecordingOutput {
    pub registered: Mutex<Vec<String>>,
    pub shutdowns: AtomicUsize,
}

struct SharedOutput(Arc<RecordingOutput>);

impl TopologyOutput for SharedOutput {
    fn register(&self, local_name: &str, _schema: Option<&StreamSchema>, _sink: Arc<dyn EventSink>) -> TopologyResult<()> {
        self.0.registered.lock().push(local_name.to_string());
        Ok(())
    }

    fn shutdown(&self) {
        self.0.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// Topology runner whose submit outcome is scripted by the test.
pub struct ScriptedRunner {
    manager: bool,
    worker: bool,
    service_up: AtomicBool,
    reject_submit: AtomicBool,
    fail_kill: AtomicBool,
    fail_inputs: AtomicBool,
    fail_outputs: AtomicBool,
    pub submitted: Mutex<Vec<Submission>>,
    pub killed: Mutex<Vec<(String, TenantId)>>,
    pub inputs_opened: AtomicUsize,
    pub outputs: Mutex<Vec<Arc<RecordingOutput>>>,
}

impl ScriptedRunner {
    pub fn new(manager: bool, worker: bool) -> Self {
        Self {
            manager,
            worker,
            service_up: AtomicBool::new(true),
            reject_submit: AtomicBool::new(false),
            fail_kill: AtomicBool::new(false),
            fail_inputs: AtomicBool::new(false),
            fail_outputs: AtomicBool::new(false),
            submitted: Mutex::new(Vec::new()),
            killed: Mutex::new(Vec::new()),
            inputs_opened: AtomicUsize::new(0),
            outputs: Mutex::new(Vec::new()),
        }
    }

    pub fn set_service_up(&self, up: bool) {
        self.service_up.store(up, Ordering::SeqCst);
    }

    pub fn reject_submit(&self, reject: bool) {
        self.reject_submit.store(reject, Ordering::SeqCst);
    }

    pub fn fail_kill(&self, fail: bool) {
        self.fail_kill.store(fail, Ordering::SeqCst);
    }

    pub fn fail_inputs(&self, fail: bool) {
        self.fail_inputs.store(fail, Ordering::SeqCst);
    }

    pub fn fail_outputs(&self, fail: bool) {
        self.fail_outputs.store(fail, Ordering::SeqCst);
    }

    fn wiring(flag: &AtomicBool, stream: &str) -> TopologyResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(TopologyError::Wiring {
                stream: stream.to_string(),
                reason: "no route to worker".to_string(),
            });
        }
        Ok(())
    }
}

impl TopologyRunner for ScriptedRunner {
    fn is_manager(&self) -> bool {
        self.manager
    }

    fn is_worker(&self) -> bool {
        self.worker
    }

    fn submit(
        &self,
        plan: &Plan,
        import_definitions: &[String],
        export_definitions: &[String],
        tenant: TenantId,
        _retry_interval: Duration,
    ) -> TopologyResult<()> {
        if !self.service_up.load(Ordering::SeqCst) {
            return Err(TopologyError::ServiceUnavailable(TOPOLOGY_SERVICE.to_string()));
        }
        if self.reject_submit.load(Ordering::SeqCst) {
            return Err(TopologyError::Submit {
                topology: plan.name.clone(),
                reason: "cluster rejected topology".to_string(),
            });
        }
        self.submitted.lock().push(Submission {
            plan: plan.name.clone(),
            tenant,
            imports: import_definitions.to_vec(),
            exports: export_definitions.to_vec(),
        });
        Ok(())
    }

    fn kill(&self, plan_name: &str, tenant: TenantId) -> TopologyResult<()> {
        self.killed.lock().push((plan_name.to_string(), tenant));
        if self.fail_kill.load(Ordering::SeqCst) {
            return Err(TopologyError::Kill {
                topology: plan_name.to_string(),
                reason: "topology not found".to_string(),
            });
        }
        Ok(())
    }

    fn open_input(
        &self,
        _plan: &Plan,
        _tenant: TenantId,
        local_name: &str,
        _schema: Option<&StreamSchema>,
    ) -> TopologyResult<Arc<dyn EventSink>> {
        Self::wiring(&self.fail_inputs, local_name)?;
        self.inputs_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(CollectSink::default()))
    }

    fn open_output(&self, plan: &Plan, _tenant: TenantId) -> TopologyResult<Box<dyn TopologyOutput>> {
        Self::wiring(&self.fail_outputs, &plan.name)?;
        let output = Arc::new(RecordingOutput::default());
        self.outputs.lock().push(Arc::clone(&output));
        Ok(Box::new(SharedOutput(output)))
    }
}

// ── Status map ──────────────────────────────────────────────────────

/// Status map whose locks are always held by someone else.
#[derive(Default)]
pub struct TimingOutMap {
    inner: InMemoryStatusMap,
    pub lock_attempts: AtomicUsize,
}

impl SharedStatusMap for TimingOutMap {
    fn try_lock(&self, _key: &str, timeout: Duration) -> ClusterResult<bool> {
        self.lock_attempts.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(timeout);
        Ok(false)
    }

    fn unlock(&self, key: &str) -> ClusterResult<()> {
        self.inner.unlock(key)
    }

    fn get(&self, key: &str) -> ClusterResult<Option<ClusterStatusRecord>> {
        self.inner.get(key)
    }

    fn put_if_absent(&self, key: &str, value: ClusterStatusRecord) -> ClusterResult<Option<ClusterStatusRecord>> {
        self.inner.put_if_absent(key, value)
    }

    fn replace(&self, key: &str, value: ClusterStatusRecord) -> ClusterResult<Option<ClusterStatusRecord>> {
        self.inner.replace(key, value)
    }

    fn remove(&self, key: &str, expected: &ClusterStatusRecord) -> ClusterResult<bool> {
        self.inner.remove(key, expected)
    }
}

// ── Store ───────────────────────────────────────────────────────────

/// Filesystem store whose saves can be made to fail.
pub struct FlakyStore {
    inner: FsConfigStore,
    fail_saves: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: FsConfigStore) -> Self {
        Self {
            inner,
            fail_saves: AtomicBool::new(false),
        }
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

impl ConfigFileStore for FlakyStore {
    fn save(&self, tenant: TenantId, text: &str, plan_name: &str, filename: &str) -> StoreResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Write {
                filename: filename.to_string(),
                source: std::io::Error::other("disk full"),
            });
        }
        self.inner.save(tenant, text, plan_name, filename)
    }

    fn delete(&self, tenant: TenantId, filename: &str) -> StoreResult<bool> {
        self.inner.delete(tenant, filename)
    }

    fn read_text(&self, tenant: TenantId, filename: &str) -> StoreResult<String> {
        self.inner.read_text(tenant, filename)
    }

    fn list(&self, tenant: TenantId) -> StoreResult<Vec<String>> {
        self.inner.list(tenant)
    }
}

// ── Harness ─────────────────────────────────────────────────────────

pub struct Harness {
    pub dir: tempfile::TempDir,
    pub engine: Arc<RecordingEngine>,
    pub streams: Arc<RecordingStreams>,
    pub store: Arc<FlakyStore>,
    pub coordinator: LifecycleCoordinator,
}

impl Harness {
    /// Single-node coordinator over a fresh repository.
    pub fn new() -> Self {
        Self::with_config(ProcessorConfig::default())
    }

    pub fn with_config(mut config: ProcessorConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        config.repository.root = dir.path().to_path_buf();
        let engine = Arc::new(RecordingEngine::default());
        let streams = Arc::new(RecordingStreams::default());
        let store = Arc::new(FlakyStore::new(FsConfigStore::new(
            dir.path(),
            &config.repository.extension,
        )));
        let coordinator = LifecycleCoordinator::new(
            config,
            engine.clone(),
            streams.clone(),
            store.clone(),
        );
        Self {
            dir,
            engine,
            streams,
            store,
            coordinator,
        }
    }

    /// Distributed coordinator with the given roles.
    pub fn distributed(
        manager: bool,
        worker: bool,
        runner: Arc<ScriptedRunner>,
        map: Arc<dyn SharedStatusMap>,
    ) -> Self {
        let config = ProcessorConfig::from_toml_str(&format!(
            "[distributed]\nmanager_node = {manager}\nworker_node = {worker}\nstatus_lock_timeout = \"20ms\"\n"
        ))
        .unwrap();
        let mut harness = Self::with_config(config);
        harness.coordinator = harness.coordinator.with_cluster(runner, map);
        harness
    }

    /// Define the streams `ORDER_ALERTS` binds to, for `tenant`.
    pub fn define_order_streams(&self, tenant: TenantId) {
        self.streams.define(tenant, "Orders:1.0.0");
        self.streams.define(tenant, "Alerts:1.0.0");
    }
}
