//! Activation and deactivation of execution plans.
//!
//! Activation wires a compiled plan into the stream registry and, in
//! distributed mode, into its topology:
//!
//! ```text
//! parse ─► duplicate check ─► resolve schemas ─► instantiate
//!       ─► [manager] submit topology ─► register instance
//!       ─► wire exports ─► build dispatchers ─► [worker] publish receiver count
//!       ─► start ─► subscribe dispatchers ─► [persistence] restore snapshot
//! ```
//!
//! Activation and deactivation of one plan are serialized per
//! `(tenant, plan name)`; different plans and different tenants never wait
//! on each other.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use plangrid_cluster::{
    SharedStatusMap, StatusSynchronizer, TopologyOutput, TopologyRunner, topology_name,
};
use plangrid_core::{
    EngineHandle, EventSink, Plan, PlanEngine, PlanMetadata, ProcessorConfig, StreamBinding,
    StreamRegistry, StreamSchema, TenantId,
};
use plangrid_store::ConfigFileStore;
use tracing::{debug, error, info, warn};

use crate::catalog::ConfigFileCatalog;
use crate::error::{LifecycleError, LifecycleResult};
use crate::instance::LivePlanInstance;
use crate::registry::PlanRegistry;
use crate::wiring::{DispatchKind, InputDispatcher, OutputListener};

const DEFAULT_CLUSTER_INTERVAL: Duration = Duration::from_secs(10);

/// Topology runner and status synchronizer of a distributed deployment.
pub(crate) struct ClusterContext {
    pub(crate) runner: Arc<dyn TopologyRunner>,
    pub(crate) status: StatusSynchronizer,
}

/// Orchestrates deploy, activate, deactivate, edit and reactivation of
/// execution plans for every tenant.
pub struct LifecycleCoordinator {
    pub(crate) config: ProcessorConfig,
    pub(crate) engine: Arc<dyn PlanEngine>,
    pub(crate) streams: Arc<dyn StreamRegistry>,
    pub(crate) store: Arc<dyn ConfigFileStore>,
    pub(crate) cluster: Option<ClusterContext>,
    pub(crate) registry: PlanRegistry,
    pub(crate) catalog: ConfigFileCatalog,
    plan_locks: DashMap<(TenantId, String), Arc<Mutex<()>>>,
}

impl LifecycleCoordinator {
    pub fn new(
        config: ProcessorConfig,
        engine: Arc<dyn PlanEngine>,
        streams: Arc<dyn StreamRegistry>,
        store: Arc<dyn ConfigFileStore>,
    ) -> Self {
        Self {
            config,
            engine,
            streams,
            store,
            cluster: None,
            registry: PlanRegistry::new(),
            catalog: ConfigFileCatalog::new(),
            plan_locks: DashMap::new(),
        }
    }

    /// Attach the distributed collaborators. Whether this node acts as
    /// manager or worker still follows the `[distributed]` config section.
    pub fn with_cluster(
        mut self,
        runner: Arc<dyn TopologyRunner>,
        status_map: Arc<dyn SharedStatusMap>,
    ) -> Self {
        let lock_timeout = self
            .config
            .distributed
            .as_ref()
            .map_or(DEFAULT_CLUSTER_INTERVAL, |d| d.lock_timeout());
        self.cluster = Some(ClusterContext {
            runner,
            status: StatusSynchronizer::new(status_map, lock_timeout),
        });
        self
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn registry(&self) -> &PlanRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &ConfigFileCatalog {
        &self.catalog
    }

    /// Cluster access when this node manages distributed topologies.
    pub(crate) fn manager(&self) -> Option<&ClusterContext> {
        self.cluster
            .as_ref()
            .filter(|c| self.config.is_manager_node() && c.runner.is_manager())
    }

    /// Cluster access when this node runs distributed dispatchers.
    pub(crate) fn worker(&self) -> Option<&ClusterContext> {
        self.cluster
            .as_ref()
            .filter(|c| self.config.is_worker_node() && c.runner.is_worker())
    }

    fn retry_interval(&self) -> Duration {
        self.config
            .distributed
            .as_ref()
            .map_or(DEFAULT_CLUSTER_INTERVAL, |d| d.retry_interval())
    }

    /// Run `op` holding the lock of `(tenant, name)`.
    pub(crate) fn with_plan_lock<T>(&self, tenant: TenantId, name: &str, op: impl FnOnce() -> T) -> T {
        let key = (tenant, name.to_string());
        let lock = self.plan_locks.entry(key.clone()).or_default().value().clone();
        let result = {
            let _guard = lock.lock();
            op()
        };
        drop(lock);
        self.plan_locks
            .remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    /// Parse `text` into a plan configuration.
    pub(crate) fn parse_plan(&self, text: &str, editable: bool) -> LifecycleResult<Plan> {
        let parsed = self
            .engine
            .parse(text)
            .map_err(|e| LifecycleError::Compile(e.to_string()))?;
        Ok(PlanMetadata::from_parsed(&parsed)?.into_plan(text, editable))
    }

    /// Filename backing the live plan `plan_name`, or its default filename.
    pub(crate) fn active_filename(&self, tenant: TenantId, plan_name: &str) -> String {
        self.catalog
            .deployed_by_plan_name(tenant, plan_name)
            .map(|d| d.filename)
            .unwrap_or_else(|| self.config.plan_filename(plan_name))
    }

    // ── Activation ──────────────────────────────────────────────────

    /// Compile `text`, start it, and wire it into the stream registry.
    pub fn activate(&self, tenant: TenantId, text: &str, editable: bool) -> LifecycleResult<()> {
        let plan = self.parse_plan(text, editable)?;
        let name = plan.name.clone();
        self.with_plan_lock(tenant, &name, || self.activate_locked(tenant, plan))
    }

    fn activate_locked(&self, tenant: TenantId, plan: Plan) -> LifecycleResult<()> {
        if self.registry.contains(tenant, &plan.name) {
            return Err(LifecycleError::DuplicateActivePlan(plan.name));
        }

        let import_schemas = self.resolve_schemas(tenant, &plan.name, &plan.imports);
        let export_schemas = self.resolve_schemas(tenant, &plan.name, &plan.exports);

        let handle = self
            .engine
            .instantiate(&plan.text)
            .map_err(|e| LifecycleError::InvalidPlan(e.to_string()))?;

        let prepared = self.local_inputs(&plan, handle.as_ref()).and_then(|inputs| {
            let output = self.distribute(tenant, &plan, &import_schemas, &export_schemas)?;
            Ok((inputs, output))
        });
        let (local_inputs, distributed_output) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                discard(tenant, &plan.name, handle.as_ref());
                return Err(e);
            }
        };

        let instance = Arc::new(LivePlanInstance::new(
            tenant,
            plan.clone(),
            handle,
            distributed_output,
        ));
        if let Err(e) = self.registry.put(tenant, Arc::clone(&instance)) {
            instance.shutdown();
            return Err(e);
        }

        for (binding, schema) in plan.exports.iter().zip(&export_schemas) {
            self.wire_export(tenant, &instance, binding, schema.as_ref());
        }

        let dispatchers = self.build_dispatchers(tenant, &instance, &plan, &import_schemas, &local_inputs);
        let remote = dispatchers
            .iter()
            .filter(|d| d.kind() == DispatchKind::Remote)
            .count();
        if remote > 0 {
            if let Some(worker) = self.worker() {
                worker
                    .status
                    .publish_receiver_count(&topology_name(&plan.name, tenant), remote as u32);
            }
        }

        if let Err(e) = instance.handle().start() {
            error!(tenant, plan = %plan.name, error = %e, "engine failed to start");
            self.teardown(tenant, &plan.name);
            return Err(LifecycleError::InvalidPlan(e.to_string()));
        }

        for dispatcher in dispatchers {
            match self.streams.subscribe_consumer(tenant, dispatcher.clone()) {
                Ok(()) => instance.add_consumer(dispatcher),
                Err(e) => error!(
                    tenant,
                    plan = %plan.name,
                    stream = %dispatcher.local_name(),
                    error = %e,
                    "failed to subscribe input stream, consumer not tracked"
                ),
            }
        }

        if self.config.persistence.is_some() {
            if let Err(e) = instance.handle().restore_snapshot() {
                warn!(tenant, plan = %plan.name, error = %e, "snapshot restore failed");
            }
        }

        info!(
            tenant,
            plan = %plan.name,
            producers = instance.producer_count(),
            consumers = instance.consumer_count(),
            "execution plan activated"
        );
        Ok(())
    }

    /// Resolve each binding's schema. A stream that cannot be resolved is
    /// reported and left as `None`.
    fn resolve_schemas(
        &self,
        tenant: TenantId,
        plan_name: &str,
        bindings: &[StreamBinding],
    ) -> Vec<Option<StreamSchema>> {
        bindings
            .iter()
            .map(|binding| match self.streams.resolve(tenant, &binding.stream_id) {
                Ok(schema) => Some(schema),
                Err(e) => {
                    warn!(
                        tenant,
                        plan = %plan_name,
                        stream = %binding.stream_id,
                        error = %e,
                        "stream definition unavailable"
                    );
                    None
                }
            })
            .collect()
    }

    /// Engine input handles per imported stream. Worker nodes feed the
    /// topology instead and need none.
    fn local_inputs(
        &self,
        plan: &Plan,
        handle: &dyn EngineHandle,
    ) -> LifecycleResult<HashMap<String, Arc<dyn EventSink>>> {
        if self.worker().is_some() {
            return Ok(HashMap::new());
        }
        plan.imports
            .iter()
            .map(|binding| {
                handle
                    .input_handle(&binding.local_name)
                    .map(|input| (binding.local_name.clone(), input))
                    .ok_or_else(|| {
                        LifecycleError::InvalidPlan(format!(
                            "no input handle for stream {}",
                            binding.local_name
                        ))
                    })
            })
            .collect()
    }

    /// Submit the topology on a manager and open the output stage on a
    /// worker.
    fn distribute(
        &self,
        tenant: TenantId,
        plan: &Plan,
        import_schemas: &[Option<StreamSchema>],
        export_schemas: &[Option<StreamSchema>],
    ) -> LifecycleResult<Option<Box<dyn TopologyOutput>>> {
        let manager = self.manager();
        if let Some(manager) = manager {
            let imports = definitions(&plan.imports, import_schemas);
            let exports = definitions(&plan.exports, export_schemas);
            manager
                .runner
                .submit(plan, &imports, &exports, tenant, self.retry_interval())?;
            info!(tenant, plan = %plan.name, "topology submitted");
        }

        let Some(worker) = self.worker() else {
            return Ok(None);
        };
        match worker.runner.open_output(plan, tenant) {
            Ok(output) => Ok(Some(output)),
            Err(e) => {
                if let Some(manager) = manager {
                    if let Err(kill) = manager.runner.kill(&plan.name, tenant) {
                        error!(tenant, plan = %plan.name, error = %kill, "failed to kill topology");
                    }
                }
                Err(e.into())
            }
        }
    }

    fn wire_export(
        &self,
        tenant: TenantId,
        instance: &LivePlanInstance,
        binding: &StreamBinding,
        schema: Option<&StreamSchema>,
    ) {
        let listener = Arc::new(OutputListener::new(
            instance.name(),
            binding,
            Arc::clone(instance.monitor()),
        ));

        let routed = match instance.distributed_output() {
            Some(output) => output
                .register(&binding.local_name, schema, listener.clone())
                .map_err(|e| e.to_string()),
            None => instance
                .handle()
                .add_output_callback(&binding.local_name, listener.clone())
                .map_err(|e| e.to_string()),
        };
        if let Err(reason) = routed {
            error!(
                tenant,
                plan = %instance.name(),
                stream = %binding.stream_id,
                %reason,
                "failed to attach output listener"
            );
            return;
        }

        match self.streams.subscribe_producer(tenant, listener.clone()) {
            Ok(()) => instance.add_producer(listener),
            Err(e) => error!(
                tenant,
                plan = %instance.name(),
                stream = %binding.stream_id,
                error = %e,
                "failed to subscribe output stream, producer not tracked"
            ),
        }
    }

    fn build_dispatchers(
        &self,
        tenant: TenantId,
        instance: &LivePlanInstance,
        plan: &Plan,
        import_schemas: &[Option<StreamSchema>],
        local_inputs: &HashMap<String, Arc<dyn EventSink>>,
    ) -> Vec<Arc<InputDispatcher>> {
        let mut dispatchers = Vec::with_capacity(plan.imports.len());
        for (binding, schema) in plan.imports.iter().zip(import_schemas) {
            let (kind, target) = match self.worker() {
                Some(worker) => {
                    match worker
                        .runner
                        .open_input(plan, tenant, &binding.local_name, schema.as_ref())
                    {
                        Ok(sink) => (DispatchKind::Remote, sink),
                        Err(e) => {
                            error!(
                                tenant,
                                plan = %plan.name,
                                stream = %binding.stream_id,
                                error = %e,
                                "failed to open topology input"
                            );
                            continue;
                        }
                    }
                }
                None => match local_inputs.get(&binding.local_name) {
                    Some(input) => (DispatchKind::Local, Arc::clone(input)),
                    None => continue,
                },
            };
            dispatchers.push(Arc::new(InputDispatcher::new(
                &plan.name,
                binding,
                kind,
                target,
                Arc::clone(instance.monitor()),
            )));
        }
        dispatchers
    }

    // ── Deactivation ────────────────────────────────────────────────

    /// Stop the live plan `name`. Returns false when it was not live.
    pub fn deactivate(&self, tenant: TenantId, name: &str) -> bool {
        self.with_plan_lock(tenant, name, || self.teardown(tenant, name))
    }

    /// Deactivation without taking the plan lock.
    pub(crate) fn teardown(&self, tenant: TenantId, name: &str) -> bool {
        let Some(instance) = self.registry.remove(tenant, name) else {
            debug!(tenant, plan = %name, "plan not active, nothing to deactivate");
            return false;
        };
        instance.shutdown();

        if let Some(manager) = self.manager() {
            manager.status.remove(&topology_name(name, tenant));
            if let Err(e) = manager.runner.kill(name, tenant) {
                error!(tenant, plan = %name, error = %e, "failed to kill topology");
            }
        }

        let (producers, consumers) = instance.take_subscriptions();
        for consumer in &consumers {
            self.streams.unsubscribe_consumer(tenant, consumer);
        }
        for producer in &producers {
            self.streams.unsubscribe_producer(tenant, producer);
        }

        info!(
            tenant,
            plan = %name,
            producers = producers.len(),
            consumers = consumers.len(),
            "execution plan deactivated"
        );
        true
    }
}

/// Stream definitions handed to the topology runner, one per resolved schema.
fn definitions(bindings: &[StreamBinding], schemas: &[Option<StreamSchema>]) -> Vec<String> {
    bindings
        .iter()
        .zip(schemas)
        .filter_map(|(binding, schema)| {
            schema
                .as_ref()
                .map(|s| s.definition(&binding.local_name))
        })
        .collect()
}

/// Shut down a handle that never became part of a live plan.
fn discard(tenant: TenantId, plan_name: &str, handle: &dyn EngineHandle) {
    if let Err(e) = handle.shutdown() {
        error!(tenant, plan = %plan_name, error = %e, "failed to discard engine handle");
    }
}
