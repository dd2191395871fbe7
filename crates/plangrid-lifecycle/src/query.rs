//! Read-side queries, tracing/statistics toggles and process shutdown.

use std::collections::BTreeMap;
use std::sync::Arc;

use plangrid_cluster::topology_name;
use plangrid_core::{
    ConfigFileDescriptor, DeclaredStream, Plan, StreamId, TenantId, annotation,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::coordinator::LifecycleCoordinator;
use crate::error::{LifecycleError, LifecycleResult};
use crate::instance::LivePlanInstance;

/// Event counters of a live plan, gathered while statistics are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanStatistics {
    pub received: u64,
    pub emitted: u64,
}

#[derive(Debug, Clone, Copy)]
enum PlanFlag {
    Tracing,
    Statistics,
}

impl PlanFlag {
    fn key(self) -> &'static str {
        match self {
            PlanFlag::Tracing => annotation::TRACE,
            PlanFlag::Statistics => annotation::STATISTICS,
        }
    }
}

impl LifecycleCoordinator {
    // ── Toggles ─────────────────────────────────────────────────────

    pub fn set_tracing_enabled(&self, tenant: TenantId, plan_name: &str, enabled: bool) -> LifecycleResult<()> {
        self.set_flag(tenant, plan_name, PlanFlag::Tracing, enabled)
    }

    pub fn set_statistics_enabled(&self, tenant: TenantId, plan_name: &str, enabled: bool) -> LifecycleResult<()> {
        self.set_flag(tenant, plan_name, PlanFlag::Statistics, enabled)
    }

    /// Rewrite the flag's annotation in the persisted text, then apply it to
    /// the live plan.
    fn set_flag(&self, tenant: TenantId, plan_name: &str, flag: PlanFlag, enabled: bool) -> LifecycleResult<()> {
        self.with_plan_lock(tenant, plan_name, || {
            let instance = self.live(tenant, plan_name)?;
            let text = annotation::set_plan_flag(&instance.plan().text, flag.key(), enabled)?;

            let filename = self.active_filename(tenant, plan_name);
            self.store.save(tenant, &text, plan_name, &filename)?;

            match flag {
                PlanFlag::Tracing => instance.set_tracing(enabled, text),
                PlanFlag::Statistics => instance.set_statistics(enabled, text),
            }
            info!(tenant, plan = %plan_name, flag = flag.key(), enabled, "plan flag updated");
            Ok(())
        })
    }

    fn live(&self, tenant: TenantId, plan_name: &str) -> LifecycleResult<Arc<LivePlanInstance>> {
        self.registry
            .get(tenant, plan_name)
            .ok_or_else(|| LifecycleError::NotFound(format!("active execution plan {plan_name}")))
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Configuration of every live plan, by name.
    pub fn active_plans(&self, tenant: TenantId) -> BTreeMap<String, Plan> {
        self.active_plans_where(tenant, |_| true)
    }

    pub fn active_plan(&self, tenant: TenantId, plan_name: &str) -> Option<Plan> {
        self.registry.get(tenant, plan_name).map(|i| i.plan())
    }

    /// Live plans with an export bound to `stream_id`.
    pub fn plans_exporting(&self, tenant: TenantId, stream_id: &StreamId) -> BTreeMap<String, Plan> {
        self.active_plans_where(tenant, |plan| plan.exports_stream(stream_id))
    }

    /// Live plans with an import bound to `stream_id`.
    pub fn plans_importing(&self, tenant: TenantId, stream_id: &StreamId) -> BTreeMap<String, Plan> {
        self.active_plans_where(tenant, |plan| plan.imports_stream(stream_id))
    }

    fn active_plans_where(&self, tenant: TenantId, keep: impl Fn(&Plan) -> bool) -> BTreeMap<String, Plan> {
        self.registry
            .instances(tenant)
            .into_iter()
            .map(|instance| instance.plan())
            .filter(|plan| keep(plan))
            .map(|plan| (plan.name.clone(), plan))
            .collect()
    }

    /// Descriptors of every file that is not deployed.
    pub fn inactive_files(&self, tenant: TenantId) -> Vec<ConfigFileDescriptor> {
        self.catalog.inactive(tenant)
    }

    /// Persisted text of the live plan `plan_name`.
    pub fn active_plan_text(&self, tenant: TenantId, plan_name: &str) -> LifecycleResult<String> {
        let descriptor = self
            .catalog
            .deployed_by_plan_name(tenant, plan_name)
            .ok_or_else(|| {
                LifecycleError::NotFound(format!("configuration file for {plan_name} doesn't exist"))
            })?;
        Ok(self.store.read_text(tenant, &descriptor.filename)?)
    }

    pub fn inactive_plan_text(&self, tenant: TenantId, filename: &str) -> LifecycleResult<String> {
        Ok(self.store.read_text(tenant, filename)?)
    }

    /// Whether the catalog tracks `filename`, whatever its status.
    pub fn is_file_tracked(&self, tenant: TenantId, filename: &str) -> bool {
        self.catalog.contains(tenant, filename)
    }

    /// Streams declared in `text`, as the engine parses them.
    pub fn plan_streams(&self, text: &str) -> LifecycleResult<Vec<DeclaredStream>> {
        let parsed = self
            .engine
            .parse(text)
            .map_err(|e| LifecycleError::Compile(e.to_string()))?;
        Ok(parsed.streams)
    }

    pub fn plan_statistics(&self, tenant: TenantId, plan_name: &str) -> Option<PlanStatistics> {
        self.registry.get(tenant, plan_name).map(|instance| PlanStatistics {
            received: instance.monitor().received(),
            emitted: instance.monitor().emitted(),
        })
    }

    pub fn is_distributed(&self) -> bool {
        self.config.is_distributed()
    }

    /// Cluster status explanation of each live plan that has a record.
    pub fn cluster_statuses(&self, tenant: TenantId) -> BTreeMap<String, String> {
        let Some(cluster) = &self.cluster else {
            return BTreeMap::new();
        };
        let mut statuses = BTreeMap::new();
        for plan_name in self.registry.names(tenant) {
            match cluster.status.status(&topology_name(&plan_name, tenant)) {
                Ok(Some(record)) => {
                    statuses.insert(plan_name, record.status);
                }
                Ok(None) => {}
                Err(e) => warn!(tenant, plan = %plan_name, error = %e, "failed to read cluster status"),
            }
        }
        statuses
    }

    /// Shut down every live plan of every tenant.
    pub fn shutdown(&self) -> usize {
        self.registry.shutdown_all()
    }
}
