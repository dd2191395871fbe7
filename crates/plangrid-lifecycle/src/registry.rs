//! Per-tenant registry of live plans.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use plangrid_core::TenantId;
use tracing::info;

use crate::error::{LifecycleError, LifecycleResult};
use crate::instance::LivePlanInstance;

type TenantPlans = Arc<DashMap<String, Arc<LivePlanInstance>>>;

/// Thread-safe `tenant → plan name → live instance` map.
///
/// The registry never starts or stops a plan on its own except in
/// [`shutdown_all`](Self::shutdown_all); callers own shutdown sequencing.
#[derive(Default)]
pub struct PlanRegistry {
    tenants: DashMap<TenantId, TenantPlans>,
}

impl PlanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn plans(&self, tenant: TenantId) -> Option<TenantPlans> {
        self.tenants.get(&tenant).map(|plans| plans.value().clone())
    }

    /// Register `instance` under its name. The presence check and the
    /// insert are one atomic step.
    pub fn put(&self, tenant: TenantId, instance: Arc<LivePlanInstance>) -> LifecycleResult<()> {
        let plans = self.tenants.entry(tenant).or_default().value().clone();
        match plans.entry(instance.name().to_string()) {
            Entry::Occupied(existing) => Err(LifecycleError::DuplicateActivePlan(
                existing.key().clone(),
            )),
            Entry::Vacant(slot) => {
                slot.insert(instance);
                Ok(())
            }
        }
    }

    /// Remove and return the instance. Does not shut it down.
    pub fn remove(&self, tenant: TenantId, name: &str) -> Option<Arc<LivePlanInstance>> {
        self.plans(tenant)?.remove(name).map(|(_, instance)| instance)
    }

    pub fn get(&self, tenant: TenantId, name: &str) -> Option<Arc<LivePlanInstance>> {
        self.plans(tenant)?.get(name).map(|instance| instance.value().clone())
    }

    pub fn contains(&self, tenant: TenantId, name: &str) -> bool {
        self.plans(tenant).is_some_and(|plans| plans.contains_key(name))
    }

    /// Plan names of `tenant`, sorted.
    pub fn names(&self, tenant: TenantId) -> Vec<String> {
        let mut names: Vec<String> = self
            .plans(tenant)
            .map(|plans| plans.iter().map(|e| e.key().clone()).collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn instances(&self, tenant: TenantId) -> Vec<Arc<LivePlanInstance>> {
        self.plans(tenant)
            .map(|plans| plans.iter().map(|e| Arc::clone(e.value())).collect())
            .unwrap_or_default()
    }

    pub fn len(&self, tenant: TenantId) -> usize {
        self.plans(tenant).map_or(0, |plans| plans.len())
    }

    pub fn tenants(&self) -> Vec<TenantId> {
        let mut tenants: Vec<TenantId> = self.tenants.iter().map(|e| *e.key()).collect();
        tenants.sort();
        tenants
    }

    /// Shut down every plan of every tenant. Each instance logs its own
    /// shutdown failure, so one broken plan never stops the rest.
    pub fn shutdown_all(&self) -> usize {
        let mut count = 0;
        for tenant in self.tenants() {
            for instance in self.instances(tenant) {
                instance.shutdown();
                count += 1;
            }
        }
        info!(plans = count, "successfully shut down execution plans");
        count
    }
}
