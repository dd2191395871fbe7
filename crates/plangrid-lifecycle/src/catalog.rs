//! Per-tenant catalog of configuration-file descriptors.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use plangrid_core::{ConfigFileDescriptor, FileStatus, TenantId};

type TenantFiles = Arc<RwLock<Vec<ConfigFileDescriptor>>>;

/// What became of every plan file each tenant knows about.
///
/// At most one descriptor exists per filename per tenant. The catalog does
/// not deactivate plans; the coordinator does that before it removes a
/// `DEPLOYED` descriptor.
#[derive(Default)]
pub struct ConfigFileCatalog {
    tenants: DashMap<TenantId, TenantFiles>,
}

impl ConfigFileCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn files(&self, tenant: TenantId) -> Option<TenantFiles> {
        self.tenants.get(&tenant).map(|files| files.value().clone())
    }

    fn scan(
        &self,
        tenant: TenantId,
        keep: impl Fn(&ConfigFileDescriptor) -> bool,
    ) -> Vec<ConfigFileDescriptor> {
        self.files(tenant)
            .map(|files| files.read().iter().filter(|d| keep(d)).cloned().collect())
            .unwrap_or_default()
    }

    /// Record `descriptor`, replacing any entry for the same filename.
    /// Returns the replaced entry.
    pub fn add(&self, tenant: TenantId, descriptor: ConfigFileDescriptor) -> Option<ConfigFileDescriptor> {
        let files = self.tenants.entry(tenant).or_default().value().clone();
        let mut files = files.write();
        match files.iter_mut().find(|d| d.filename == descriptor.filename) {
            Some(existing) => Some(std::mem::replace(existing, descriptor)),
            None => {
                files.push(descriptor);
                None
            }
        }
    }

    pub fn remove_by_filename(&self, tenant: TenantId, filename: &str) -> Option<ConfigFileDescriptor> {
        let files = self.files(tenant)?;
        let mut files = files.write();
        let index = files.iter().position(|d| d.filename == filename)?;
        Some(files.remove(index))
    }

    pub fn find_by_filename(&self, tenant: TenantId, filename: &str) -> Option<ConfigFileDescriptor> {
        self.scan(tenant, |d| d.filename == filename).into_iter().next()
    }

    /// The `DEPLOYED` file backing the live plan `plan_name`.
    pub fn deployed_by_plan_name(&self, tenant: TenantId, plan_name: &str) -> Option<ConfigFileDescriptor> {
        self.scan(tenant, |d| {
            d.status == FileStatus::Deployed && d.plan_name.as_deref() == Some(plan_name)
        })
        .into_iter()
        .next()
    }

    /// Descriptors waiting with `status` on `dependency` (case-insensitive).
    pub fn matching(&self, tenant: TenantId, status: FileStatus, dependency: &str) -> Vec<ConfigFileDescriptor> {
        self.scan(tenant, |d| d.waits_on(status, dependency))
    }

    /// Every descriptor that is not `DEPLOYED`.
    pub fn inactive(&self, tenant: TenantId) -> Vec<ConfigFileDescriptor> {
        self.scan(tenant, |d| d.status.is_inactive())
    }

    pub fn all(&self, tenant: TenantId) -> Vec<ConfigFileDescriptor> {
        self.scan(tenant, |_| true)
    }

    pub fn contains(&self, tenant: TenantId, filename: &str) -> bool {
        self.files(tenant)
            .is_some_and(|files| files.read().iter().any(|d| d.filename == filename))
    }

    pub fn tenants(&self) -> Vec<TenantId> {
        let mut tenants: Vec<TenantId> = self.tenants.iter().map(|e| *e.key()).collect();
        tenants.sort();
        tenants
    }
}
