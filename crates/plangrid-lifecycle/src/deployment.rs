//! Plan files: deploy, edit, undeploy, load and reactivation.
//!
//! A descriptor's status moves like this:
//!
//! ```text
//! (new) ──load_file──► DEPLOYED
//!                  ├─► WAITING_FOR_DEPENDENCY   (a bound stream is undefined)
//!                  ├─► WAITING_FOR_OSGI_SERVICE (topology service not up)
//!                  └─► ERROR
//!
//! WAITING_* ──on_dependency_resolved / notify_service_available──► reload
//! DEPLOYED  ──on_stream_removed──► reload
//! ```

use plangrid_core::{ConfigFileDescriptor, FileStatus, Plan, StreamError, StreamId, TenantId};
use tracing::{debug, error, info, warn};

use crate::coordinator::LifecycleCoordinator;
use crate::error::{LifecycleError, LifecycleResult};

/// What [`LifecycleCoordinator::edit`] rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditTarget<'a> {
    /// The file backing the live plan with this name.
    Active(&'a str),
    /// The inactive file with this filename.
    Inactive(&'a str),
}

impl LifecycleCoordinator {
    /// True if a live plan's name equals `name` ignoring case.
    fn name_in_use(&self, tenant: TenantId, name: &str) -> bool {
        self.registry
            .names(tenant)
            .iter()
            .any(|n| n.eq_ignore_ascii_case(name))
    }

    /// Fail with the first bound stream the registry cannot resolve.
    fn check_dependencies(&self, tenant: TenantId, plan: &Plan) -> LifecycleResult<()> {
        for binding in plan.bindings() {
            self.streams.resolve(tenant, &binding.stream_id)?;
        }
        Ok(())
    }

    /// Parse `text` and check that every bound stream is defined.
    pub fn validate(&self, tenant: TenantId, text: &str) -> LifecycleResult<Plan> {
        let plan = self.parse_plan(text, true)?;
        self.check_dependencies(tenant, &plan)?;
        Ok(plan)
    }

    /// Persist `text` as `<name>.<ext>` without activating it.
    /// Returns the filename written.
    pub fn deploy(&self, tenant: TenantId, text: &str) -> LifecycleResult<String> {
        let plan = self.parse_plan(text, true)?;
        if self.name_in_use(tenant, &plan.name) {
            return Err(LifecycleError::NameConflict(plan.name));
        }

        let filename = self.config.plan_filename(&plan.name);
        if self
            .catalog
            .find_by_filename(tenant, &filename)
            .is_some_and(|d| d.status.is_inactive())
        {
            debug!(tenant, file = %filename, "replacing inactive plan file");
            self.undeploy_inactive(tenant, &filename)?;
        }

        self.store.save(tenant, text, &plan.name, &filename)?;
        info!(tenant, plan = %plan.name, file = %filename, "execution plan deployed");
        Ok(filename)
    }

    /// Replace the persisted text of `target` with `text` in place; a failed
    /// write leaves the previous file intact. Does not reactivate anything.
    /// Returns the filename written.
    pub fn edit(&self, tenant: TenantId, text: &str, target: EditTarget<'_>) -> LifecycleResult<String> {
        let plan = self.validate(tenant, text)?;
        let filename = match target {
            EditTarget::Active(current) => {
                if current.is_empty() {
                    return Err(LifecycleError::NotFound("execution plan name".to_string()));
                }
                if plan.name != current && self.name_in_use(tenant, &plan.name) {
                    return Err(LifecycleError::NameConflict(plan.name));
                }
                self.active_filename(tenant, current)
            }
            EditTarget::Inactive(filename) => filename.to_string(),
        };

        self.store.save(tenant, text, &plan.name, &filename)?;
        info!(tenant, plan = %plan.name, file = %filename, "execution plan edited");
        Ok(filename)
    }

    /// Delete the plan file `filename` and forget it, deactivating its plan
    /// if it was live.
    pub fn undeploy_inactive(&self, tenant: TenantId, filename: &str) -> LifecycleResult<()> {
        self.store.delete(tenant, filename)?;
        self.remove_file(tenant, filename);
        Ok(())
    }

    /// Undeploy the file backing the live plan `plan_name`.
    pub fn undeploy_active(&self, tenant: TenantId, plan_name: &str) -> LifecycleResult<()> {
        let descriptor = self
            .catalog
            .deployed_by_plan_name(tenant, plan_name)
            .ok_or_else(|| {
                LifecycleError::NotFound(format!("configuration file for {plan_name}"))
            })?;
        self.undeploy_inactive(tenant, &descriptor.filename)
    }

    // ── File deployer ───────────────────────────────────────────────

    /// Deploy the persisted file `filename` and record the outcome. A file
    /// that is already tracked is reloaded.
    pub fn load_file(&self, tenant: TenantId, filename: &str) -> LifecycleResult<FileStatus> {
        if self.catalog.contains(tenant, filename) {
            return self.reload(tenant, filename);
        }
        self.deploy_file(tenant, filename)
    }

    /// Forget `filename` and run it through the deployment pipeline again.
    pub fn reload(&self, tenant: TenantId, filename: &str) -> LifecycleResult<FileStatus> {
        self.remove_file(tenant, filename);
        self.deploy_file(tenant, filename)
    }

    /// Forget `filename`, deactivating its plan first if it was live.
    /// The file itself is left alone. Returns false if it was not tracked.
    pub fn remove_file(&self, tenant: TenantId, filename: &str) -> bool {
        let Some(descriptor) = self.catalog.find_by_filename(tenant, filename) else {
            return false;
        };
        if descriptor.status == FileStatus::Deployed {
            if let Some(plan_name) = &descriptor.plan_name {
                self.deactivate(tenant, plan_name);
            }
        }
        self.catalog.remove_by_filename(tenant, filename);
        debug!(tenant, file = %filename, "plan file removed from catalog");
        true
    }

    /// Load every plan file in the tenant repository.
    pub fn load_all(&self, tenant: TenantId) -> LifecycleResult<Vec<(String, FileStatus)>> {
        let files = self.store.list(tenant)?;
        let mut loaded = Vec::with_capacity(files.len());
        for filename in files {
            match self.load_file(tenant, &filename) {
                Ok(status) => loaded.push((filename, status)),
                Err(e) => error!(tenant, file = %filename, error = %e, "failed to load plan file"),
            }
        }
        let deployed = loaded
            .iter()
            .filter(|(_, status)| *status == FileStatus::Deployed)
            .count();
        info!(tenant, files = loaded.len(), deployed, "plan repository loaded");
        Ok(loaded)
    }

    fn deploy_file(&self, tenant: TenantId, filename: &str) -> LifecycleResult<FileStatus> {
        let text = self.store.read_text(tenant, filename)?;
        let descriptor = match self.parse_plan(&text, true) {
            Err(e) => ConfigFileDescriptor::failed(filename, None, e.to_string()),
            Ok(plan) => {
                let outcome = self
                    .check_dependencies(tenant, &plan)
                    .and_then(|()| self.activate(tenant, &text, true));
                describe(filename, &plan.name, outcome)
            }
        };

        let status = descriptor.status;
        match status {
            FileStatus::Deployed => info!(tenant, file = %filename, "plan file deployed"),
            FileStatus::Error => error!(
                tenant,
                file = %filename,
                reason = descriptor.message.as_deref().unwrap_or_default(),
                "plan file could not be deployed"
            ),
            _ => warn!(
                tenant,
                file = %filename,
                %status,
                dependency = descriptor.dependency.as_deref().unwrap_or_default(),
                "plan file waiting for dependency"
            ),
        }
        self.catalog.add(tenant, descriptor);
        Ok(status)
    }

    // ── Reactivation ────────────────────────────────────────────────

    /// Reload every file waiting with `status` on `dependency`. Per-file
    /// failures are logged and the rest still run. Returns how many files
    /// were reloaded.
    pub fn on_dependency_resolved(
        &self,
        tenant: TenantId,
        status: FileStatus,
        dependency: &str,
    ) -> usize {
        let mut reloaded = 0;
        for descriptor in self.catalog.matching(tenant, status, dependency) {
            match self.reload(tenant, &descriptor.filename) {
                Ok(now) => {
                    reloaded += 1;
                    info!(tenant, file = %descriptor.filename, %dependency, status = %now, "plan file reloaded");
                }
                Err(e) => error!(
                    tenant,
                    file = %descriptor.filename,
                    error = %e,
                    "exception occurred while trying to deploy the plan file"
                ),
            }
        }
        reloaded
    }

    /// A service came up: retry every file of every tenant waiting on it.
    pub fn notify_service_available(&self, service_id: &str) -> usize {
        self.catalog
            .tenants()
            .into_iter()
            .map(|tenant| {
                self.on_dependency_resolved(tenant, FileStatus::WaitingForService, service_id)
            })
            .sum()
    }

    /// `stream_id` went away: reload every live plan producing or consuming
    /// it, each at most once.
    pub fn on_stream_removed(&self, tenant: TenantId, stream_id: &StreamId) -> usize {
        let affected: Vec<String> = self
            .registry
            .instances(tenant)
            .into_iter()
            .filter(|instance| instance.produces(stream_id) || instance.consumes(stream_id))
            .map(|instance| instance.name().to_string())
            .collect();

        let mut reloaded = 0;
        for plan_name in affected {
            let Some(descriptor) = self.catalog.deployed_by_plan_name(tenant, &plan_name) else {
                warn!(tenant, plan = %plan_name, stream = %stream_id, "no plan file backs live plan, not reloading");
                continue;
            };
            match self.reload(tenant, &descriptor.filename) {
                Ok(now) => {
                    reloaded += 1;
                    info!(tenant, plan = %plan_name, stream = %stream_id, status = %now, "plan reloaded after stream removal");
                }
                Err(e) => error!(
                    tenant,
                    file = %descriptor.filename,
                    error = %e,
                    "exception occurred while trying to deploy the plan file"
                ),
            }
        }
        reloaded
    }
}

/// Map an activation outcome to the descriptor recorded for the file.
fn describe(filename: &str, plan_name: &str, outcome: LifecycleResult<()>) -> ConfigFileDescriptor {
    match outcome {
        Ok(()) => ConfigFileDescriptor::deployed(filename, plan_name),
        Err(LifecycleError::Config(StreamError::NotFound(stream))) => ConfigFileDescriptor::waiting(
            filename,
            Some(plan_name),
            FileStatus::WaitingForDependency,
            &stream.to_string(),
            format!("stream {stream} is not defined"),
        ),
        Err(LifecycleError::ServiceUnavailable(service)) => ConfigFileDescriptor::waiting(
            filename,
            Some(plan_name),
            FileStatus::WaitingForService,
            &service,
            format!("waiting for service {service}"),
        ),
        Err(e) => ConfigFileDescriptor::failed(filename, Some(plan_name), e.to_string()),
    }
}
