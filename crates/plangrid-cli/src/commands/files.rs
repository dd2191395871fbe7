//! `plangrid files`: what a tenant repository holds.

use std::path::Path;

use anyhow::{Context, Result};
use plangrid_core::{PlanMetadata, ProcessorConfig, TenantId, annotation};
use plangrid_store::{ConfigFileStore, FsConfigStore};
use tracing::{info, warn};

pub fn files(config_path: &str, tenant: TenantId) -> Result<()> {
    let config = ProcessorConfig::from_file(Path::new(config_path))
        .with_context(|| format!("failed to load {config_path}"))?;
    let store = FsConfigStore::new(config.repository.root.clone(), &config.repository.extension);

    let rows = list_rows(&store, tenant)?;
    info!(tenant, root = %store.root().display(), files = rows.len(), "repository listed");

    if rows.is_empty() {
        println!("No plan files for tenant {tenant}");
        return Ok(());
    }
    for (filename, plan_name) in rows {
        println!("{filename:<40} {}", plan_name.as_deref().unwrap_or("-"));
    }
    Ok(())
}

/// Each plan file with the plan name its text declares, if any.
pub fn list_rows(store: &dyn ConfigFileStore, tenant: TenantId) -> Result<Vec<(String, Option<String>)>> {
    let mut rows = Vec::new();
    for filename in store.list(tenant)? {
        let plan_name = match store.read_text(tenant, &filename) {
            Ok(text) => annotation::scan(&text)
                .and_then(|parsed| PlanMetadata::from_parsed(&parsed))
                .map(|m| m.name)
                .ok(),
            Err(e) => {
                warn!(tenant, file = %filename, error = %e, "unreadable plan file");
                None
            }
        };
        rows.push((filename, plan_name));
    }
    Ok(rows)
}
