//! Filesystem persistence of plan text.
//!
//! Writes go to a temporary sibling first and are renamed into place, so a
//! reader never sees a half-written plan.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use plangrid_core::TenantId;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};

/// Directory under each tenant root holding plan files.
pub const PLAN_DIRECTORY: &str = "executionplans";

/// Durable store of plan files keyed by filename, partitioned by tenant.
pub trait ConfigFileStore: Send + Sync {
    /// Persist `text` for plan `plan_name` under `filename`, replacing any
    /// previous content.
    fn save(&self, tenant: TenantId, text: &str, plan_name: &str, filename: &str)
    -> StoreResult<()>;

    /// Delete `filename`. Returns true if it existed.
    fn delete(&self, tenant: TenantId, filename: &str) -> StoreResult<bool>;

    fn read_text(&self, tenant: TenantId, filename: &str) -> StoreResult<String>;

    /// Filenames of every plan file in the tenant repository, sorted.
    fn list(&self, tenant: TenantId) -> StoreResult<Vec<String>>;
}

/// Plan files on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsConfigStore {
    root: PathBuf,
    extension: String,
}

impl FsConfigStore {
    pub fn new(root: impl Into<PathBuf>, extension: &str) -> Self {
        Self {
            root: root.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<tenant>/executionplans`
    pub fn tenant_dir(&self, tenant: TenantId) -> PathBuf {
        self.root.join(tenant.to_string()).join(PLAN_DIRECTORY)
    }

    fn ensure_tenant_dir(&self, tenant: TenantId) -> StoreResult<PathBuf> {
        let dir = self.tenant_dir(tenant);
        fs::create_dir_all(&dir).map_err(|source| StoreError::CreateDir {
            path: dir.display().to_string(),
            source,
        })?;
        Ok(dir)
    }

    fn has_plan_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == self.extension)
    }
}

/// Reject anything that is not a bare filename.
fn validate_filename(filename: &str) -> StoreResult<()> {
    let bare = Path::new(filename).file_name().and_then(|n| n.to_str());
    if filename.is_empty() || filename.starts_with('.') || bare != Some(filename) {
        return Err(StoreError::InvalidFilename(filename.to_string()));
    }
    Ok(())
}

impl ConfigFileStore for FsConfigStore {
    fn save(
        &self,
        tenant: TenantId,
        text: &str,
        plan_name: &str,
        filename: &str,
    ) -> StoreResult<()> {
        validate_filename(filename)?;
        let dir = self.ensure_tenant_dir(tenant)?;
        let target = dir.join(filename);
        let staging = dir.join(format!(".{filename}.tmp"));

        let write_err = |source| StoreError::Write {
            filename: filename.to_string(),
            source,
        };
        fs::write(&staging, text).map_err(write_err)?;
        if let Err(source) = fs::rename(&staging, &target) {
            let _ = fs::remove_file(&staging);
            return Err(write_err(source));
        }

        info!(tenant, plan = %plan_name, file = %filename, "plan file saved");
        Ok(())
    }

    fn delete(&self, tenant: TenantId, filename: &str) -> StoreResult<bool> {
        validate_filename(filename)?;
        let path = self.tenant_dir(tenant).join(filename);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(tenant, file = %filename, "plan file deleted");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(tenant, file = %filename, "plan file already absent");
                Ok(false)
            }
            Err(source) => Err(StoreError::Delete {
                filename: filename.to_string(),
                source,
            }),
        }
    }

    fn read_text(&self, tenant: TenantId, filename: &str) -> StoreResult<String> {
        validate_filename(filename)?;
        let path = self.tenant_dir(tenant).join(filename);
        fs::read_to_string(&path).map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                StoreError::NotFound(filename.to_string())
            } else {
                StoreError::Read {
                    filename: filename.to_string(),
                    source,
                }
            }
        })
    }

    fn list(&self, tenant: TenantId) -> StoreResult<Vec<String>> {
        let dir = self.tenant_dir(tenant);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| StoreError::List(e.to_string()))?;
            if !entry.file_type().is_file() || !self.has_plan_extension(entry.path()) {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        debug!(tenant, count = names.len(), "plan files listed");
        Ok(names)
    }
}
