//! Processor configuration (`plangrid.toml`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Default extension of persisted plan files.
pub const DEFAULT_EXTENSION: &str = "siddhiql";

const DEFAULT_RETRY_INTERVAL: &str = "10s";
const DEFAULT_LOCK_TIMEOUT: &str = "10s";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessorConfig {
    #[serde(default)]
    pub repository: RepositoryConfig,
    /// Absent means single-node mode.
    pub distributed: Option<DistributedConfig>,
    /// Absent means plans are never restored from snapshots.
    pub persistence: Option<PersistenceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Root directory; each tenant gets `<root>/<tenant>/executionplans/`.
    pub root: PathBuf,
    #[serde(default = "default_extension")]
    pub extension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributedConfig {
    #[serde(default)]
    pub manager_node: bool,
    #[serde(default)]
    pub worker_node: bool,
    #[serde(default = "default_retry_interval")]
    pub topology_submit_retry_interval: String,
    #[serde(default = "default_lock_timeout")]
    pub status_lock_timeout: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Snapshot interval (e.g. `"15m"`), used by the engine.
    pub interval: String,
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

fn default_retry_interval() -> String {
    DEFAULT_RETRY_INTERVAL.to_string()
}

fn default_lock_timeout() -> String {
    DEFAULT_LOCK_TIMEOUT.to_string()
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/var/lib/plangrid/repository"),
            extension: default_extension(),
        }
    }
}

impl Default for DistributedConfig {
    fn default() -> Self {
        Self {
            manager_node: false,
            worker_node: false,
            topology_submit_retry_interval: default_retry_interval(),
            status_lock_timeout: default_lock_timeout(),
        }
    }
}

impl ProcessorConfig {
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate every duration up front.
    pub fn from_toml_str(content: &str) -> CoreResult<Self> {
        let config: ProcessorConfig = toml::from_str(content)?;
        if let Some(dist) = &config.distributed {
            parse_duration(&dist.topology_submit_retry_interval)?;
            parse_duration(&dist.status_lock_timeout)?;
        }
        if let Some(persistence) = &config.persistence {
            parse_duration(&persistence.interval)?;
        }
        Ok(config)
    }

    pub fn is_distributed(&self) -> bool {
        self.distributed.is_some()
    }

    /// Distributed mode with this node configured as a manager.
    pub fn is_manager_node(&self) -> bool {
        self.distributed.as_ref().is_some_and(|d| d.manager_node)
    }

    /// Distributed mode with this node configured as a worker.
    pub fn is_worker_node(&self) -> bool {
        self.distributed.as_ref().is_some_and(|d| d.worker_node)
    }

    /// `<name>.<extension>`
    pub fn plan_filename(&self, plan_name: &str) -> String {
        format!("{plan_name}.{}", self.repository.extension)
    }
}

impl DistributedConfig {
    pub fn retry_interval(&self) -> Duration {
        parse_duration(&self.topology_submit_retry_interval)
            .unwrap_or(Duration::from_secs(10))
    }

    pub fn lock_timeout(&self) -> Duration {
        parse_duration(&self.status_lock_timeout).unwrap_or(Duration::from_secs(10))
    }
}

/// Parse `"500ms"`, `"10s"`, `"5m"`, or `"1h"`.
pub fn parse_duration(s: &str) -> CoreResult<Duration> {
    let s = s.trim();
    let invalid = || CoreError::InvalidDuration(s.to_string());
    let split = s.find(|c: char| !c.is_ascii_digit()).ok_or_else(invalid)?;
    let (digits, unit) = s.split_at(split);
    let value: u64 = digits.parse().map_err(|_| invalid())?;
    let secs = |per_unit: u64| value.checked_mul(per_unit).map(Duration::from_secs).ok_or_else(invalid);
    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => secs(1),
        "m" => secs(60),
        "h" => secs(3600),
        _ => Err(invalid()),
    }
}
