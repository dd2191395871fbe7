//! Shared types used across plangrid crates.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::stream::StreamId;

/// Tenant identifier. Every core data structure is partitioned by it.
pub type TenantId = i32;

// ── Plan ──────────────────────────────────────────────────────────

/// Which side of the plan a bound stream sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Import,
    Export,
}

/// Binds a stream declared inside the plan text to an external stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamBinding {
    /// Stream name as declared in the plan (`define stream <local_name>`).
    pub local_name: String,
    pub stream_id: StreamId,
    pub direction: Direction,
}

/// Configuration of an execution plan, derived from its annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub name: String,
    /// Full plan text as persisted.
    pub text: String,
    pub description: String,
    pub tracing_enabled: bool,
    pub statistics_enabled: bool,
    pub editable: bool,
    pub imports: Vec<StreamBinding>,
    pub exports: Vec<StreamBinding>,
}

impl Plan {
    /// True if any export binding targets `stream_id`.
    pub fn exports_stream(&self, stream_id: &StreamId) -> bool {
        self.exports.iter().any(|b| &b.stream_id == stream_id)
    }

    /// True if any import binding reads from `stream_id`.
    pub fn imports_stream(&self, stream_id: &StreamId) -> bool {
        self.imports.iter().any(|b| &b.stream_id == stream_id)
    }

    /// All bindings, imports first.
    pub fn bindings(&self) -> impl Iterator<Item = &StreamBinding> {
        self.imports.iter().chain(self.exports.iter())
    }
}

// ── Configuration files ───────────────────────────────────────────

/// Deployment status of a persisted plan file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileStatus {
    Deployed,
    /// Waiting for a stream definition to appear.
    WaitingForDependency,
    /// Waiting for an external service (e.g. the topology manager).
    #[serde(rename = "WAITING_FOR_OSGI_SERVICE")]
    WaitingForService,
    Error,
}

impl FileStatus {
    pub fn is_inactive(self) -> bool {
        self != FileStatus::Deployed
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FileStatus::Deployed => "DEPLOYED",
            FileStatus::WaitingForDependency => "WAITING_FOR_DEPENDENCY",
            FileStatus::WaitingForService => "WAITING_FOR_OSGI_SERVICE",
            FileStatus::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// Catalog entry describing one persisted plan file and what became of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFileDescriptor {
    /// File name inside the tenant repository, e.g. `OrderAlerts.siddhiql`.
    pub filename: String,
    /// Plan name, when the text got far enough to yield one.
    pub plan_name: Option<String>,
    pub status: FileStatus,
    /// Stream id or service id this file is waiting on.
    pub dependency: Option<String>,
    /// Human-readable reason for a non-deployed status.
    pub message: Option<String>,
}

impl ConfigFileDescriptor {
    pub fn deployed(filename: &str, plan_name: &str) -> Self {
        Self {
            filename: filename.to_string(),
            plan_name: Some(plan_name.to_string()),
            status: FileStatus::Deployed,
            dependency: None,
            message: None,
        }
    }

    pub fn waiting(
        filename: &str,
        plan_name: Option<&str>,
        status: FileStatus,
        dependency: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.to_string(),
            plan_name: plan_name.map(str::to_string),
            status,
            dependency: Some(dependency.to_string()),
            message: Some(message.into()),
        }
    }

    pub fn failed(filename: &str, plan_name: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            filename: filename.to_string(),
            plan_name: plan_name.map(str::to_string),
            status: FileStatus::Error,
            dependency: None,
            message: Some(message.into()),
        }
    }

    /// Whether this descriptor waits with `status` on `dependency`.
    /// Dependency ids compare case-insensitively.
    pub fn waits_on(&self, status: FileStatus, dependency: &str) -> bool {
        self.status == status
            && self
                .dependency
                .as_deref()
                .is_some_and(|d| d.eq_ignore_ascii_case(dependency))
    }
}

// ── Cluster status ────────────────────────────────────────────────

/// Cluster-visible deployment status of one plan's topology.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStatusRecord {
    /// Number of input dispatchers the topology expects to connect.
    pub required_receiver_count: u32,
    /// Free-text explanation shown to operators.
    pub status: String,
}
