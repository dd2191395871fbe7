//! Cluster error types.

use thiserror::Error;

/// Result type alias for shared status map operations.
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors from the cluster-shared status map.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("lock on {0} is not held by this thread")]
    NotLockOwner(String),
}

/// Result type alias for topology runner operations.
pub type TopologyResult<T> = Result<T, TopologyError>;

/// Errors from the distributed topology runner.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// Carries the id of the service the runner is waiting for.
    #[error("topology service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("failed to submit topology {topology}: {reason}")]
    Submit { topology: String, reason: String },

    #[error("failed to kill topology {topology}: {reason}")]
    Kill { topology: String, reason: String },

    #[error("topology wiring failed for stream {stream}: {reason}")]
    Wiring { stream: String, reason: String },
}
