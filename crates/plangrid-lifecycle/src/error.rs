//! Lifecycle error types.

use plangrid_cluster::TopologyError;
use plangrid_core::{CoreError, StreamError};
use plangrid_store::StoreError;
use thiserror::Error;

/// Errors surfaced by lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The plan text is invalid; retrying is pointless until it changes.
    #[error("couldn't parse execution plan: {0}")]
    Compile(String),

    #[error("{0} already registered as an execution plan in this tenant")]
    NameConflict(String),

    #[error("execution plan with the same name already exists: {0}")]
    DuplicateActivePlan(String),

    #[error("invalid query specified: {0}")]
    InvalidPlan(String),

    #[error("distributed deployment failed: {0}")]
    Deployment(String),

    /// Carries the id of the unavailable service.
    #[error("service not available: {0}")]
    ServiceUnavailable(String),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("not found: {0}")]
    NotFound(String),

    /// A single stream failed to resolve or subscribe.
    #[error("stream configuration error: {0}")]
    Config(#[from] StreamError),
}

impl From<CoreError> for LifecycleError {
    fn from(e: CoreError) -> Self {
        LifecycleError::Compile(e.to_string())
    }
}

impl From<TopologyError> for LifecycleError {
    fn from(e: TopologyError) -> Self {
        match e {
            TopologyError::ServiceUnavailable(service) => LifecycleError::ServiceUnavailable(service),
            other => LifecycleError::Deployment(other.to_string()),
        }
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;
