//! Error types for the core model.

use thiserror::Error;

/// Result type alias for core model operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while interpreting plan text, stream ids, or configuration.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid stream id '{0}': expected <name>:<version>")]
    InvalidStreamId(String),

    #[error("execution plan has no @Plan:name annotation")]
    MissingPlanName,

    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("annotation pattern error: {0}")]
    Pattern(#[from] regex::Error),
}
