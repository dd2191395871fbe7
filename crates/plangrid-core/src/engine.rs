//! Plan engine contract.
//!
//! The engine owns the query language. The lifecycle core only needs it to
//! parse plan text into annotations, instantiate a runnable handle, and
//! drive that handle's inputs, outputs, and lifecycle.

use std::sync::Arc;

use thiserror::Error;

use crate::annotation::Annotation;
use crate::stream::EventSink;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors reported by the plan engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("instantiation failed: {0}")]
    Instantiate(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

/// A stream declared in the plan text together with its annotations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredStream {
    pub name: String,
    pub annotations: Vec<Annotation>,
}

/// Structural view of plan text returned by [`PlanEngine::parse`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPlan {
    /// Plan-level annotations (`@Plan:...`).
    pub annotations: Vec<Annotation>,
    pub streams: Vec<DeclaredStream>,
}

/// Compiles plan text.
pub trait PlanEngine: Send + Sync {
    fn parse(&self, text: &str) -> EngineResult<ParsedPlan>;

    fn instantiate(&self, text: &str) -> EngineResult<Box<dyn EngineHandle>>;
}

/// A compiled, runnable plan.
pub trait EngineHandle: Send + Sync {
    /// Input handle feeding the stream declared as `stream`.
    fn input_handle(&self, stream: &str) -> Option<Arc<dyn EventSink>>;

    fn add_output_callback(&self, stream: &str, callback: Arc<dyn EventSink>) -> EngineResult<()>;

    fn start(&self) -> EngineResult<()>;

    fn shutdown(&self) -> EngineResult<()>;

    /// Restore the last durable snapshot. Engines without persistence keep
    /// the default no-op.
    fn restore_snapshot(&self) -> EngineResult<()> {
        Ok(())
    }
}
