//! plangrid-core: shared model for execution-plan lifecycle management.
//!
//! Holds the data model (plans, stream bindings, configuration-file
//! descriptors, cluster status records), the plan annotation scanner, the
//! processor configuration, and the contracts of the external collaborators
//! the lifecycle core drives: the plan engine and the stream registry.

pub mod annotation;
pub mod config;
pub mod engine;
pub mod error;
pub mod stream;
pub mod types;

pub use annotation::{Annotation, PlanMetadata};
pub use config::ProcessorConfig;
pub use engine::{DeclaredStream, EngineError, EngineHandle, EngineResult, ParsedPlan, PlanEngine};
pub use error::{CoreError, CoreResult};
pub use stream::{
    Attribute, Event, EventConsumer, EventProducer, EventSink, StreamError, StreamId,
    StreamRegistry, StreamResult, StreamSchema,
};
pub use types::*;
