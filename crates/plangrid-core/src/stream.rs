//! Stream identifiers and the stream registry contract.
//!
//! A stream is addressed externally as `<name>:<version>`. The registry
//! resolves ids to schemas and connects producers (plan outputs) and
//! consumers (plan inputs) to the stream junctions it owns.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{CoreError, CoreResult};
use crate::types::TenantId;

/// Separator between stream name and version in a stream id.
pub const STREAM_SEPARATOR: char = ':';

/// External stream identifier: `(name, version)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId {
    pub name: String,
    pub version: String,
}

impl StreamId {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
        }
    }

    /// Parse `Name:Version`. Both parts are required.
    pub fn parse(id: &str) -> CoreResult<Self> {
        let (name, version) = id
            .trim()
            .split_once(STREAM_SEPARATOR)
            .ok_or_else(|| CoreError::InvalidStreamId(id.to_string()))?;
        let (name, version) = (name.trim(), version.trim());
        if name.is_empty() || version.is_empty() || version.contains(STREAM_SEPARATOR) {
            return Err(CoreError::InvalidStreamId(id.to_string()));
        }
        Ok(Self::new(name, version))
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.name, STREAM_SEPARATOR, self.version)
    }
}

impl FromStr for StreamId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// One typed attribute of a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    /// Attribute type as the engine spells it (`string`, `double`, ...).
    pub kind: String,
}

/// Resolved schema of a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSchema {
    pub stream_id: StreamId,
    pub attributes: Vec<Attribute>,
}

impl StreamSchema {
    /// Render the schema as a stream definition named `local_name`, the form
    /// handed to the topology runner.
    pub fn definition(&self, local_name: &str) -> String {
        let attributes = self
            .attributes
            .iter()
            .map(|a| format!("{} {}", a.name, a.kind))
            .collect::<Vec<_>>()
            .join(", ");
        format!("define stream {local_name} ({attributes});")
    }
}

/// A single event flowing through a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event timestamp in epoch milliseconds.
    pub timestamp: i64,
    pub data: Vec<serde_json::Value>,
}

/// Anything that accepts a batch of events.
pub trait EventSink: Send + Sync {
    fn publish(&self, events: &[Event]);
}

/// Export side of a plan: emits events into a registry stream.
pub trait EventProducer: Send + Sync {
    fn stream_id(&self) -> &StreamId;
    fn plan_name(&self) -> &str;
    /// Called by the registry on subscribe; later events go to `sink`.
    fn attach(&self, sink: Arc<dyn EventSink>);
}

/// Import side of a plan: receives events from a registry stream.
pub trait EventConsumer: Send + Sync {
    fn stream_id(&self) -> &StreamId;
    fn plan_name(&self) -> &str;
    fn consume(&self, events: &[Event]);
}

/// Result type alias for stream registry operations.
pub type StreamResult<T> = Result<T, StreamError>;

/// Per-stream resolution and subscription failures.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("stream not defined: {0}")]
    NotFound(StreamId),

    #[error("failed to subscribe to {stream}: {reason}")]
    Subscribe { stream: StreamId, reason: String },

    #[error("stream registry error: {0}")]
    Registry(String),
}

/// Registry of event streams, partitioned by tenant.
pub trait StreamRegistry: Send + Sync {
    fn resolve(&self, tenant: TenantId, stream_id: &StreamId) -> StreamResult<StreamSchema>;

    fn subscribe_producer(
        &self,
        tenant: TenantId,
        producer: Arc<dyn EventProducer>,
    ) -> StreamResult<()>;

    fn subscribe_consumer(
        &self,
        tenant: TenantId,
        consumer: Arc<dyn EventConsumer>,
    ) -> StreamResult<()>;

    fn unsubscribe_producer(&self, tenant: TenantId, producer: &Arc<dyn EventProducer>);

    fn unsubscribe_consumer(&self, tenant: TenantId, consumer: &Arc<dyn EventConsumer>);
}
