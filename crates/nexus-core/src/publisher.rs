//! Event publisher (§6 `mqtt`/publisher config, §9 expansion). The live
//! broker integration is an external collaborator out of scope for this
//! crate; `LoggingPublisher` stands in for it so the publish call site and
//! its topic/payload contract are still exercised.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::NexusResult;

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: Value) -> NexusResult<()>;
}

pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(&self, _topic: &str, _payload: Value) -> NexusResult<()> {
        Ok(())
    }
}

/// Logs every publish at info level with the configured topic prefix
/// applied. A real MQTT-backed publisher would retain this trait boundary
/// and swap only its body.
pub struct LoggingPublisher {
    topic_prefix: String,
}

impl LoggingPublisher {
    pub fn new(topic_prefix: impl Into<String>) -> Self {
        LoggingPublisher { topic_prefix: topic_prefix.into() }
    }
}

#[async_trait]
impl EventPublisher for LoggingPublisher {
    async fn publish(&self, topic: &str, payload: Value) -> NexusResult<()> {
        tracing::info!(topic = %format!("{}/{}", self.topic_prefix, topic), %payload, "publishing event");
        Ok(())
    }
}
