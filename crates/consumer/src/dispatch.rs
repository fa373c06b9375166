use crate::error::{HandlerError, HandlerOutcome};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Per-message idempotency key derived from the transport position,
/// `topic:partition:offset`. Computed at receive time and passed to the
/// handler; never persisted by the runtime. Handlers that must survive
/// a full topic replay derive their own key from the payload instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn new(topic: &str, partition: i32, offset: i64) -> Self {
        Self(format!("{topic}:{partition}:{offset}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A per-topic business reaction. Implementations must tolerate
/// redelivery of the same payload.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(
        &self,
        payload: &Map<String, Value>,
        key: &IdempotencyKey,
    ) -> Result<HandlerOutcome, HandlerError>;
}

/// Static topic-to-handler mapping. At most one handler per topic;
/// topics without a registration are silently ignored by the runtime.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn EventHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, topic: &str, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.insert(topic.to_string(), handler);
        self
    }

    pub fn get(&self, topic: &str) -> Option<&Arc<dyn EventHandler>> {
        self.handlers.get(topic)
    }

    pub fn topics(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("topics", &self.topics())
            .finish()
    }
}
