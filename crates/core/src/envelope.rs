use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// The unit of transport: a flat JSON object with a unique id, a dotted
/// event name, the source-side change timestamp, and event-specific
/// fields flattened alongside them.
///
/// Envelopes are self-describing: consumers decide relevance and
/// idempotency from these fields alone. Unknown keys must be ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub event_id: Uuid,
    pub event_name: String,
    pub event_timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("payload for `{event_name}` did not serialize to a JSON object")]
    NotAnObject { event_name: String },
    #[error("failed to serialize payload for `{event_name}`: {source}")]
    Serialize {
        event_name: String,
        #[source]
        source: serde_json::Error,
    },
}

impl Envelope {
    /// New envelope with a freshly generated `event_id` and no extra
    /// fields. Ids are assigned exactly once, at construction.
    pub fn new(event_name: impl Into<String>, event_timestamp: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_name: event_name.into(),
            event_timestamp,
            data: Map::new(),
        }
    }

    /// Merge a serializable payload struct into the envelope's flat
    /// field map. The payload must serialize to a JSON object.
    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> Result<Self, EnvelopeError> {
        let value = serde_json::to_value(payload).map_err(|source| EnvelopeError::Serialize {
            event_name: self.event_name.clone(),
            source,
        })?;
        match value {
            Value::Object(fields) => {
                self.data.extend(fields);
                Ok(self)
            }
            _ => Err(EnvelopeError::NotAnObject {
                event_name: self.event_name,
            }),
        }
    }

    /// Set a single field.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Identifier of the primary entity this event concerns, when the
    /// envelope carries one under a catalog key.
    pub fn subject_id(&self) -> Option<&str> {
        self.data
            .get("user_id")
            .or_else(|| self.data.get("subscription_id"))
            .and_then(Value::as_str)
    }
}
