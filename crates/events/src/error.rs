use usersync_core::EnvelopeError;

/// Failures surfaced synchronously to publish callers. Delivery
/// failures after a successful enqueue are not part of this taxonomy;
/// they are observable only through logs and metrics.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to create Kafka producer: {0}")]
    Client(#[source] rdkafka::error::KafkaError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error("failed to serialize envelope for topic `{topic}`: {source}")]
    Serialize {
        topic: String,
        #[source]
        source: serde_json::Error,
    },

    /// The local client refused the message (queue full). Not retried
    /// automatically; the caller decides.
    #[error("failed to enqueue message for topic `{topic}`: {source}")]
    Enqueue {
        topic: String,
        #[source]
        source: rdkafka::error::KafkaError,
    },
}
