use crate::error::PublishError;
use crate::metrics::ProducerMetrics;
use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    producer::{FutureProducer, FutureRecord, Producer},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error};
use usersync_core::Envelope;

/// Seam between the domain event builders and the transport. One
/// implementation per process; builders receive the handle explicitly.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, envelope: &Envelope)
        -> Result<(), PublishError>;
}

/// Kafka publisher configured for idempotent delivery (at-least-once
/// with broker-side dedup on retries) and bounded timeouts.
///
/// `Clone` shares the underlying producer; construct once per process
/// and pass the handle around rather than re-creating it per call.
#[derive(Clone)]
pub struct KafkaEventPublisher {
    producer: FutureProducer,
    metrics: ProducerMetrics,
}

impl KafkaEventPublisher {
    pub fn new(brokers: &str) -> Result<Self, PublishError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("enable.idempotence", "true")
            .set("retries", "5")
            .set("acks", "all")
            .set("socket.timeout.ms", "10000")
            .set("message.timeout.ms", "10000")
            .create()
            .map_err(PublishError::Client)?;

        Ok(Self {
            producer,
            metrics: ProducerMetrics::default(),
        })
    }

    /// Readiness probe: fetch cluster metadata with a bounded timeout.
    pub fn health_check(&self, timeout: Duration) -> anyhow::Result<()> {
        self.producer
            .client()
            .fetch_metadata(None, timeout)
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("Kafka metadata fetch failed: {e}"))
    }
}

#[async_trait]
impl EventPublisher for KafkaEventPublisher {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        envelope: &Envelope,
    ) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(envelope).map_err(|source| PublishError::Serialize {
            topic: topic.to_string(),
            source,
        })?;

        let record = FutureRecord::to(topic).key(key).payload(&payload);

        let delivery = match self.producer.send_result(record) {
            Ok(delivery) => delivery,
            Err((source, _record)) => {
                self.metrics.enqueue_error.increment(1);
                return Err(PublishError::Enqueue {
                    topic: topic.to_string(),
                    source,
                });
            }
        };

        self.metrics.event_enqueued.increment(1);

        // The delivery report surfaces asynchronously; the caller is
        // never blocked on broker acknowledgement.
        let topic = topic.to_string();
        let key = key.to_string();
        let event_id = envelope.event_id;
        let metrics = self.metrics.clone();
        tokio::spawn(async move {
            match delivery.await {
                Ok(Ok((partition, offset))) => {
                    metrics.event_delivered.increment(1);
                    debug!(
                        topic = %topic,
                        key = %key,
                        event_id = %event_id,
                        partition = partition,
                        offset = offset,
                        "Event delivered"
                    );
                }
                Ok(Err((err, _message))) => {
                    metrics.delivery_failure.increment(1);
                    error!(
                        topic = %topic,
                        key = %key,
                        event_id = %event_id,
                        error = %err,
                        "Event delivery failed"
                    );
                }
                Err(_cancelled) => {
                    metrics.delivery_failure.increment(1);
                    error!(
                        topic = %topic,
                        key = %key,
                        event_id = %event_id,
                        "Delivery report dropped before completion"
                    );
                }
            }
        });

        Ok(())
    }
}

/// Captures published envelopes for tests and local development.
#[derive(Debug, Default, Clone)]
pub struct InMemoryEventPublisher {
    messages: Arc<Mutex<Vec<PublishedMessage>>>,
}

#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub topic: String,
    pub key: String,
    pub envelope: Envelope,
}

impl InMemoryEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn published(&self) -> Vec<PublishedMessage> {
        self.messages.lock().await.clone()
    }

    pub async fn published_to(&self, topic: &str) -> Vec<PublishedMessage> {
        self.messages
            .lock()
            .await
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    pub async fn count(&self) -> usize {
        self.messages.lock().await.len()
    }

    pub async fn clear(&self) {
        self.messages.lock().await.clear();
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        envelope: &Envelope,
    ) -> Result<(), PublishError> {
        self.messages.lock().await.push(PublishedMessage {
            topic: topic.to_string(),
            key: key.to_string(),
            envelope: envelope.clone(),
        });
        Ok(())
    }
}
