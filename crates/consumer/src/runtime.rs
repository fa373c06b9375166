use crate::dispatch::{HandlerRegistry, IdempotencyKey};
use crate::error::{HandlerError, HandlerOutcome};
use crate::metrics::ConsumerMetrics;
use crate::reader::{EventReader, ReceivedMessage};
use anyhow::Result;
use backon::{ExponentialBuilder, Retryable};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use usersync_datastore::UserStore;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// The consumer loop: poll, decode, dispatch, commit.
///
/// Offsets are committed synchronously per message and only after
/// dispatch has returned, so a crash mid-handling replays the message
/// instead of losing it. One message is dispatched at a time; scaling
/// happens by running more processes in the same consumer group.
pub struct ConsumerRuntime<R> {
    reader: R,
    registry: HandlerRegistry,
    store: Arc<dyn UserStore>,
    poll_interval: Duration,
    run_duration: Option<Duration>,
    metrics: ConsumerMetrics,
}

impl<R: EventReader> ConsumerRuntime<R> {
    pub fn new(reader: R, registry: HandlerRegistry, store: Arc<dyn UserStore>) -> Self {
        Self {
            reader,
            registry,
            store,
            poll_interval: DEFAULT_POLL_INTERVAL,
            run_duration: None,
            metrics: ConsumerMetrics::default(),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Bound the loop to a wall-clock budget instead of running until
    /// signaled. Used for batch draining and tests.
    pub fn with_run_duration(mut self, duration: Duration) -> Self {
        self.run_duration = Some(duration);
        self
    }

    /// Run until the shutdown flag flips or the run-duration budget is
    /// exhausted. The flag is checked once per iteration, so an
    /// in-flight message always finishes dispatch and commit first.
    pub async fn run(mut self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let deadline = self.run_duration.map(|d| Instant::now() + d);

        info!(topics = ?self.registry.topics(), "Starting consumer loop");

        loop {
            if *shutdown.borrow() {
                info!("Shutdown requested, draining consumer loop");
                break;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    info!("Run duration reached, stopping consumer loop");
                    break;
                }
            }

            let message = match self.reader.poll(self.poll_interval).await {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(e) => {
                    self.metrics.transport_error.increment(1);
                    error!(error = %e, "Error receiving message");
                    continue;
                }
            };

            self.metrics.event_received.increment(1);
            self.dispatch(&message).await;

            // Committed even when the handler failed or the payload was
            // garbage: neither can succeed on redelivery, and a stuck
            // offset would block every later event on the partition.
            match self.reader.commit(&message).await {
                Ok(()) => self.metrics.offset_committed.increment(1),
                Err(e) => error!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    error = %e,
                    "Failed to commit offset"
                ),
            }
        }

        info!("Consumer loop stopped");
        Ok(())
    }

    async fn dispatch(&self, message: &ReceivedMessage) {
        debug!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            key = ?message.key,
            "Received message"
        );

        let payload = decode_payload(message.payload.as_deref());
        let Some(payload) = payload else {
            self.metrics.decode_failure.increment(1);
            warn!(
                topic = %message.topic,
                partition = message.partition,
                offset = message.offset,
                raw = %String::from_utf8_lossy(message.payload.as_deref().unwrap_or_default()),
                "Skipping message without a decodable JSON object payload"
            );
            return;
        };

        let Some(handler) = self.registry.get(&message.topic) else {
            // Unsubscribed handlers are a configuration choice, not an error.
            return;
        };

        // Connections that idled out since the last poll cycle are
        // replaced before the handler touches the store.
        if let Err(e) = self.store.refresh().await {
            warn!(error = %e, "Datastore refresh failed before dispatch");
        }

        let key = IdempotencyKey::new(&message.topic, message.partition, message.offset);
        let handler = Arc::clone(handler);

        let attempt = || {
            let handler = Arc::clone(&handler);
            let payload = &payload;
            let key = &key;
            async move { handler.handle(payload, key).await }
        };

        let result = attempt
            .retry(
                &ExponentialBuilder::default()
                    .with_min_delay(Duration::from_millis(100))
                    .with_max_delay(Duration::from_secs(1))
                    .with_max_times(3),
            )
            .when(|err: &HandlerError| err.is_recoverable())
            .notify(|err: &HandlerError, dur: Duration| {
                warn!(
                    topic = %message.topic,
                    error = %err,
                    retry_in_ms = dur.as_millis(),
                    "Retrying handler after recoverable failure"
                );
            })
            .await;

        match result {
            Ok(HandlerOutcome::Applied) => {
                self.metrics.event_handled.increment(1);
                debug!(topic = %message.topic, key = %key, "Event handled");
            }
            Ok(HandlerOutcome::NoOp) => {
                self.metrics.event_noop.increment(1);
                debug!(topic = %message.topic, key = %key, "Event resolved to no-op");
            }
            Err(e) => {
                self.metrics.handler_failure.increment(1);
                let payload_value = Value::Object(payload.clone());
                error!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    payload = %payload_value,
                    error = %e,
                    "Handler failed; committing offset to keep the partition moving"
                );
            }
        }
    }
}

/// Decode a payload as a JSON object. Missing payloads and anything
/// that is not a non-empty object yield `None`; such a message can
/// never succeed on retry, so the caller logs it and moves on.
fn decode_payload(payload: Option<&[u8]>) -> Option<Map<String, Value>> {
    let bytes = payload?;
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) if !map.is_empty() => Some(map),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rejects_invalid_json() {
        assert!(decode_payload(Some(b"not json")).is_none());
        assert!(decode_payload(Some(b"[1, 2]")).is_none());
        assert!(decode_payload(Some(b"{}")).is_none());
        assert!(decode_payload(None).is_none());
    }

    #[test]
    fn decode_accepts_json_objects() {
        let map = decode_payload(Some(br#"{"user_id": "u1"}"#)).unwrap();
        assert_eq!(map["user_id"], "u1");
    }
}
