use metrics::Counter;
use metrics_derive::Metrics;

/// Metrics for the `usersync_events` producer side.
#[derive(Metrics, Clone)]
#[metrics(scope = "usersync_events")]
pub struct ProducerMetrics {
    #[metric(describe = "Number of envelopes enqueued to the Kafka producer")]
    pub event_enqueued: Counter,

    #[metric(describe = "Number of envelopes confirmed delivered by the broker")]
    pub event_delivered: Counter,

    #[metric(describe = "Number of messages the local client refused to enqueue")]
    pub enqueue_error: Counter,

    #[metric(describe = "Number of delivery failures reported asynchronously")]
    pub delivery_failure: Counter,
}
