use metrics::Counter;
use metrics_derive::Metrics;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Metrics for the `usersync_consumer` loop.
#[derive(Metrics, Clone)]
#[metrics(scope = "usersync_consumer")]
pub struct ConsumerMetrics {
    #[metric(describe = "Number of messages received from Kafka")]
    pub event_received: Counter,

    #[metric(describe = "Number of messages applied by a handler")]
    pub event_handled: Counter,

    #[metric(describe = "Number of messages that resolved to a no-op")]
    pub event_noop: Counter,

    #[metric(describe = "Number of messages whose payload failed to decode")]
    pub decode_failure: Counter,

    #[metric(describe = "Number of handler failures after retries")]
    pub handler_failure: Counter,

    #[metric(describe = "Number of transport errors while polling")]
    pub transport_error: Counter,

    #[metric(describe = "Number of offsets committed")]
    pub offset_committed: Counter,
}

/// Initialize Prometheus metrics exporter
pub fn init_prometheus_exporter(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
}
