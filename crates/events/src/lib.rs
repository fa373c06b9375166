//! Producer side of the usersync event layer: a process-wide Kafka
//! publishing handle with idempotent-delivery configuration, and the
//! domain event builders that turn entity mutations into envelopes.

pub mod error;
pub mod metrics;
pub mod producers;
pub mod publisher;

pub use error::PublishError;
pub use producers::{SubscriptionEventProducer, UserEventProducer};
pub use publisher::{EventPublisher, InMemoryEventPublisher, KafkaEventPublisher};
