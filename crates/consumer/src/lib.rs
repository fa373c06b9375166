//! Consumer side of the usersync event layer: a polling loop that
//! subscribes to cross-service topics, dispatches decoded messages to
//! idempotent handlers, and commits offsets only after handling.

pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod reader;
pub mod runtime;
pub mod usage;

pub use dispatch::{EventHandler, HandlerRegistry, IdempotencyKey};
pub use error::{HandlerError, HandlerOutcome};
pub use reader::{EventReader, KafkaEventReader, ReceivedMessage, ScriptedEventReader};
pub use runtime::ConsumerRuntime;
pub use usage::{ExamUsageService, UsageAccounting};
