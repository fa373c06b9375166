//! Core primitives shared by the usersync producer and consumer crates:
//! domain records, the event envelope, and the topic catalog.

pub mod envelope;
pub mod topics;
pub mod types;

pub use envelope::{Envelope, EnvelopeError};
pub use types::{Role, RoleProjection, SubscriptionEvent, UserId, UserProfile, UserRecord};
