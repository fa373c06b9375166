//! Fixed topic names and event tags. Every message is keyed by the
//! subject's identifier, so all events for one subject stay ordered
//! within a partition.

/// Outbound topic carrying all user, examiner, candidate, and profile
/// lifecycle events.
pub const USER_EVENTS: &str = "user_events";

/// Outbound topic carrying `subscription.<event_type>` events.
pub const SUBSCRIPTION_EVENTS: &str = "subscription_events";

/// Inbound: user changes announced by the institution service.
pub const INSTITUTION_USER_UPDATED: &str = "institution.user.updated";

/// Inbound: conversation/session starts announced by the AI service.
pub const CONVERSATION_STARTED: &str = "conversation.started";

/// Inbound: examiner onboarding completion.
pub const EXAMINER_ONBOARDED: &str = "examiner_onboarded";

/// Default inbound subscription set for the consumer.
pub const DEFAULT_INBOUND: [&str; 3] = [
    INSTITUTION_USER_UPDATED,
    CONVERSATION_STARTED,
    EXAMINER_ONBOARDED,
];

pub mod events {
    pub const USER_CREATED: &str = "user.created";
    pub const USER_UPDATED: &str = "user.updated";
    pub const USER_DELETED: &str = "user.deleted";
    pub const PROFILE_UPDATED_SUFFIX: &str = "profile.updated";

    /// Onboarding signal recognized by the institution-user and
    /// examiner-onboarded handlers.
    pub const USER_ONBOARDED: &str = "user.onboarded";
}
