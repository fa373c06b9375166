use anyhow::Result;
use usersync_core::{UserId, UserRecord};

/// Interface the idempotent handlers use to read and update users.
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    /// Fetch a user by id. `None` is an expected outcome: the entity
    /// may not have replicated yet.
    async fn get_user(&self, id: UserId) -> Result<Option<UserRecord>>;

    /// Persist only the onboarding flag.
    async fn set_onboarded(&self, id: UserId, onboarded: bool) -> Result<()>;

    /// Persist only the external examiner profile reference.
    async fn set_examiner_profile(&self, id: UserId, profile_ref: &str) -> Result<()>;

    /// Record one exam session for usage accounting. Recording the same
    /// session key twice must not create a second row.
    async fn record_exam_session(&self, user_id: UserId, session_key: &str) -> Result<()>;

    /// Validate connection liveness before a handler runs, discarding
    /// connections that idled out between poll cycles.
    async fn refresh(&self) -> Result<()>;
}
