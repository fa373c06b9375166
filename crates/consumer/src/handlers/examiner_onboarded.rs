use super::payload_user_id;
use crate::dispatch::{EventHandler, IdempotencyKey};
use crate::error::{HandlerError, HandlerOutcome};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;
use usersync_core::topics::events;
use usersync_core::Role;
use usersync_datastore::UserStore;

/// Reacts to `examiner_onboarded`: marks the examiner as onboarded and
/// stores the external profile reference when one is supplied.
///
/// The event name and role must both match exactly; anything else is a
/// silent no-op, since this topic also carries events for audiences
/// this service does not own.
pub struct ExaminerOnboardedHandler {
    store: Arc<dyn UserStore>,
}

impl ExaminerOnboardedHandler {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EventHandler for ExaminerOnboardedHandler {
    async fn handle(
        &self,
        payload: &Map<String, Value>,
        _key: &IdempotencyKey,
    ) -> Result<HandlerOutcome, HandlerError> {
        if payload.get("event_name").and_then(Value::as_str) != Some(events::USER_ONBOARDED) {
            return Ok(HandlerOutcome::NoOp);
        }
        let role = payload
            .get("role")
            .and_then(Value::as_str)
            .map(Role::parse);
        if role != Some(Role::Examiner) {
            return Ok(HandlerOutcome::NoOp);
        }

        let Some(user_id) = payload_user_id(payload, "user_id") else {
            return Ok(HandlerOutcome::NoOp);
        };
        let user = self
            .store
            .get_user(user_id)
            .await
            .map_err(HandlerError::Recoverable)?;
        let Some(user) = user else {
            debug!(user_id = %user_id, "Examiner not replicated yet, skipping");
            return Ok(HandlerOutcome::NoOp);
        };

        self.store
            .set_onboarded(user.id, true)
            .await
            .map_err(HandlerError::Recoverable)?;

        if let Some(profile_ref) = payload.get("examiner_profile_id").and_then(Value::as_str) {
            self.store
                .set_examiner_profile(user.id, profile_ref)
                .await
                .map_err(HandlerError::Recoverable)?;
        }

        Ok(HandlerOutcome::Applied)
    }
}
