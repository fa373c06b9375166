use super::{coerce_bool, payload_user_id};
use crate::dispatch::{EventHandler, IdempotencyKey};
use crate::error::{HandlerError, HandlerOutcome};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;
use usersync_core::topics::events;
use usersync_datastore::UserStore;

/// Reacts to `institution.user.updated`: mirrors the institution
/// service's view of a user's onboarding state onto the local record.
///
/// The flag is set either because the event is the dedicated onboarding
/// signal or because the payload carries an explicit `has_onboarded`
/// value. Only the changed field is persisted. Setting the same value
/// twice leaves the record unchanged, so redelivery is harmless.
pub struct InstitutionUserHandler {
    store: Arc<dyn UserStore>,
}

impl InstitutionUserHandler {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EventHandler for InstitutionUserHandler {
    async fn handle(
        &self,
        payload: &Map<String, Value>,
        _key: &IdempotencyKey,
    ) -> Result<HandlerOutcome, HandlerError> {
        let Some(user_id) = payload_user_id(payload, "user_id") else {
            return Ok(HandlerOutcome::NoOp);
        };

        let user = self
            .store
            .get_user(user_id)
            .await
            .map_err(HandlerError::Recoverable)?;
        let Some(user) = user else {
            debug!(user_id = %user_id, "User not replicated yet, skipping");
            return Ok(HandlerOutcome::NoOp);
        };

        let event_name = payload.get("event_name").and_then(Value::as_str);
        if event_name == Some(events::USER_ONBOARDED) {
            self.store
                .set_onboarded(user.id, true)
                .await
                .map_err(HandlerError::Recoverable)?;
            return Ok(HandlerOutcome::Applied);
        }

        if let Some(flag) = payload.get("has_onboarded") {
            self.store
                .set_onboarded(user.id, coerce_bool(flag))
                .await
                .map_err(HandlerError::Recoverable)?;
            return Ok(HandlerOutcome::Applied);
        }

        Ok(HandlerOutcome::NoOp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use usersync_core::{Role, UserRecord};
    use usersync_datastore::InMemoryUserStore;
    use uuid::Uuid;

    fn test_user() -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            phone_number: None,
            role: Role::Other,
            is_active: true,
            has_onboarded: false,
            examiner_profile_id: None,
            created_at: Utc::now(),
            last_login: None,
        }
    }

    fn key() -> IdempotencyKey {
        IdempotencyKey::new("institution.user.updated", 0, 0)
    }

    #[tokio::test]
    async fn onboarding_signal_sets_flag_and_is_idempotent() {
        let store = InMemoryUserStore::new();
        let user = test_user();
        store.insert_user(user.clone()).await;
        let handler = InstitutionUserHandler::new(Arc::new(store.clone()));
        let payload = json!({
            "user_id": user.id.to_string(),
            "event_name": "user.onboarded",
        });
        let payload = payload.as_object().unwrap();

        let first = handler.handle(payload, &key()).await.unwrap();
        let second = handler.handle(payload, &key()).await.unwrap();

        assert_eq!(first, HandlerOutcome::Applied);
        assert_eq!(second, HandlerOutcome::Applied);
        assert!(store.user(user.id).await.unwrap().has_onboarded);
    }

    #[tokio::test]
    async fn explicit_flag_is_coerced() {
        let store = InMemoryUserStore::new();
        let user = test_user();
        store.insert_user(user.clone()).await;
        let handler = InstitutionUserHandler::new(Arc::new(store.clone()));
        let payload = json!({
            "user_id": user.id.to_string(),
            "event_name": "institution.user.updated",
            "has_onboarded": "yes",
        });

        let outcome = handler
            .handle(payload.as_object().unwrap(), &key())
            .await
            .unwrap();

        assert_eq!(outcome, HandlerOutcome::Applied);
        assert!(store.user(user.id).await.unwrap().has_onboarded);
    }

    #[tokio::test]
    async fn unknown_user_is_a_noop() {
        let store = InMemoryUserStore::new();
        let handler = InstitutionUserHandler::new(Arc::new(store));
        let payload = json!({
            "user_id": Uuid::new_v4().to_string(),
            "event_name": "user.onboarded",
        });

        let outcome = handler
            .handle(payload.as_object().unwrap(), &key())
            .await
            .unwrap();

        assert_eq!(outcome, HandlerOutcome::NoOp);
    }

    #[tokio::test]
    async fn missing_user_id_is_a_noop() {
        let store = InMemoryUserStore::new();
        let handler = InstitutionUserHandler::new(Arc::new(store));
        let payload = json!({"event_name": "user.onboarded"});

        let outcome = handler
            .handle(payload.as_object().unwrap(), &key())
            .await
            .unwrap();

        assert_eq!(outcome, HandlerOutcome::NoOp);
    }
}
