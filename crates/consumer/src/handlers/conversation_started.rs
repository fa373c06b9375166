use super::payload_user_id;
use crate::dispatch::{EventHandler, IdempotencyKey};
use crate::error::{HandlerError, HandlerOutcome};
use crate::usage::UsageAccounting;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Reacts to `conversation.started` from the AI service by charging one
/// exam session against the user's usage.
///
/// The dedup key prefers identifiers carried in the payload
/// (`session_id`, then `event_id`) over the transport position, so a
/// full topic replay from offset zero still cannot double-count a
/// session the payload identifies stably.
pub struct ConversationStartedHandler {
    usage: Arc<dyn UsageAccounting>,
}

impl ConversationStartedHandler {
    pub fn new(usage: Arc<dyn UsageAccounting>) -> Self {
        Self { usage }
    }
}

#[async_trait]
impl EventHandler for ConversationStartedHandler {
    async fn handle(
        &self,
        payload: &Map<String, Value>,
        key: &IdempotencyKey,
    ) -> Result<HandlerOutcome, HandlerError> {
        // Producers disagree on the key spelling.
        let user_id = payload_user_id(payload, "user_id")
            .or_else(|| payload_user_id(payload, "userId"));
        let Some(user_id) = user_id else {
            return Ok(HandlerOutcome::NoOp);
        };

        let dedup_key = payload
            .get("session_id")
            .or_else(|| payload.get("event_id"))
            .and_then(Value::as_str)
            .map_or_else(|| key.to_string(), str::to_string);

        self.usage
            .apply_exam_session(user_id, &dedup_key, payload)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::ExamUsageService;
    use serde_json::json;
    use usersync_datastore::InMemoryUserStore;
    use uuid::Uuid;

    fn handler_with_store() -> (ConversationStartedHandler, InMemoryUserStore) {
        let store = InMemoryUserStore::new();
        let usage = ExamUsageService::new(Arc::new(store.clone()));
        (ConversationStartedHandler::new(Arc::new(usage)), store)
    }

    #[tokio::test]
    async fn redelivered_session_counts_once() {
        let (handler, store) = handler_with_store();
        let user_id = Uuid::new_v4();
        let payload = json!({
            "user_id": user_id.to_string(),
            "session_id": "sess-1",
        });
        let payload = payload.as_object().unwrap();

        // Redelivery arrives at a different offset but carries the same
        // payload key.
        let first = handler
            .handle(payload, &IdempotencyKey::new("conversation.started", 0, 7))
            .await
            .unwrap();
        let second = handler
            .handle(payload, &IdempotencyKey::new("conversation.started", 0, 8))
            .await
            .unwrap();

        assert_eq!(first, HandlerOutcome::Applied);
        assert_eq!(second, HandlerOutcome::NoOp);
        assert_eq!(store.session_count(user_id).await, 1);
    }

    #[tokio::test]
    async fn accepts_camel_case_user_id() {
        let (handler, store) = handler_with_store();
        let user_id = Uuid::new_v4();
        let payload = json!({
            "userId": user_id.to_string(),
            "event_id": "evt-1",
        });

        let outcome = handler
            .handle(
                payload.as_object().unwrap(),
                &IdempotencyKey::new("conversation.started", 0, 0),
            )
            .await
            .unwrap();

        assert_eq!(outcome, HandlerOutcome::Applied);
        assert_eq!(store.session_count(user_id).await, 1);
    }

    #[tokio::test]
    async fn missing_user_id_is_a_noop() {
        let (handler, store) = handler_with_store();
        let payload = json!({"session_id": "sess-1"});

        let outcome = handler
            .handle(
                payload.as_object().unwrap(),
                &IdempotencyKey::new("conversation.started", 0, 0),
            )
            .await
            .unwrap();

        assert_eq!(outcome, HandlerOutcome::NoOp);
        assert_eq!(store.session_count(Uuid::new_v4()).await, 0);
    }

    #[tokio::test]
    async fn transport_key_is_the_fallback_dedup_key() {
        let (handler, store) = handler_with_store();
        let user_id = Uuid::new_v4();
        let payload = json!({"user_id": user_id.to_string()});
        let payload = payload.as_object().unwrap();
        let key = IdempotencyKey::new("conversation.started", 1, 5);

        handler.handle(payload, &key).await.unwrap();
        handler.handle(payload, &key).await.unwrap();

        assert_eq!(store.session_count(user_id).await, 1);
    }
}
