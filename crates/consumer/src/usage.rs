use crate::error::{HandlerError, HandlerOutcome};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use usersync_core::UserId;
use usersync_datastore::UserStore;

const DEFAULT_SEEN_CAPACITY: usize = 4096;

/// Usage-accounting collaborator: charges one exam session per unique
/// event so that redelivery never double-counts.
#[async_trait]
pub trait UsageAccounting: Send + Sync {
    async fn apply_exam_session(
        &self,
        user_id: UserId,
        idempotency_key: &str,
        payload: &Map<String, Value>,
    ) -> Result<HandlerOutcome, HandlerError>;
}

/// Bounded memory of already-applied dedup keys. Oldest keys are
/// evicted once capacity is reached; durable dedup past that horizon is
/// the store's unique constraint on the session key.
#[derive(Debug)]
struct SeenKeys {
    set: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl SeenKeys {
    fn new(capacity: usize) -> Self {
        Self {
            set: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn contains(&self, key: &str) -> bool {
        self.set.contains(key)
    }

    fn insert(&mut self, key: String) {
        if self.set.contains(&key) {
            return;
        }
        if self.order.len() == self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.set.remove(&evicted);
            }
        }
        self.set.insert(key.clone());
        self.order.push_back(key);
    }
}

/// Applies exam-session usage through the user store.
pub struct ExamUsageService {
    store: Arc<dyn UserStore>,
    seen: Mutex<SeenKeys>,
}

impl ExamUsageService {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self::with_capacity(store, DEFAULT_SEEN_CAPACITY)
    }

    pub fn with_capacity(store: Arc<dyn UserStore>, capacity: usize) -> Self {
        Self {
            store,
            seen: Mutex::new(SeenKeys::new(capacity)),
        }
    }
}

#[async_trait]
impl UsageAccounting for ExamUsageService {
    async fn apply_exam_session(
        &self,
        user_id: UserId,
        idempotency_key: &str,
        _payload: &Map<String, Value>,
    ) -> Result<HandlerOutcome, HandlerError> {
        if self.seen.lock().await.contains(idempotency_key) {
            debug!(
                user_id = %user_id,
                idempotency_key = %idempotency_key,
                "Session already counted, skipping"
            );
            return Ok(HandlerOutcome::NoOp);
        }

        self.store
            .record_exam_session(user_id, idempotency_key)
            .await
            .map_err(HandlerError::Recoverable)?;

        // Marked only after the store accepted the session, so a failed
        // write stays retryable.
        self.seen.lock().await.insert(idempotency_key.to_string());
        Ok(HandlerOutcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use usersync_datastore::InMemoryUserStore;
    use uuid::Uuid;

    #[tokio::test]
    async fn duplicate_keys_count_once() {
        let store = InMemoryUserStore::new();
        let service = ExamUsageService::new(Arc::new(store.clone()));
        let user_id = Uuid::new_v4();
        let payload = Map::new();

        let first = service
            .apply_exam_session(user_id, "session-1", &payload)
            .await
            .unwrap();
        let second = service
            .apply_exam_session(user_id, "session-1", &payload)
            .await
            .unwrap();

        assert_eq!(first, HandlerOutcome::Applied);
        assert_eq!(second, HandlerOutcome::NoOp);
        assert_eq!(store.session_count(user_id).await, 1);
    }

    #[tokio::test]
    async fn eviction_falls_back_to_store_level_dedup() {
        let store = InMemoryUserStore::new();
        let service = ExamUsageService::with_capacity(Arc::new(store.clone()), 2);
        let user_id = Uuid::new_v4();
        let payload = Map::new();

        for key in ["a", "b", "c", "a"] {
            service
                .apply_exam_session(user_id, key, &payload)
                .await
                .unwrap();
        }

        // "a" was evicted from the in-memory window, but the store's
        // unique session key kept the count stable.
        assert_eq!(store.session_count(user_id).await, 3);
    }

    #[test]
    fn seen_keys_evicts_oldest_first() {
        let mut seen = SeenKeys::new(2);
        seen.insert("a".to_string());
        seen.insert("b".to_string());
        seen.insert("c".to_string());

        assert!(!seen.contains("a"));
        assert!(seen.contains("b"));
        assert!(seen.contains("c"));
    }
}
