use crate::traits::UserStore;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use usersync_core::{UserId, UserRecord};

/// In-memory `UserStore` for tests: a map behind a mutex, with helpers
/// to seed users and inspect recorded sessions.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserStore {
    users: Arc<Mutex<HashMap<UserId, UserRecord>>>,
    sessions: Arc<Mutex<Vec<(UserId, String)>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: UserRecord) {
        self.users.lock().await.insert(user.id, user);
    }

    pub async fn user(&self, id: UserId) -> Option<UserRecord> {
        self.users.lock().await.get(&id).cloned()
    }

    pub async fn session_count(&self, user_id: UserId) -> usize {
        self.sessions
            .lock()
            .await
            .iter()
            .filter(|(id, _)| *id == user_id)
            .count()
    }
}

#[async_trait::async_trait]
impl UserStore for InMemoryUserStore {
    async fn get_user(&self, id: UserId) -> Result<Option<UserRecord>> {
        Ok(self.users.lock().await.get(&id).cloned())
    }

    async fn set_onboarded(&self, id: UserId, onboarded: bool) -> Result<()> {
        if let Some(user) = self.users.lock().await.get_mut(&id) {
            user.has_onboarded = onboarded;
        }
        Ok(())
    }

    async fn set_examiner_profile(&self, id: UserId, profile_ref: &str) -> Result<()> {
        if let Some(user) = self.users.lock().await.get_mut(&id) {
            user.examiner_profile_id = Some(profile_ref.to_string());
        }
        Ok(())
    }

    async fn record_exam_session(&self, user_id: UserId, session_key: &str) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        // Mirror the Postgres unique constraint on session_key.
        if !sessions.iter().any(|(_, key)| key == session_key) {
            sessions.push((user_id, session_key.to_string()));
        }
        Ok(())
    }

    async fn refresh(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use usersync_core::Role;
    use uuid::Uuid;

    fn seed_user() -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            phone_number: None,
            role: Role::Examiner,
            is_active: true,
            has_onboarded: false,
            examiner_profile_id: None,
            created_at: Utc::now(),
            last_login: None,
        }
    }

    #[tokio::test]
    async fn set_onboarded_updates_only_that_field() {
        let store = InMemoryUserStore::new();
        let user = seed_user();
        store.insert_user(user.clone()).await;

        store.set_onboarded(user.id, true).await.unwrap();

        let stored = store.user(user.id).await.unwrap();
        assert!(stored.has_onboarded);
        assert_eq!(stored.email, user.email);
        assert_eq!(stored.examiner_profile_id, None);
    }

    #[tokio::test]
    async fn duplicate_session_keys_are_recorded_once() {
        let store = InMemoryUserStore::new();
        let user = seed_user();
        store.insert_user(user.clone()).await;

        store.record_exam_session(user.id, "s1").await.unwrap();
        store.record_exam_session(user.id, "s1").await.unwrap();
        store.record_exam_session(user.id, "s2").await.unwrap();

        assert_eq!(store.session_count(user.id).await, 2);
    }

    #[tokio::test]
    async fn missing_user_reads_back_as_none() {
        let store = InMemoryUserStore::new();
        assert!(store.get_user(Uuid::new_v4()).await.unwrap().is_none());
    }
}
