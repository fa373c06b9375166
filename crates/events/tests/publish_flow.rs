use chrono::Utc;
use serde_json::Value;
use std::collections::HashSet;
use usersync_core::{topics, Role, UserRecord};
use usersync_events::{InMemoryEventPublisher, UserEventProducer};
use uuid::Uuid;

fn new_user(email: &str, role: Role) -> UserRecord {
    UserRecord {
        id: Uuid::new_v4(),
        email: email.to_string(),
        first_name: String::new(),
        last_name: String::new(),
        phone_number: None,
        role,
        is_active: true,
        has_onboarded: false,
        examiner_profile_id: None,
        created_at: Utc::now(),
        last_login: None,
    }
}

#[tokio::test]
async fn examiner_registration_publishes_created_pair() {
    let publisher = InMemoryEventPublisher::new();
    let producer = UserEventProducer::new(publisher.clone());

    let user = new_user("a@x.com", Role::Examiner);
    producer.user_created(&user).await.unwrap();

    let published = publisher.published_to(topics::USER_EVENTS).await;
    let names: Vec<&str> = published
        .iter()
        .map(|m| m.envelope.event_name.as_str())
        .collect();
    assert_eq!(names, ["user.created", "examiner.created"]);

    for message in &published {
        assert_eq!(message.key, user.id.to_string());
        assert_eq!(
            message.envelope.data["user_id"],
            Value::String(user.id.to_string())
        );
    }
}

#[tokio::test]
async fn every_published_envelope_gets_a_distinct_event_id() {
    let publisher = InMemoryEventPublisher::new();
    let producer = UserEventProducer::new(publisher.clone());

    for i in 0..5 {
        let user = new_user(&format!("user{i}@x.com"), Role::Candidate);
        producer.user_created(&user).await.unwrap();
        producer.user_updated(&user, &["email"]).await.unwrap();
        producer.user_deleted(&user).await.unwrap();
    }

    let published = publisher.published().await;
    assert_eq!(published.len(), 5 * 5);

    let ids: HashSet<Uuid> = published.iter().map(|m| m.envelope.event_id).collect();
    assert_eq!(ids.len(), published.len(), "event ids must never repeat");

    for message in &published {
        assert!(!message.envelope.event_name.is_empty());
        assert!(message.envelope.data.contains_key("user_id"));
    }
}

#[tokio::test]
async fn wire_format_is_a_flat_json_object() {
    let publisher = InMemoryEventPublisher::new();
    let producer = UserEventProducer::new(publisher.clone());
    let user = new_user("a@x.com", Role::Examiner);

    producer.user_created(&user).await.unwrap();

    let published = publisher.published().await;
    let wire = serde_json::to_value(&published[0].envelope).unwrap();
    let object = wire.as_object().unwrap();

    assert!(object.contains_key("event_id"));
    assert!(object.contains_key("event_name"));
    assert!(object.contains_key("event_timestamp"));
    assert!(object.contains_key("user_id"));
    assert!(object.contains_key("email"));
}
