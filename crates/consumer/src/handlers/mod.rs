//! Per-topic business reactions. Every handler is safe to invoke more
//! than once with the same payload, and treats a missing subject as an
//! expected replication race rather than an error.

mod conversation_started;
mod examiner_onboarded;
mod institution_user;

pub use conversation_started::ConversationStartedHandler;
pub use examiner_onboarded::ExaminerOnboardedHandler;
pub use institution_user::InstitutionUserHandler;

use serde_json::{Map, Value};
use usersync_core::UserId;
use uuid::Uuid;

/// Extract and parse the subject user id from a payload field.
fn payload_user_id(payload: &Map<String, Value>, field: &str) -> Option<UserId> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
}

/// Accept the loose boolean encodings other services put on the wire:
/// JSON booleans, "1"/"true"/"yes" strings, and the integer 1.
fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => {
            matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
        }
        Value::Number(n) => n.as_i64() == Some(1),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerce_bool_accepts_wire_encodings() {
        assert!(coerce_bool(&json!(true)));
        assert!(coerce_bool(&json!("TRUE")));
        assert!(coerce_bool(&json!(" yes ")));
        assert!(coerce_bool(&json!("1")));
        assert!(coerce_bool(&json!(1)));

        assert!(!coerce_bool(&json!(false)));
        assert!(!coerce_bool(&json!("no")));
        assert!(!coerce_bool(&json!(0)));
        assert!(!coerce_bool(&json!(null)));
        assert!(!coerce_bool(&json!({"nested": true})));
    }

    #[test]
    fn payload_user_id_requires_a_valid_uuid() {
        let id = Uuid::new_v4();
        let payload = json!({"user_id": id.to_string()});
        assert_eq!(
            payload_user_id(payload.as_object().unwrap(), "user_id"),
            Some(id)
        );

        let bad = json!({"user_id": "not-a-uuid"});
        assert_eq!(payload_user_id(bad.as_object().unwrap(), "user_id"), None);
    }
}
