use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;

/// User role as carried on the wire. Unknown roles collapse to `Other`
/// so that new roles introduced by other services never fail decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Examiner,
    Candidate,
    #[serde(other)]
    Other,
}

impl Role {
    /// Label used both as the role-specific event prefix
    /// (`examiner.created`) and the nested projection key. Total over the
    /// enum: roles without a dedicated audience emit no extra events.
    pub const fn fanout_label(self) -> Option<&'static str> {
        match self {
            Self::Examiner => Some("examiner"),
            Self::Candidate => Some("candidate"),
            Self::Other => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Examiner => "examiner",
            Self::Candidate => "candidate",
            Self::Other => "other",
        }
    }

    /// Parse a stored role string; anything unrecognized is `Other`.
    pub fn parse(value: &str) -> Self {
        match value {
            "examiner" => Self::Examiner,
            "candidate" => Self::Candidate,
            _ => Self::Other,
        }
    }
}

/// Snapshot of a user as seen by the domain layer at mutation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub has_onboarded: bool,
    pub examiner_profile_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl UserRecord {
    /// Display name: composed first + last name, falling back to email.
    pub fn full_name(&self) -> String {
        let composed = format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string();
        if composed.is_empty() {
            self.email.clone()
        } else {
            composed
        }
    }
}

/// Profile attached to a user; only the fields the event layer projects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub profile_picture_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// A recorded subscription lifecycle change, published verbatim as
/// `subscription.<event_type>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionEvent {
    pub event_type: String,
    pub subscription_id: Uuid,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

/// Role-specific projection nested under the `examiner`/`candidate` key
/// of fan-out events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleProjection {
    pub user_id: String,
    pub email: String,
    pub full_name: String,
    pub profile_pic_url: String,
    pub role: Role,
    pub is_active: bool,
}

impl RoleProjection {
    pub fn from_user(user: &UserRecord, profile: Option<&UserProfile>) -> Self {
        let profile_pic_url = profile
            .and_then(|p| p.profile_picture_url.clone())
            .unwrap_or_default();

        Self {
            user_id: user.id.to_string(),
            email: user.email.clone(),
            full_name: user.full_name(),
            profile_pic_url,
            role: user.role,
            is_active: user.is_active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: &str, last: &str, email: &str) -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            email: email.to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            phone_number: None,
            role: Role::Examiner,
            is_active: true,
            has_onboarded: false,
            examiner_profile_id: None,
            created_at: Utc::now(),
            last_login: None,
        }
    }

    #[test]
    fn full_name_composes_first_and_last() {
        assert_eq!(user("Ada", "Lovelace", "a@x.com").full_name(), "Ada Lovelace");
    }

    #[test]
    fn full_name_falls_back_to_email_when_names_empty() {
        assert_eq!(user("", "", "a@x.com").full_name(), "a@x.com");
        assert_eq!(user("Ada", "", "a@x.com").full_name(), "Ada");
    }

    #[test]
    fn unknown_role_decodes_to_other() {
        let role: Role = serde_json::from_str("\"institution_admin\"").unwrap();
        assert_eq!(role, Role::Other);
        assert_eq!(role.fanout_label(), None);
    }

    #[test]
    fn known_roles_round_trip() {
        for (role, s) in [(Role::Examiner, "\"examiner\""), (Role::Candidate, "\"candidate\"")] {
            assert_eq!(serde_json::to_string(&role).unwrap(), s);
            assert_eq!(serde_json::from_str::<Role>(s).unwrap(), role);
        }
    }

    #[test]
    fn projection_defaults_picture_to_empty() {
        let u = user("Ada", "Lovelace", "a@x.com");
        let p = RoleProjection::from_user(&u, None);
        assert_eq!(p.profile_pic_url, "");
        assert_eq!(p.user_id, u.id.to_string());
    }
}
