//! Domain event builders: pure translation from an entity mutation to
//! one or more envelopes, published with the subject id as the
//! partition key. The only side effect is the final publish; the
//! domain entity is never mutated.
//!
//! Callers invoke these from the mutation code path itself; there is
//! no implicit observer hook announcing saves behind the scenes.

use crate::error::PublishError;
use crate::publisher::EventPublisher;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;
use usersync_core::envelope::EnvelopeError;
use usersync_core::topics::{self, events};
use usersync_core::types::RoleProjection;
use usersync_core::{Envelope, SubscriptionEvent, UserProfile, UserRecord};

/// Builders for `user.*`, `examiner.*`, and `candidate.*` events on the
/// user-domain topic.
pub struct UserEventProducer<P> {
    publisher: P,
}

#[derive(Serialize)]
struct UserCreatedFields<'a> {
    user_id: String,
    email: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    date_joined: DateTime<Utc>,
    role: &'static str,
}

#[derive(Serialize)]
struct UserUpdatedFields<'a> {
    user_id: String,
    updated_fields: &'a [&'a str],
    user_data: Map<String, Value>,
    role: &'static str,
}

impl<P: EventPublisher> UserEventProducer<P> {
    pub fn new(publisher: P) -> Self {
        Self { publisher }
    }

    /// Emit `user.created`, plus `examiner.created`/`candidate.created`
    /// when the role has a dedicated audience. All envelopes are keyed
    /// by the user id, so consumers observe them in publish order.
    pub async fn user_created(&self, user: &UserRecord) -> Result<(), PublishError> {
        let base = Envelope::new(events::USER_CREATED, user.created_at).with_payload(
            &UserCreatedFields {
                user_id: user.id.to_string(),
                email: &user.email,
                first_name: &user.first_name,
                last_name: &user.last_name,
                date_joined: user.created_at,
                role: user.role.as_str(),
            },
        )?;

        let key = user.id.to_string();
        self.publisher
            .publish(topics::USER_EVENTS, &key, &base)
            .await?;
        self.role_fanout(&base, user, None, "created", &key).await
    }

    /// Emit `user.updated` carrying the changed field names and their
    /// projected values, plus the role-specific variant.
    pub async fn user_updated(
        &self,
        user: &UserRecord,
        changed_fields: &[&str],
    ) -> Result<(), PublishError> {
        let mut user_data = Map::new();
        for field in changed_fields {
            if let Some(value) = project_field(user, field) {
                user_data.insert((*field).to_string(), value);
            }
        }

        let timestamp = user.last_login.unwrap_or(user.created_at);
        let base = Envelope::new(events::USER_UPDATED, timestamp).with_payload(
            &UserUpdatedFields {
                user_id: user.id.to_string(),
                updated_fields: changed_fields,
                user_data,
                role: user.role.as_str(),
            },
        )?;

        let key = user.id.to_string();
        self.publisher
            .publish(topics::USER_EVENTS, &key, &base)
            .await?;
        self.role_fanout(&base, user, None, "updated", &key).await
    }

    /// Emit `user.deleted`. Only the subject id travels; there is no
    /// deleted-at field on the record, so the creation time stands in
    /// as the source-change timestamp.
    pub async fn user_deleted(&self, user: &UserRecord) -> Result<(), PublishError> {
        let envelope = Envelope::new(events::USER_DELETED, user.created_at)
            .with_field("user_id", Value::String(user.id.to_string()));

        self.publisher
            .publish(topics::USER_EVENTS, &user.id.to_string(), &envelope)
            .await
    }

    /// Emit the role-specific profile-update event, gated on the
    /// profile owner's role: an examiner profile change never produces
    /// a candidate event, and vice versa. Other roles emit nothing.
    pub async fn profile_updated(
        &self,
        user: &UserRecord,
        profile: &UserProfile,
    ) -> Result<(), PublishError> {
        let Some(label) = user.role.fanout_label() else {
            return Ok(());
        };

        let projection = RoleProjection::from_user(user, Some(profile));
        let envelope = Envelope::new(
            format!("{label}.{}", events::PROFILE_UPDATED_SUFFIX),
            profile.updated_at,
        )
        .with_field("user_id", Value::String(user.id.to_string()))
        .with_field(label, to_projection_value(label, &projection)?);

        self.publisher
            .publish(topics::USER_EVENTS, &user.id.to_string(), &envelope)
            .await
    }

    /// Publish the role-specific companion of a base lifecycle event:
    /// same fields, a fresh event id, the role-prefixed name, and the
    /// nested projection.
    async fn role_fanout(
        &self,
        base: &Envelope,
        user: &UserRecord,
        profile: Option<&UserProfile>,
        action: &str,
        key: &str,
    ) -> Result<(), PublishError> {
        let Some(label) = user.role.fanout_label() else {
            return Ok(());
        };

        let projection = RoleProjection::from_user(user, profile);
        let mut envelope = base.clone();
        envelope.event_id = Uuid::new_v4();
        envelope.event_name = format!("{label}.{action}");
        envelope
            .data
            .insert(label.to_string(), to_projection_value(label, &projection)?);

        self.publisher
            .publish(topics::USER_EVENTS, key, &envelope)
            .await
    }
}

/// Builder for `subscription.<event_type>` events on the
/// subscription-domain topic, keyed by the owning user.
pub struct SubscriptionEventProducer<P> {
    publisher: P,
}

#[derive(Serialize)]
struct SubscriptionFields<'a> {
    subscription_id: String,
    user_id: String,
    payload: &'a Value,
}

impl<P: EventPublisher> SubscriptionEventProducer<P> {
    pub fn new(publisher: P) -> Self {
        Self { publisher }
    }

    pub async fn subscription_event(&self, event: &SubscriptionEvent) -> Result<(), PublishError> {
        let envelope = Envelope::new(
            format!("subscription.{}", event.event_type),
            event.created_at,
        )
        .with_payload(&SubscriptionFields {
            subscription_id: event.subscription_id.to_string(),
            user_id: event.user_id.to_string(),
            payload: &event.payload,
        })?;

        self.publisher
            .publish(
                topics::SUBSCRIPTION_EVENTS,
                &event.user_id.to_string(),
                &envelope,
            )
            .await
    }
}

fn to_projection_value(label: &str, projection: &RoleProjection) -> Result<Value, PublishError> {
    serde_json::to_value(projection)
        .map_err(|source| EnvelopeError::Serialize {
            event_name: label.to_string(),
            source,
        })
        .map_err(PublishError::from)
}

/// Project a changed field of the record into its wire value. Fields
/// outside the known set are skipped rather than invented.
fn project_field(user: &UserRecord, field: &str) -> Option<Value> {
    let value = match field {
        "email" => Value::String(user.email.clone()),
        "first_name" => Value::String(user.first_name.clone()),
        "last_name" => Value::String(user.last_name.clone()),
        "phone_number" => user
            .phone_number
            .clone()
            .map_or(Value::Null, Value::String),
        "role" => Value::String(user.role.as_str().to_string()),
        "is_active" => Value::Bool(user.is_active),
        "has_onboarded" => Value::Bool(user.has_onboarded),
        "examiner_profile_id" => user
            .examiner_profile_id
            .clone()
            .map_or(Value::Null, Value::String),
        _ => return None,
    };
    Some(value)
}
