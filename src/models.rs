use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Application credentials issued by Strava, passed in by the caller.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Payload for `POST /push_subscriptions`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SubscriptionRequest {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
    pub verify_token: String,
}

impl SubscriptionRequest {
    pub fn new(credentials: &Credentials, callback_url: &str, verify_token: &str) -> Self {
        Self {
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            callback_url: callback_url.to_string(),
            verify_token: verify_token.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriptionState {
    Unsubscribed,
    PendingVerification,
    Active,
    Failed,
}

/// A push subscription as the provider reports it. `id` is assigned by the
/// provider and absent until creation succeeds.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Subscription {
    pub id: Option<i64>,
    pub callback_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Query parameters of the provider's verification GET against the callback
/// endpoint. Lives only for the duration of one inbound call.
#[derive(Clone, Debug)]
pub struct ChallengeRequest {
    pub mode: String,
    pub challenge: String,
    pub verify_token: String,
}

/// Echo body for a successful handshake: `{"hub.challenge":"..."}`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChallengeResponse {
    #[serde(rename = "hub.challenge")]
    pub challenge: String,
}
