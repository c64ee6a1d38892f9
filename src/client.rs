use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::{
    error::Error,
    models::{Credentials, Subscription, SubscriptionRequest},
};

/// Client for the provider's push-subscription API. The HTTP client is
/// injected at construction so tests can point it at a local mock server;
/// there is no shared global instance.
#[derive(Clone, Debug)]
pub struct SubscriptionClient {
    http: Client,
    base_url: String,
}

impl SubscriptionClient {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetch all subscriptions registered for these credentials, sorted by
    /// provider-assigned id ascending.
    pub async fn list(&self, credentials: &Credentials) -> Result<Vec<Subscription>, Error> {
        let url = format!("{}/push_subscriptions", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(Error::Transport)?;

        let body = Self::check_status(response).await?;
        let mut subscriptions: Vec<Subscription> =
            serde_json::from_slice(&body).map_err(Error::Decode)?;
        subscriptions.sort_by_key(|sub| sub.id);
        debug!(count = subscriptions.len(), "listed subscriptions");
        Ok(subscriptions)
    }

    /// Register a new subscription. The provider will verify the callback
    /// URL out-of-band before the subscription becomes active.
    pub async fn create(&self, request: &SubscriptionRequest) -> Result<Subscription, Error> {
        let url = format!("{}/push_subscriptions", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(Error::Transport)?;

        if response.status() == StatusCode::CONFLICT {
            return Err(Error::Conflict);
        }
        let body = Self::check_status(response).await?;
        serde_json::from_slice(&body).map_err(Error::Decode)
    }

    /// Remove a subscription. Deleting an id the provider no longer knows
    /// about is treated as success.
    pub async fn delete(&self, credentials: &Credentials, id: i64) -> Result<(), Error> {
        let url = format!("{}/push_subscriptions/{id}", self.base_url);
        let response = self
            .http
            .delete(&url)
            .query(&[
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(Error::Transport)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::check_status(response).await?;
        Ok(())
    }

    async fn check_status(response: reqwest::Response) -> Result<Vec<u8>, Error> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::Auth(status.as_u16()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Provider {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response.bytes().await.map_err(Error::Transport)?;
        Ok(bytes.to_vec())
    }
}
