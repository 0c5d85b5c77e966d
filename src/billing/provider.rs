//! Billing provider API abstraction.
//!
//! The dispatcher needs exactly one provider call: resolving the
//! subscription a completed checkout created. That call goes through the
//! [`BillingApi`] trait so tests can substitute a canned implementation.

use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use crate::billing::events::SubscriptionObject;

/// Result type for provider API operations
pub type Result<T> = std::result::Result<T, BillingApiError>;

/// Errors from the billing provider's API
#[derive(Debug, thiserror::Error)]
pub enum BillingApiError {
    #[error("billing provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("billing provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("invalid billing provider URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Abstract billing provider interface
#[async_trait]
pub trait BillingApi: Send + Sync {
    /// Retrieve the current state of a subscription by its provider ID
    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<SubscriptionObject>;
}

/// HTTP implementation speaking the provider's REST API.
pub struct HttpBillingApi {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl HttpBillingApi {
    pub fn new(base_url: Url, api_key: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url, api_key })
    }
}

#[async_trait]
impl BillingApi for HttpBillingApi {
    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<SubscriptionObject> {
        let url = self.base_url.join(&format!("v1/subscriptions/{subscription_id}"))?;

        let response = self.client.get(url).bearer_auth(&self.api_key).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BillingApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<SubscriptionObject>().await?)
    }
}
