use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use crate::error::{Error, Result};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Looks up the email address behind a payment-processor customer id.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn email(&self, customer_id: &str) -> Result<Option<String>>;
}

pub struct StripeCustomers {
    client: reqwest::Client,
    secret_key: String,
    base_url: String,
}

impl StripeCustomers {
    pub fn new(secret_key: impl Into<String>) -> Self {
        StripeCustomers {
            client: reqwest::Client::new(),
            secret_key: secret_key.into(),
            base_url: STRIPE_API_BASE.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CustomerObject {
    email: Option<String>,
    #[serde(default)]
    deleted: bool,
}

#[async_trait]
impl CustomerDirectory for StripeCustomers {
    #[instrument(skip(self))]
    async fn email(&self, customer_id: &str) -> Result<Option<String>> {
        if self.secret_key.is_empty() {
            return Err(Error::Upstream("STRIPE_SECRET_KEY is not configured".to_string()));
        }

        let response = self
            .client
            .get(format!("{}/customers/{}", self.base_url, customer_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await?
            .error_for_status()?;

        let customer: CustomerObject = response.json().await?;
        if customer.deleted {
            return Ok(None);
        }
        Ok(customer.email.filter(|e| !e.is_empty()))
    }
}

/// Fixed customer table for tests.
#[cfg(test)]
#[derive(Default)]
pub struct StaticCustomers {
    emails: std::collections::HashMap<String, String>,
}

#[cfg(test)]
impl StaticCustomers {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        StaticCustomers {
            emails: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl CustomerDirectory for StaticCustomers {
    async fn email(&self, customer_id: &str) -> Result<Option<String>> {
        Ok(self.emails.get(customer_id).cloned())
    }
}
