use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::billing::customers::CustomerDirectory;
use crate::billing::signature;
use crate::entitlement::EntitlementStore;
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct Event {
    #[serde(rename = "type")]
    kind: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: Value,
}

#[derive(Debug, Deserialize)]
struct CheckoutSession {
    customer_email: Option<String>,
    #[serde(default)]
    metadata: Option<std::collections::HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct Subscription {
    customer: String,
    status: String,
}

/// What a verified event did to entitlements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Granted(String),
    Revoked(String),
    /// Verified, but nothing to change
    Ignored,
}

pub struct BillingWebhook {
    secret: String,
    tolerance_secs: i64,
    customers: Arc<dyn CustomerDirectory>,
    entitlements: Arc<dyn EntitlementStore>,
}

impl BillingWebhook {
    pub fn new(
        secret: impl Into<String>,
        tolerance_secs: i64,
        customers: Arc<dyn CustomerDirectory>,
        entitlements: Arc<dyn EntitlementStore>,
    ) -> Self {
        BillingWebhook {
            secret: secret.into(),
            tolerance_secs,
            customers,
            entitlements,
        }
    }

    pub async fn handle(&self, payload: &[u8], signature_header: Option<&str>) -> Result<WebhookOutcome> {
        self.handle_at(payload, signature_header, chrono::Utc::now().timestamp())
            .await
    }

    /// Verify, then apply. Nothing is written unless the signature checks out.
    #[instrument(skip_all)]
    pub async fn handle_at(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
        now_unix: i64,
    ) -> Result<WebhookOutcome> {
        let header = signature_header.ok_or(Error::MissingSignature)?;
        if let Err(e) = signature::verify(payload, header, &self.secret, self.tolerance_secs, now_unix) {
            warn!("Webhook signature verification failed");
            return Err(e);
        }

        let event: Event = serde_json::from_slice(payload).map_err(invalid_payload)?;

        match event.kind.as_str() {
            "checkout.session.completed" => {
                let session: CheckoutSession =
                    serde_json::from_value(event.data.object).map_err(invalid_payload)?;
                let email = session
                    .metadata
                    .and_then(|mut m| m.remove("email"))
                    .filter(|e| !e.is_empty())
                    .or(session.customer_email.filter(|e| !e.is_empty()));

                match email {
                    Some(email) => self.apply(email, true),
                    None => Ok(WebhookOutcome::Ignored),
                }
            }
            "customer.subscription.deleted" | "customer.subscription.updated" => {
                let subscription: Subscription =
                    serde_json::from_value(event.data.object).map_err(invalid_payload)?;
                let entitled =
                    event.kind == "customer.subscription.updated" && subscription.status == "active";

                match self.customers.email(&subscription.customer).await? {
                    Some(email) => self.apply(email, entitled),
                    None => Ok(WebhookOutcome::Ignored),
                }
            }
            _ => Ok(WebhookOutcome::Ignored),
        }
    }

    fn apply(&self, email: String, entitled: bool) -> Result<WebhookOutcome> {
        self.entitlements.set_entitled(&email, entitled)?;
        if entitled {
            info!(%email, "Subscription active");
            Ok(WebhookOutcome::Granted(email))
        } else {
            info!(%email, "Subscription ended");
            Ok(WebhookOutcome::Revoked(email))
        }
    }
}

fn invalid_payload(e: serde_json::Error) -> Error {
    Error::InvalidPayload {
        reason: e.to_string(),
    }
}
