//! Non-tool endpoints: usage, plans, the billing webhook and health.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::auth::Caller;
use crate::billing::{catalogue, Plan};
use crate::server::response::ApiError;
use crate::server::AppState;
use crate::usage::{Remaining, UsageStats};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReport {
    #[serde(flatten)]
    pub stats: UsageStats,
    pub remaining: Remaining,
    pub entitled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

pub async fn usage(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<UsageReport>, ApiError> {
    let stats = state.limiter.stats(&caller.identity)?;
    let remaining = state.limiter.remaining(&caller.identity, caller.entitled)?;
    Ok(Json(UsageReport {
        stats,
        remaining,
        entitled: caller.entitled,
        email: caller.email,
    }))
}

pub async fn plans(State(state): State<AppState>) -> Json<Vec<Plan>> {
    let config = &state.config;
    Json(catalogue(
        config.daily_limit,
        config.free_upload_mb,
        config.pro_upload_mb,
        config.stripe_price_monthly.as_deref(),
        config.stripe_price_yearly.as_deref(),
    ))
}

pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok());
    let outcome = state.billing.handle(&body, signature).await?;
    debug!(?outcome, "Webhook handled");
    Ok(Json(json!({ "received": true })))
}

pub async fn health() -> &'static str {
    "OK"
}
