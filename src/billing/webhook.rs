use anyhow::Context;
use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use time::OffsetDateTime;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::profiles::repo::{Plan, Profile, SubscriptionStatus};
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Signatures older or newer than this are rejected.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Verify a `Stripe-Signature` header (`t=<unix>,v1=<hex hmac>`) against the
/// raw request body. The signed payload is `"{t}.{body}"`.
pub fn verify_signature(
    secret: &str,
    header: &str,
    payload: &[u8],
    now_unix: i64,
) -> anyhow::Result<()> {
    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        let mut kv = part.trim().splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some("t"), Some(v)) => timestamp = v.parse::<i64>().ok(),
            (Some("v1"), Some(v)) => candidates.push(v.to_string()),
            _ => {}
        }
    }

    let timestamp = timestamp.context("missing timestamp in signature header")?;
    if (now_unix - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        anyhow::bail!("signature timestamp outside tolerance");
    }
    if candidates.is_empty() {
        anyhow::bail!("missing v1 signature");
    }

    for candidate in candidates {
        let Ok(bytes) = hex::decode(&candidate) else {
            continue;
        };
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| anyhow::anyhow!("bad hmac key: {e}"))?;
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        if mac.verify_slice(&bytes).is_ok() {
            return Ok(());
        }
    }
    anyhow::bail!("no matching signature")
}

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: Value,
}

fn metadata_user_id(object: &Value) -> Option<String> {
    object
        .get("metadata")?
        .get("user_id")?
        .as_str()
        .map(str::to_string)
}

fn object_status(object: &Value) -> Option<&str> {
    object.get("status").and_then(Value::as_str)
}

/// User id for a subscription event: subscription metadata first, then the
/// owning customer's metadata.
async fn resolve_user_id(state: &AppState, object: &Value) -> anyhow::Result<Option<String>> {
    if let Some(id) = metadata_user_id(object) {
        return Ok(Some(id));
    }
    let Some(customer) = object.get("customer").and_then(Value::as_str) else {
        return Ok(None);
    };
    state.billing.customer_user_id(customer).await
}

async fn update_plan(
    state: &AppState,
    user_id: &str,
    plan: Plan,
    status: SubscriptionStatus,
) -> anyhow::Result<()> {
    let Ok(user_id) = Uuid::parse_str(user_id) else {
        warn!(user_id, "webhook carried a non-uuid user id");
        return Ok(());
    };
    if Profile::set_plan(&state.db, user_id, plan, status).await? {
        info!(%user_id, ?plan, ?status, "profile plan updated from webhook");
    } else {
        warn!(%user_id, "webhook user has no profile");
    }
    Ok(())
}

async fn apply_event(state: &AppState, event: StripeEvent) -> anyhow::Result<()> {
    let object = &event.data.object;
    match event.kind.as_str() {
        "checkout.session.completed" => {
            if object.get("mode").and_then(Value::as_str) != Some("subscription") {
                return Ok(());
            }
            let user_id = metadata_user_id(object).or_else(|| {
                object
                    .get("client_reference_id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            });
            if let Some(user_id) = user_id {
                update_plan(state, &user_id, Plan::Pro, SubscriptionStatus::Active).await?;
            }
        }
        "customer.subscription.created" => {
            if object_status(object) != Some("active") {
                return Ok(());
            }
            if let Some(user_id) = resolve_user_id(state, object).await? {
                update_plan(state, &user_id, Plan::Pro, SubscriptionStatus::Active).await?;
            }
        }
        "customer.subscription.updated" | "customer.subscription.deleted" => {
            if let Some(user_id) = resolve_user_id(state, object).await? {
                if object_status(object) == Some("active") {
                    update_plan(state, &user_id, Plan::Pro, SubscriptionStatus::Active).await?;
                } else {
                    update_plan(state, &user_id, Plan::Free, SubscriptionStatus::Canceled).await?;
                }
            }
        }
        other => {
            debug!(event = other, "unhandled stripe event");
        }
    }
    Ok(())
}

#[instrument(skip(state, headers, body))]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, (StatusCode, String)> {
    let Some(secret) = state.config.stripe.webhook_secret.as_deref() else {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Stripe is not configured".to_string(),
        ));
    };

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or((
            StatusCode::BAD_REQUEST,
            "Missing stripe-signature header".to_string(),
        ))?;

    let now = OffsetDateTime::now_utc().unix_timestamp();
    if let Err(e) = verify_signature(secret, signature, body.as_bytes(), now) {
        warn!(error = %e, "webhook signature verification failed");
        return Err((
            StatusCode::BAD_REQUEST,
            "Webhook signature verification failed".to_string(),
        ));
    }

    let event: StripeEvent = serde_json::from_str(&body)
        .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid payload".to_string()))?;

    info!(event = %event.kind, "stripe webhook received");
    if let Err(e) = apply_event(&state, event).await {
        error!(error = %e, "webhook processing failed");
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Webhook processing failed".to_string(),
        ));
    }

    Ok(Json(json!({ "received": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        let sig = hex::encode(mac.finalize().into_bytes());
        format!("t={timestamp},v1={sig}")
    }

    #[test]
    fn accepts_a_freshly_signed_payload() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let header = sign("whsec_test", 1_700_000_000, payload);
        assert!(verify_signature("whsec_test", &header, payload, 1_700_000_000).is_ok());
    }

    #[test]
    fn rejects_a_tampered_payload() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let header = sign("whsec_test", 1_700_000_000, payload);
        let err = verify_signature("whsec_test", &header, b"something else", 1_700_000_000);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_the_wrong_secret() {
        let payload = b"{}";
        let header = sign("whsec_test", 1_700_000_000, payload);
        assert!(verify_signature("whsec_other", &header, payload, 1_700_000_000).is_err());
    }

    #[test]
    fn rejects_a_stale_timestamp() {
        let payload = b"{}";
        let header = sign("whsec_test", 1_700_000_000, payload);
        let err = verify_signature("whsec_test", &header, payload, 1_700_000_000 + 600);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_a_header_without_signature() {
        assert!(verify_signature("whsec_test", "t=1700000000", b"{}", 1_700_000_000).is_err());
        assert!(verify_signature("whsec_test", "v1=deadbeef", b"{}", 1_700_000_000).is_err());
    }

    #[test]
    fn parses_checkout_event_and_extracts_user_id() {
        let body = r#"{
            "type": "checkout.session.completed",
            "data": {
                "object": {
                    "mode": "subscription",
                    "client_reference_id": "5f5ce4e1-9f0e-4cb6-a922-23a72aa66e62",
                    "metadata": { "user_id": "5f5ce4e1-9f0e-4cb6-a922-23a72aa66e62" }
                }
            }
        }"#;
        let event: StripeEvent = serde_json::from_str(body).unwrap();
        assert_eq!(event.kind, "checkout.session.completed");
        assert_eq!(
            metadata_user_id(&event.data.object).as_deref(),
            Some("5f5ce4e1-9f0e-4cb6-a922-23a72aa66e62")
        );
    }

    #[test]
    fn subscription_status_is_read_from_the_object() {
        let object: Value = serde_json::json!({ "status": "past_due" });
        assert_eq!(object_status(&object), Some("past_due"));
        assert_eq!(object_status(&serde_json::json!({})), None);
    }
}
