use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::auth::extractors::AuthUser;
use crate::auth::repo::User;
use crate::profiles::repo::{Plan, Profile, SubscriptionStatus};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub success: bool,
    pub message: String,
    pub plan: Plan,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SubscriptionStatus>,
}

#[instrument(skip(state))]
pub async fn create_checkout(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<CheckoutResponse>, (StatusCode, String)> {
    let user = User::find_by_id(&state.db, user_id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::UNAUTHORIZED, "User not found".to_string()))?;

    let session = state
        .billing
        .create_checkout_session(user.id, &user.email)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %user_id, "checkout session failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to create checkout session: {e}"),
            )
        })?;

    let url = session.url.ok_or_else(|| {
        error!(session_id = %session.id, "checkout session has no url");
        (
            StatusCode::BAD_GATEWAY,
            "Checkout session has no URL".to_string(),
        )
    })?;

    info!(user_id = %user_id, session_id = %session.id, "checkout session created");
    Ok(Json(CheckoutResponse { url }))
}

/// Fallback when webhooks did not fire: ask Stripe directly whether this
/// user has an active subscription and sync the profile to match.
#[instrument(skip(state))]
pub async fn sync_subscription(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<SyncResponse>, (StatusCode, String)> {
    let user = User::find_by_id(&state.db, user_id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::UNAUTHORIZED, "User not found".to_string()))?;

    let subscription = state
        .billing
        .find_active_subscription(user.id, &user.email)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %user_id, "stripe sync failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to sync with Stripe: {e}"),
            )
        })?;

    match subscription {
        Some(sub) if sub.status == "active" => {
            Profile::set_plan(
                &state.db,
                user_id,
                Plan::Pro,
                SubscriptionStatus::Active,
            )
            .await
            .map_err(internal)?;

            info!(user_id = %user_id, subscription_id = %sub.id, "profile synced to pro");
            Ok(Json(SyncResponse {
                success: true,
                message: "Profile synced with Stripe subscription".to_string(),
                plan: Plan::Pro,
                status: Some(SubscriptionStatus::Active),
            }))
        }
        _ => Ok(Json(SyncResponse {
            success: false,
            message: "No active subscription found in Stripe for this user".to_string(),
            plan: Plan::Free,
            status: None,
        })),
    }
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = %e, "billing handler failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
