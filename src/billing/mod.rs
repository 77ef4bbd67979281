pub mod client;
pub mod handlers;
pub mod webhook;

use crate::state::AppState;
use axum::{routing::post, Router};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/billing/checkout", post(handlers::create_checkout))
        .route("/billing/sync", post(handlers::sync_subscription))
        .route("/billing/webhook", post(webhook::stripe_webhook))
}
