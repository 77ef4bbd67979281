use std::collections::HashMap;

use axum::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::config::StripeConfig;

const STRIPE_API: &str = "https://api.stripe.com/v1";

#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SubscriptionSummary {
    pub id: String,
    pub status: String,
}

/// Seam to the payment provider so handlers and webhooks can be tested
/// without network access.
#[async_trait]
pub trait BillingClient: Send + Sync {
    async fn create_checkout_session(
        &self,
        user_id: Uuid,
        email: &str,
    ) -> anyhow::Result<CheckoutSession>;

    /// Look for an active subscription belonging to this user, matching on
    /// the user id we stamp into customer and subscription metadata.
    async fn find_active_subscription(
        &self,
        user_id: Uuid,
        email: &str,
    ) -> anyhow::Result<Option<SubscriptionSummary>>;

    /// The user id stored in a Stripe customer's metadata, if any.
    async fn customer_user_id(&self, customer_id: &str) -> anyhow::Result<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct ApiList<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ApiCheckoutSession {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiCustomer {
    id: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ApiSubscription {
    id: String,
    status: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

/// Thin client over the Stripe REST API (form-encoded requests, bearer auth).
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
    price_id_pro: String,
    app_url: String,
}

impl StripeClient {
    /// Requires both the API key and the pro price id; otherwise billing
    /// stays disabled.
    pub fn from_config(config: &StripeConfig) -> Option<Self> {
        let secret_key = config.secret_key.clone()?;
        let price_id_pro = config.price_id_pro.clone()?;
        Some(Self {
            client: Client::new(),
            secret_key,
            price_id_pro,
            app_url: config.app_url.trim_end_matches('/').to_string(),
        })
    }

    async fn list_subscriptions(&self, customer_id: &str) -> anyhow::Result<Vec<ApiSubscription>> {
        let list: ApiList<ApiSubscription> = self
            .client
            .get(format!("{STRIPE_API}/subscriptions"))
            .bearer_auth(&self.secret_key)
            .query(&[
                ("customer", customer_id),
                ("status", "active"),
                ("limit", "10"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(list.data)
    }
}

#[async_trait]
impl BillingClient for StripeClient {
    async fn create_checkout_session(
        &self,
        user_id: Uuid,
        email: &str,
    ) -> anyhow::Result<CheckoutSession> {
        let user_id = user_id.to_string();
        let params = [
            ("mode", "subscription".to_string()),
            ("payment_method_types[0]", "card".to_string()),
            ("line_items[0][price]", self.price_id_pro.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            (
                "success_url",
                format!("{}/billing?success=true", self.app_url),
            ),
            (
                "cancel_url",
                format!("{}/billing?canceled=true", self.app_url),
            ),
            ("client_reference_id", user_id.clone()),
            ("metadata[user_id]", user_id.clone()),
            ("metadata[user_email]", email.to_string()),
        ];

        let session: ApiCheckoutSession = self
            .client
            .post(format!("{STRIPE_API}/checkout/sessions"))
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!(session_id = %session.id, user_id = %user_id, "checkout session created");
        Ok(CheckoutSession {
            id: session.id,
            url: session.url,
        })
    }

    async fn find_active_subscription(
        &self,
        user_id: Uuid,
        email: &str,
    ) -> anyhow::Result<Option<SubscriptionSummary>> {
        let user_id = user_id.to_string();

        let customers: ApiList<ApiCustomer> = self
            .client
            .get(format!("{STRIPE_API}/customers"))
            .bearer_auth(&self.secret_key)
            .query(&[("email", email), ("limit", "10")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        for customer in customers.data {
            let customer_matches = customer.metadata.get("user_id") == Some(&user_id);
            for sub in self.list_subscriptions(&customer.id).await? {
                if customer_matches || sub.metadata.get("user_id") == Some(&user_id) {
                    return Ok(Some(SubscriptionSummary {
                        id: sub.id,
                        status: sub.status,
                    }));
                }
            }
        }
        Ok(None)
    }

    async fn customer_user_id(&self, customer_id: &str) -> anyhow::Result<Option<String>> {
        let customer: ApiCustomer = self
            .client
            .get(format!("{STRIPE_API}/customers/{customer_id}"))
            .bearer_auth(&self.secret_key)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(customer.metadata.get("user_id").cloned())
    }
}

/// Stand-in used when Stripe is not configured.
pub struct StripeDisabled;

#[async_trait]
impl BillingClient for StripeDisabled {
    async fn create_checkout_session(
        &self,
        _user_id: Uuid,
        _email: &str,
    ) -> anyhow::Result<CheckoutSession> {
        anyhow::bail!("Stripe is not configured")
    }

    async fn find_active_subscription(
        &self,
        _user_id: Uuid,
        _email: &str,
    ) -> anyhow::Result<Option<SubscriptionSummary>> {
        anyhow::bail!("Stripe is not configured")
    }

    async fn customer_user_id(&self, _customer_id: &str) -> anyhow::Result<Option<String>> {
        anyhow::bail!("Stripe is not configured")
    }
}
