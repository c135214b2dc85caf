use anyhow::{anyhow, Context};
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

const STRIPE_API_BASE: &str = "https://api.stripe.com";

/// Everything the provider needs to open a hosted checkout for one tour.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    /// Correlation reference echoed back in the completion event
    pub tour_id: Uuid,
    pub tour_name: String,
    pub tour_summary: String,
    pub image_url: String,
    /// Price snapshot at checkout time
    pub price: Decimal,
    pub customer_email: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// Provider-hosted checkout session handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

/// Payment provider boundary.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_checkout_session(&self, request: CheckoutRequest)
        -> anyhow::Result<CheckoutSession>;
}

/// Stripe Checkout over the REST API.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

impl StripeClient {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: secret_key.into(),
            api_base: STRIPE_API_BASE.to_string(),
        }
    }

    /// Points the client at another API host (a local mock server).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

/// Form body of a one-item, card-only payment session.
pub fn form_params(request: &CheckoutRequest) -> anyhow::Result<Vec<(&'static str, String)>> {
    let unit_amount = (request.price * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or_else(|| anyhow!("price {} out of range", request.price))?;

    Ok(vec![
        ("payment_method_types[0]", "card".to_string()),
        ("mode", "payment".to_string()),
        ("success_url", request.success_url.clone()),
        ("cancel_url", request.cancel_url.clone()),
        ("customer_email", request.customer_email.clone()),
        ("client_reference_id", request.tour_id.to_string()),
        ("line_items[0][quantity]", "1".to_string()),
        ("line_items[0][price_data][currency]", "usd".to_string()),
        ("line_items[0][price_data][unit_amount]", unit_amount.to_string()),
        (
            "line_items[0][price_data][product_data][name]",
            format!("{} Tour", request.tour_name),
        ),
        (
            "line_items[0][price_data][product_data][description]",
            request.tour_summary.clone(),
        ),
        (
            "line_items[0][price_data][product_data][images][0]",
            request.image_url.clone(),
        ),
    ])
}

#[async_trait]
impl PaymentProvider for StripeClient {
    #[instrument(skip(self, request), fields(tour_id = %request.tour_id))]
    async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> anyhow::Result<CheckoutSession> {
        let params = form_params(&request)?;
        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await
            .context("checkout session request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Stripe API error ({}): {}", status, body));
        }

        let session: CheckoutSession = response
            .json()
            .await
            .context("failed to parse checkout session")?;

        info!("Created checkout session {}", session.id);
        Ok(session)
    }
}
