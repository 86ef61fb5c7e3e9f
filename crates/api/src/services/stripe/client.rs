//! Stripe REST API client.

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error, instrument};

use cartwheel_core::OrderId;

use super::error::StripeError;
use super::types::{ApiErrorBody, PaymentIntent};
use crate::config::StripeConfig;

/// Stripe API base URL.
const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Stripe API client for creating payment intents.
#[derive(Clone)]
pub struct StripeClient {
    /// HTTP client.
    client: Client,
    /// Secret key used as bearer token.
    secret_key: SecretString,
    /// API base URL, overridable for tests.
    base_url: String,
    /// Currency for new intents.
    currency: String,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("secret_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("currency", &self.currency)
            .finish_non_exhaustive()
    }
}

impl StripeClient {
    /// Create a new Stripe client sharing an HTTP client.
    #[must_use]
    pub fn new(client: Client, config: &StripeConfig) -> Self {
        Self {
            client,
            secret_key: config.secret_key.clone(),
            base_url: STRIPE_API_BASE.to_string(),
            currency: config.currency.clone(),
        }
    }

    /// Point the client at a different API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Currency new intents are created in.
    #[must_use]
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Create a payment intent for an order.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Stripe rejects it.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn create_payment_intent(
        &self,
        amount: i64,
        order_id: OrderId,
    ) -> Result<PaymentIntent, StripeError> {
        let amount_param = amount.to_string();
        let order_param = order_id.to_string();
        let form = [
            ("amount", amount_param.as_str()),
            ("currency", self.currency.as_str()),
            ("metadata[order_id]", order_param.as_str()),
            ("automatic_payment_methods[enabled]", "true"),
        ];

        let response = self
            .client
            .post(format!("{}/payment_intents", self.base_url))
            .bearer_auth(self.secret_key.expose_secret())
            // Retried creates with the same key return the first intent
            .header("Idempotency-Key", format!("order-{order_id}-{amount}"))
            .form(&form)
            .send()
            .await
            .map_err(|e| StripeError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ApiErrorBody>().await {
                Ok(body) => {
                    error!(
                        status = status.as_u16(),
                        kind = ?body.error.kind,
                        code = ?body.error.code,
                        "Stripe API error creating payment intent"
                    );
                    body.error
                        .message
                        .unwrap_or_else(|| "Unknown error".to_string())
                }
                Err(e) => e.to_string(),
            };
            return Err(StripeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let intent: PaymentIntent = response
            .json()
            .await
            .map_err(|e| StripeError::Response(e.to_string()))?;

        debug!(payment_intent_id = %intent.id, "Payment intent created");

        Ok(intent)
    }
}
