//! Stripe API and webhook payload types.
//!
//! Only the fields this service reads are modelled.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A payment intent object.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    /// Intent ID (`pi_...`).
    pub id: String,
    /// Secret the browser uses to confirm the payment.
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Amount in minor units.
    pub amount: i64,
    /// Lowercase currency code.
    pub currency: String,
    /// Intent status (`requires_payment_method`, `succeeded`, ...).
    #[serde(default)]
    pub status: String,
    /// Metadata attached at creation.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentIntent {
    /// The `order_id` metadata value, if present and numeric.
    #[must_use]
    pub fn order_id(&self) -> Option<cartwheel_core::OrderId> {
        self.metadata.get("order_id")?.parse().ok()
    }
}

/// Error envelope returned by the Stripe API.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

/// Error detail inside [`ApiErrorBody`].
#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

/// A webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Event ID (`evt_...`).
    pub id: String,
    /// Event type, e.g. `payment_intent.succeeded`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event payload.
    pub data: EventData,
}

/// The `data` member of a webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    /// The object the event is about, shape depends on the event type.
    pub object: serde_json::Value,
}

/// Response body of `POST /api/payment/create-intent`.
#[derive(Debug, Clone, Serialize)]
pub struct IntentResponse {
    pub client_secret: String,
    pub payment_intent_id: String,
    /// Amount in minor units.
    pub amount: i64,
}
