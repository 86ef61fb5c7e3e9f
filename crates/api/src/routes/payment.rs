//! Payment route handlers: intent creation, Stripe webhook, client config.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};

use cartwheel_core::OrderId;

use crate::error::{AppError, Result};
use crate::extract::ApiJson;
use crate::middleware::RequireAuth;
use crate::services::stripe::{EventOutcome, IntentResponse, PaymentService, webhook};
use crate::state::AppState;

/// Header carrying the webhook signature.
const SIGNATURE_HEADER: &str = "stripe-signature";

/// Body of `POST /api/payment/create-intent`.
#[derive(Debug, Deserialize)]
pub struct CreateIntentRequest {
    pub order_id: OrderId,
}

/// Response of `GET /api/payment/config`.
#[derive(Debug, Serialize)]
pub struct PaymentConfig {
    pub publishable_key: Option<String>,
    pub currency: String,
}

/// Create a Stripe payment intent for one of the caller's card orders.
#[instrument(skip_all, fields(user_id = %user.id, order_id = %body.order_id))]
pub async fn create_intent(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<CreateIntentRequest>,
) -> Result<Json<IntentResponse>> {
    let intent = PaymentService::new(state.pool(), state.stripe())
        .create_intent(&user, body.order_id)
        .await?;
    Ok(Json(intent))
}

/// Receive a Stripe webhook delivery.
///
/// The raw body is needed for signature verification, so this handler
/// takes `Bytes` rather than a JSON extractor.
#[instrument(skip_all)]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<serde_json::Value>)> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing Stripe-Signature header".to_string()))?;

    let event = webhook::construct_event(
        &state.config().stripe.webhook_secret,
        &body,
        signature,
        chrono::Utc::now().timestamp(),
    )
    .inspect_err(|e| warn!(error = %e, "Rejected webhook delivery"))?;

    let outcome = PaymentService::new(state.pool(), state.stripe())
        .handle_event(&event)
        .await?;

    match outcome {
        EventOutcome::Applied(order_id) => {
            info!(event_id = %event.id, order_id = %order_id, "Webhook applied");
        }
        EventOutcome::UnknownOrder => {
            warn!(event_id = %event.id, "Webhook for unknown order");
        }
        EventOutcome::AlreadyApplied(_)
        | EventOutcome::OrderCancelled(_)
        | EventOutcome::Ignored => {}
    }

    Ok((StatusCode::OK, Json(json!({ "received": true }))))
}

/// Publishable key and currency for the client-side Stripe SDK.
pub async fn config(State(state): State<AppState>) -> Json<PaymentConfig> {
    let stripe = &state.config().stripe;
    Json(PaymentConfig {
        publishable_key: stripe.publishable_key.clone(),
        currency: stripe.currency.clone(),
    })
}
