//! Stripe payments.
//!
//! This module provides:
//! - [`StripeClient`] for creating payment intents
//! - Webhook signature verification and event parsing
//! - [`PaymentService`], which ties intents and webhook events to orders
//!
//! # Flow
//!
//! 1. The customer places an order (`pending`, payment `pending`)
//! 2. `POST /api/payment/create-intent` creates an intent for the order total
//!    and returns its client secret
//! 3. The browser confirms the payment with Stripe.js
//! 4. Stripe calls the webhook; `payment_intent.succeeded` marks the order
//!    paid and confirms it

mod client;
mod error;
mod types;
pub mod webhook;

pub use client::StripeClient;
pub use error::StripeError;
pub use types::{IntentResponse, PaymentIntent, WebhookEvent};

use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument, warn};

use cartwheel_core::{OrderId, OrderStatus, PaymentMethod, to_minor_units};

use crate::db::{OrderRepository, PaymentUpdate, RepositoryError};
use crate::models::CurrentUser;

/// Webhook event types this service acts on.
pub const EVENT_PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const EVENT_PAYMENT_FAILED: &str = "payment_intent.payment_failed";

/// Errors from payment operations on orders.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Stripe call failed.
    #[error(transparent)]
    Stripe(#[from] StripeError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// No such order visible to the caller.
    #[error("order not found")]
    OrderNotFound,

    /// Order cannot be paid online in its current state.
    #[error("{0}")]
    NotPayable(String),
}

/// What a webhook event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Order updated.
    Applied(OrderId),
    /// Order already in the target state.
    AlreadyApplied(OrderId),
    /// The order was cancelled before the event arrived.
    OrderCancelled(OrderId),
    /// No order matched the intent.
    UnknownOrder,
    /// Event type not handled.
    Ignored,
}

/// Payment service for orders.
pub struct PaymentService<'a> {
    orders: OrderRepository<'a>,
    stripe: &'a StripeClient,
}

impl<'a> PaymentService<'a> {
    /// Create a new payment service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, stripe: &'a StripeClient) -> Self {
        Self {
            orders: OrderRepository::new(pool),
            stripe,
        }
    }

    /// Create a payment intent for the caller's order.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::OrderNotFound` if the order doesn't exist or
    /// belongs to someone else, and `NotPayable` if it is cancelled, already
    /// paid, or cash on delivery.
    #[instrument(skip(self, user), fields(user_id = %user.id, order_id = %order_id))]
    pub async fn create_intent(
        &self,
        user: &CurrentUser,
        order_id: OrderId,
    ) -> Result<IntentResponse, PaymentError> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .filter(|order| order.user_id == user.id)
            .ok_or(PaymentError::OrderNotFound)?;

        if order.status == OrderStatus::Cancelled {
            return Err(PaymentError::NotPayable("order is cancelled".to_string()));
        }
        if order.is_paid() {
            return Err(PaymentError::NotPayable("order is already paid".to_string()));
        }
        if order.payment_method != PaymentMethod::Card {
            return Err(PaymentError::NotPayable(
                "order is not paid by card".to_string(),
            ));
        }

        let amount = to_minor_units(order.totals.total_price).ok_or_else(|| {
            StripeError::InvalidAmount(order.totals.total_price.to_string())
        })?;

        let intent = self.stripe.create_payment_intent(amount, order.id).await?;
        let client_secret = intent.client_secret.clone().ok_or_else(|| {
            StripeError::Response("payment intent has no client_secret".to_string())
        })?;

        self.orders.set_payment_intent(order.id, &intent.id).await?;

        info!(payment_intent_id = %intent.id, amount, "Payment intent created for order");

        Ok(IntentResponse {
            client_secret,
            payment_intent_id: intent.id,
            amount: intent.amount,
        })
    }

    /// Apply a verified webhook event.
    ///
    /// Unknown orders are reported as [`EventOutcome::UnknownOrder`] rather
    /// than an error so the endpoint still acknowledges the delivery.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Stripe` if the event object is not a payment
    /// intent, or `Repository` on database failure.
    #[instrument(skip(self, event), fields(event_id = %event.id, event_type = %event.event_type))]
    pub async fn handle_event(&self, event: &WebhookEvent) -> Result<EventOutcome, PaymentError> {
        let succeeded = match event.event_type.as_str() {
            EVENT_PAYMENT_SUCCEEDED => true,
            EVENT_PAYMENT_FAILED => false,
            _ => return Ok(EventOutcome::Ignored),
        };

        let intent: PaymentIntent = serde_json::from_value(event.data.object.clone())
            .map_err(|e| StripeError::InvalidPayload(e.to_string()))?;

        let Some(order_id) = self.resolve_order(&intent).await? else {
            warn!(payment_intent_id = %intent.id, "Webhook for unknown order");
            return Ok(EventOutcome::UnknownOrder);
        };

        let result = if succeeded {
            self.orders.mark_paid(order_id, &intent.id).await
        } else {
            self.orders.mark_payment_failed(order_id).await
        };

        match result {
            Ok(PaymentUpdate::Applied) => {
                info!(order_id = %order_id, succeeded, "Order payment updated");
                Ok(EventOutcome::Applied(order_id))
            }
            Ok(PaymentUpdate::Unchanged) => Ok(EventOutcome::AlreadyApplied(order_id)),
            Ok(PaymentUpdate::OrderCancelled) => {
                warn!(order_id = %order_id, succeeded, "Payment event for cancelled order");
                Ok(EventOutcome::OrderCancelled(order_id))
            }
            Err(RepositoryError::NotFound) => {
                warn!(order_id = %order_id, "Webhook metadata names a missing order");
                Ok(EventOutcome::UnknownOrder)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Order from intent metadata, falling back to the stored intent ID.
    async fn resolve_order(&self, intent: &PaymentIntent) -> Result<Option<OrderId>, PaymentError> {
        if let Some(order_id) = intent.order_id() {
            return Ok(Some(order_id));
        }
        Ok(self.orders.find_by_payment_intent(&intent.id).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_order_id_from_metadata() {
        let intent: PaymentIntent = serde_json::from_value(serde_json::json!({
            "id": "pi_123",
            "client_secret": "pi_123_secret_abc",
            "amount": 6173,
            "currency": "usd",
            "status": "succeeded",
            "metadata": { "order_id": "17" }
        }))
        .unwrap();
        assert_eq!(intent.order_id(), Some(OrderId::new(17)));

        let intent: PaymentIntent = serde_json::from_value(serde_json::json!({
            "id": "pi_456",
            "amount": 100,
            "currency": "usd"
        }))
        .unwrap();
        assert_eq!(intent.order_id(), None);
    }

    #[test]
    fn test_stripe_error_classification() {
        assert!(StripeError::InvalidSignature("x".to_string()).is_client_error());
        assert!(StripeError::InvalidPayload("x".to_string()).is_client_error());
        assert!(!StripeError::Request("x".to_string()).is_client_error());
    }
}
