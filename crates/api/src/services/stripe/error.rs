//! Stripe-related errors.

use thiserror::Error;

/// Errors that can occur when interacting with Stripe.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("Stripe request failed: {0}")]
    Request(String),

    /// Failed to parse response.
    #[error("Stripe response error: {0}")]
    Response(String),

    /// Stripe API returned an error.
    #[error("Stripe API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid webhook signature.
    #[error("Invalid Stripe signature: {0}")]
    InvalidSignature(String),

    /// Webhook body is not a valid event.
    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    /// Amount cannot be expressed in minor units.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

impl StripeError {
    /// Whether the error is the caller's fault (bad webhook request) rather
    /// than an upstream failure.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidSignature(_) | Self::InvalidPayload(_))
    }
}
