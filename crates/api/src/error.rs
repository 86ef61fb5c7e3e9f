//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-side errors to
//! Sentry before responding. All route handlers return `Result<T, AppError>`;
//! the response body is always `{"error": "<message>"}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::db::orders::OrderWriteError;
use crate::services::auth::AuthError;
use crate::services::images::ImageError;
use crate::services::orders::OrderError;
use crate::services::stripe::{PaymentError, StripeError};

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Stripe operation failed.
    #[error("Payment error: {0}")]
    Payment(#[from] StripeError),

    /// Image upload failed.
    #[error("Image error: {0}")]
    Images(#[from] ImageError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request body failed field validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether this error is the server's fault and should be reported.
    fn is_server_error(&self) -> bool {
        match self {
            Self::Database(_) | Self::Internal(_) => true,
            Self::Payment(err) => !err.is_client_error(),
            Self::Images(err) => matches!(err, ImageError::Request(_) | ImageError::Api { .. }),
            Self::Auth(err) => matches!(
                err,
                AuthError::Repository(_) | AuthError::PasswordHash | AuthError::TokenEncoding(_)
            ),
            _ => false,
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Payment(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Payment(_) => StatusCode::BAD_GATEWAY,
            Self::Images(err) => match err {
                ImageError::Invalid(_) => StatusCode::BAD_REQUEST,
                ImageError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
                ImageError::Request(_) | ImageError::Api { .. } => StatusCode::BAD_GATEWAY,
            },
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials
                | AuthError::InvalidToken
                | AuthError::TokenExpired
                | AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::InvalidName(_)
                | AuthError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash | AuthError::TokenEncoding(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Client-facing message. Internal details are never exposed.
    fn public_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Payment(err) if err.is_client_error() => err.to_string(),
            Self::Payment(_) => "Payment provider error".to_string(),
            Self::Images(err) => match err {
                ImageError::Invalid(msg) => msg.clone(),
                ImageError::NotConfigured => err.to_string(),
                ImageError::Request(_) | ImageError::Api { .. } => {
                    "Image hosting error".to_string()
                }
            },
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid email or password".to_string(),
                AuthError::InvalidToken | AuthError::UserNotFound => {
                    "Invalid or missing token".to_string()
                }
                AuthError::TokenExpired => "Token expired".to_string(),
                AuthError::UserAlreadyExists => {
                    "An account with this email already exists".to_string()
                }
                AuthError::WeakPassword(msg)
                | AuthError::InvalidName(msg)
                | AuthError::InvalidAddress(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                AuthError::Repository(_) | AuthError::PasswordHash | AuthError::TokenEncoding(_) => {
                    "Authentication error".to_string()
                }
            },
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg)
            | Self::Validation(msg)
            | Self::Conflict(msg) => msg.clone(),
            Self::RateLimited => "Too many requests".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (self.status(), Json(json!({ "error": self.public_message() }))).into_response()
    }
}

impl From<OrderWriteError> for AppError {
    fn from(err: OrderWriteError) -> Self {
        match err {
            OrderWriteError::Database(e) => Self::Database(RepositoryError::Database(e)),
            OrderWriteError::OrderNotFound => Self::NotFound("Order not found".to_string()),
            OrderWriteError::ProductNotFound(id) => {
                Self::NotFound(format!("Product {id} not found"))
            }
            OrderWriteError::InsufficientStock { .. }
            | OrderWriteError::Empty
            | OrderWriteError::InvalidTransition { .. } => Self::BadRequest(err.to_string()),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::Write(e) => e.into(),
            OrderError::Repository(e) => Self::Database(e),
            OrderError::NotFound => Self::NotFound("Order not found".to_string()),
            OrderError::Invalid(msg) => Self::Validation(msg),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Stripe(e) => Self::Payment(e),
            PaymentError::Repository(e) => Self::Database(e),
            PaymentError::OrderNotFound => Self::NotFound("Order not found".to_string()),
            PaymentError::NotPayable(msg) => Self::BadRequest(msg),
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the current request scope.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::to_bytes;
    use cartwheel_core::{OrderStatus, ProductId};

    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_status_codes() {
        let cases = [
            (AppError::NotFound("x".to_string()), StatusCode::NOT_FOUND),
            (AppError::Unauthorized("x".to_string()), StatusCode::UNAUTHORIZED),
            (AppError::Forbidden("x".to_string()), StatusCode::FORBIDDEN),
            (AppError::BadRequest("x".to_string()), StatusCode::BAD_REQUEST),
            (AppError::Validation("x".to_string()), StatusCode::BAD_REQUEST),
            (AppError::Conflict("x".to_string()), StatusCode::CONFLICT),
            (AppError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (AppError::Internal("x".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                AppError::Database(RepositoryError::NotFound),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::Payment(StripeError::Request("down".to_string())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AppError::Payment(StripeError::InvalidSignature("bad".to_string())),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::Images(ImageError::NotConfigured),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status(), expected, "{err}");
        }
    }

    #[test]
    fn test_auth_error_status_codes() {
        assert_eq!(
            AppError::Auth(AuthError::InvalidCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Auth(AuthError::TokenExpired).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Auth(AuthError::UserAlreadyExists).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Auth(AuthError::WeakPassword("short".to_string())).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_order_errors_map_to_client_statuses() {
        let err: AppError = OrderWriteError::InsufficientStock {
            name: "Lamp".to_string(),
            available: 1,
            requested: 2,
        }
        .into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: AppError = OrderWriteError::ProductNotFound(ProductId::new(9)).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err: AppError = OrderError::Write(OrderWriteError::InvalidTransition {
            from: OrderStatus::Delivered,
            to: OrderStatus::Cancelled,
        })
        .into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: AppError = PaymentError::NotPayable("paid".to_string()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_error_body_is_json() {
        let (status, body) = body_json(AppError::NotFound("Product not found".to_string())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, serde_json::json!({ "error": "Product not found" }));
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let (_, body) = body_json(AppError::Internal("connection string leaked".to_string())).await;
        assert_eq!(body["error"], "Internal server error");

        let (_, body) =
            body_json(AppError::Payment(StripeError::Request("sk_live_x".to_string()))).await;
        assert_eq!(body["error"], "Payment provider error");
    }
}
