//! Bearer token extractors.
//!
//! # Example
//!
//! ```rust,ignore
//! async fn my_orders(RequireAuth(user): RequireAuth) -> impl IntoResponse {
//!     format!("Hello, {}!", user.name)
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::db::UserRepository;
use crate::error::{AppError, set_sentry_user};
use crate::models::CurrentUser;
use crate::services::auth::AuthError;
use crate::state::AppState;

/// Extractor that requires a valid bearer token for an existing user.
///
/// The user is reloaded from the database on every request, so role changes
/// and deletions take effect immediately rather than at token expiry.
pub struct RequireAuth(pub CurrentUser);

/// Extractor that requires an authenticated admin.
pub struct RequireAdmin(pub CurrentUser);

/// Pull the token out of an `Authorization: Bearer <token>` header.
fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?
        .to_str()
        .map_err(|_| AppError::Unauthorized("Malformed authorization header".to_string()))?;

    let (scheme, token) = header
        .split_once(' ')
        .ok_or_else(|| AppError::Unauthorized("Malformed authorization header".to_string()))?;

    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(AppError::Unauthorized(
            "Malformed authorization header".to_string(),
        ));
    }

    Ok(token.trim())
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = state.jwt().verify(token)?;
        let user_id = claims.user_id()?;

        let user = UserRepository::new(state.pool())
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let current = CurrentUser::from(&user);
        set_sentry_user(&current.id, Some(current.email.as_str()));
        tracing::Span::current().record("user_id", current.id.as_i32());

        Ok(Self(current))
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }

        Ok(Self(user))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn request_parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/orders");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_extracted() {
        let parts = request_parts(Some("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&parts).unwrap(), "abc.def.ghi");

        let parts = request_parts(Some("bearer abc"));
        assert_eq!(bearer_token(&parts).unwrap(), "abc");
    }

    #[test]
    fn test_bearer_token_rejections() {
        for header in [None, Some("Basic dXNlcjpwYXNz"), Some("Bearer "), Some("Bearer")] {
            assert!(
                matches!(bearer_token(&request_parts(header)), Err(AppError::Unauthorized(_))),
                "{header:?} should be rejected"
            );
        }
    }
}
