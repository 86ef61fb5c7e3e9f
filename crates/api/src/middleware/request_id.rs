//! Request ID middleware for request tracing and correlation.
//!
//! Uses the caller's `x-request-id` when it is a short token of letters,
//! digits, `-`, `_` or `.`, otherwise generates a UUID v4. The ID is recorded on the tracing span, tagged on the Sentry
//! scope, and echoed in the response headers.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest caller-supplied ID that is accepted as-is.
const MAX_REQUEST_ID_LEN: usize = 128;

/// The caller's request ID if it is usable, or a fresh UUID.
fn resolve_request_id(header: Option<&HeaderValue>) -> String {
    header
        .and_then(|h| h.to_str().ok())
        .filter(|id| is_acceptable(id))
        .map_or_else(|| Uuid::new_v4().to_string(), String::from)
}

fn is_acceptable(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_REQUEST_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

/// Middleware that ensures every request has a request ID.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = resolve_request_id(request.headers().get(REQUEST_ID_HEADER));

    Span::current().record("request_id", &request_id);

    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_id_kept() {
        let header = HeaderValue::from_static("abc-123_x.y");
        assert_eq!(resolve_request_id(Some(&header)), "abc-123_x.y");
    }

    #[test]
    fn test_overlong_id_replaced() {
        let at_limit = "a".repeat(MAX_REQUEST_ID_LEN);
        let header = HeaderValue::from_str(&at_limit).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(resolve_request_id(Some(&header)), at_limit);

        let too_long = "a".repeat(MAX_REQUEST_ID_LEN + 1);
        let header = HeaderValue::from_str(&too_long).unwrap_or_else(|e| panic!("{e}"));
        let id = resolve_request_id(Some(&header));
        assert_ne!(id, too_long);
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_missing_or_odd_ids_replaced() {
        assert!(Uuid::parse_str(&resolve_request_id(None)).is_ok());

        for raw in ["", "has space", "semi;colon", "quote\"d"] {
            let header = HeaderValue::from_str(raw).unwrap_or_else(|e| panic!("{e}"));
            let id = resolve_request_id(Some(&header));
            assert!(Uuid::parse_str(&id).is_ok(), "{raw:?}");
        }
    }
}
