//! Webhook signature verification.
//!
//! Stripe signs each delivery with a `Stripe-Signature` header of the form
//! `t=<unix seconds>,v1=<hex hmac>[,v1=<hex hmac>...]`. The HMAC-SHA256 is
//! computed over `"{t}.{raw body}"` with the endpoint's signing secret.
//! Several `v1` entries appear while a secret is being rolled.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use super::error::StripeError;
use super::types::WebhookEvent;

/// Maximum age (either direction) of a signed timestamp, in seconds.
pub const TOLERANCE_SECS: i64 = 300;

/// Parsed `Stripe-Signature` header.
#[derive(Debug, PartialEq, Eq)]
struct SignatureHeader<'a> {
    timestamp: i64,
    signatures: Vec<&'a str>,
}

fn parse_header(header: &str) -> Result<SignatureHeader<'_>, StripeError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                timestamp = Some(value.parse::<i64>().map_err(|_| {
                    StripeError::InvalidSignature("invalid timestamp".to_string())
                })?);
            }
            "v1" => signatures.push(value),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| StripeError::InvalidSignature("missing timestamp".to_string()))?;
    if signatures.is_empty() {
        return Err(StripeError::InvalidSignature(
            "no v1 signature".to_string(),
        ));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

/// Verify a webhook delivery against the signing secret at time `now`.
///
/// # Errors
///
/// Returns `StripeError::InvalidSignature` if the header is malformed, the
/// timestamp is outside the tolerance, or no signature matches.
pub fn verify_signature(
    secret: &SecretString,
    payload: &[u8],
    header: &str,
    now: i64,
) -> Result<(), StripeError> {
    let parsed = parse_header(header)?;

    if (now - parsed.timestamp).abs() > TOLERANCE_SECS {
        return Err(StripeError::InvalidSignature(
            "timestamp outside tolerance".to_string(),
        ));
    }

    let expected = compute_signature(secret, parsed.timestamp, payload)?;

    if parsed
        .signatures
        .iter()
        .any(|candidate| constant_time_compare(&expected, candidate))
    {
        Ok(())
    } else {
        Err(StripeError::InvalidSignature(
            "signature mismatch".to_string(),
        ))
    }
}

/// Verify a delivery and parse its body as an event.
///
/// # Errors
///
/// Returns `StripeError::InvalidSignature` or `StripeError::InvalidPayload`.
pub fn construct_event(
    secret: &SecretString,
    payload: &[u8],
    header: &str,
    now: i64,
) -> Result<WebhookEvent, StripeError> {
    verify_signature(secret, payload, header, now)?;
    serde_json::from_slice(payload).map_err(|e| StripeError::InvalidPayload(e.to_string()))
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`.
fn compute_signature(
    secret: &SecretString,
    timestamp: i64,
    payload: &[u8],
) -> Result<String, StripeError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|e| StripeError::InvalidSignature(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

/// Build a valid `Stripe-Signature` header. Used by tests across the crate.
#[cfg(test)]
pub(crate) fn sign_for_test(secret: &str, payload: &[u8], timestamp: i64) -> String {
    let secret = SecretString::from(secret.to_string());
    let signature = compute_signature(&secret, timestamp, payload).unwrap_or_default();
    format!("t={timestamp},v1={signature}")
}
