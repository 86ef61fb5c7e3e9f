//! HS256 bearer tokens.
//!
//! A token carries the user's ID, email and role. Handlers never trust the
//! role claim on its own; the auth extractor reloads the user on each request.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use cartwheel_core::{UserId, UserRole};

use super::AuthError;
use crate::config::JwtConfig;
use crate::models::user::User;

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID).
    pub sub: String,
    /// User email.
    pub email: String,
    /// Role at the time the token was issued.
    pub role: UserRole,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
}

impl Claims {
    /// Parse the subject as a user ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidToken` if the subject is not a user ID.
    pub fn user_id(&self) -> Result<UserId, AuthError> {
        self.sub.parse().map_err(|_| AuthError::InvalidToken)
    }
}

/// Signs and verifies access tokens.
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetime: Duration,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl JwtService {
    /// Build keys from configuration.
    #[must_use]
    pub fn new(config: &JwtConfig) -> Self {
        let secret = config.secret.expose_secret().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            lifetime: Duration::days(config.expiration_days),
        }
    }

    /// Issue a token for a user.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenEncoding` if signing fails.
    pub fn issue(&self, user: &User) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.to_string(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
        };
        self.encode(&claims)
    }

    fn encode(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenEncoding(e.to_string()))
    }

    /// Verify a token's signature and expiry and return its claims.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenExpired` for expired tokens and
    /// `AuthError::InvalidToken` for anything else that fails to verify.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn service(secret: &str) -> JwtService {
        JwtService::new(&JwtConfig {
            secret: SecretString::from(secret.to_string()),
            expiration_days: 7,
        })
    }

    fn user() -> User {
        User {
            id: UserId::new(42),
            name: "Ada".to_string(),
            email: cartwheel_core::Email::parse("ada@example.com").unwrap(),
            role: UserRole::Admin,
            phone: None,
            address: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let jwt = service("k7#Qp2$vLm9!xRt4@wZn6^bYc8&dHf3*");
        let token = jwt.issue(&user()).unwrap();
        let claims = jwt.verify(&token).unwrap();

        assert_eq!(claims.user_id().unwrap(), UserId::new(42));
        assert_eq!(claims.email, "ada@example.com");
        assert_eq!(claims.role, UserRole::Admin);
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn test_expired_token_rejected() {
        let jwt = service("k7#Qp2$vLm9!xRt4@wZn6^bYc8&dHf3*");
        let now = Utc::now().timestamp();
        let token = jwt
            .encode(&Claims {
                sub: "42".to_string(),
                email: "ada@example.com".to_string(),
                role: UserRole::Customer,
                iat: now - 7200,
                exp: now - 3600,
            })
            .unwrap();

        assert!(matches!(jwt.verify(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = service("k7#Qp2$vLm9!xRt4@wZn6^bYc8&dHf3*")
            .issue(&user())
            .unwrap();
        let other = service("a different secret of sufficient length!");

        assert!(matches!(other.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let jwt = service("k7#Qp2$vLm9!xRt4@wZn6^bYc8&dHf3*");
        let token = jwt.issue(&user()).unwrap();

        let mut parts: Vec<&str> = token.split('.').collect();
        let forged_payload = {
            let other = service("another secret that is long enough!!")
                .encode(&Claims {
                    sub: "1".to_string(),
                    email: "mallory@example.com".to_string(),
                    role: UserRole::Admin,
                    iat: 0,
                    exp: i64::from(i32::MAX),
                })
                .unwrap();
            other.split('.').nth(1).unwrap().to_string()
        };
        parts[1] = &forged_payload;

        assert!(matches!(
            jwt.verify(&parts.join(".")),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        let jwt = service("k7#Qp2$vLm9!xRt4@wZn6^bYc8&dHf3*");
        assert!(matches!(jwt.verify("not-a-token"), Err(AuthError::InvalidToken)));
    }
}
