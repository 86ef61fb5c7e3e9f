//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `API_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//! - `JWT_SECRET` - Token signing secret (min 32 chars, high entropy)
//! - `STRIPE_SECRET_KEY` - Stripe secret API key
//! - `STRIPE_WEBHOOK_SECRET` - Stripe webhook endpoint signing secret
//!
//! ## Optional
//! - `API_HOST` - Bind address (default: 127.0.0.1)
//! - `API_PORT` - Listen port (default: 5000)
//! - `JWT_EXPIRATION_DAYS` - Token lifetime in days (default: 7)
//! - `STRIPE_PUBLISHABLE_KEY` - Returned to clients by `/api/payment/config`
//! - `STRIPE_CURRENCY` - ISO currency for payment intents (default: usd)
//! - `CLOUDINARY_CLOUD_NAME`, `CLOUDINARY_API_KEY`, `CLOUDINARY_API_SECRET` -
//!   Product image hosting; uploads are disabled unless all three are set
//! - `CORS_ORIGIN` - Allowed browser origin (default: any)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `LOG_FORMAT` - `json` for JSON log lines, anything else for text

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_JWT_EXPIRATION_DAYS: i64 = 7;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "your_",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "insert",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// JWT signing configuration
    pub jwt: JwtConfig,
    /// Stripe payment configuration
    pub stripe: StripeConfig,
    /// Cloudinary image hosting (None disables uploads)
    pub cloudinary: Option<CloudinaryConfig>,
    /// Allowed CORS origin (None allows any)
    pub cors_origin: Option<String>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Emit JSON log lines
    pub log_json: bool,
}

/// JWT signing configuration.
#[derive(Clone)]
pub struct JwtConfig {
    /// HMAC secret for HS256
    pub secret: SecretString,
    /// Token lifetime in days
    pub expiration_days: i64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[REDACTED]")
            .field("expiration_days", &self.expiration_days)
            .finish()
    }
}

/// Stripe configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (`sk_...`)
    pub secret_key: SecretString,
    /// Webhook signing secret (`whsec_...`)
    pub webhook_secret: SecretString,
    /// Publishable key (`pk_...`), safe to expose to browsers
    pub publishable_key: Option<String>,
    /// Lowercase ISO 4217 currency code
    pub currency: String,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("publishable_key", &self.publishable_key)
            .field("currency", &self.currency)
            .finish()
    }
}

/// Cloudinary configuration.
#[derive(Clone)]
pub struct CloudinaryConfig {
    /// Cloud name (part of the upload URL)
    pub cloud_name: String,
    /// API key (sent in the clear with each upload)
    pub api_key: String,
    /// API secret (used only to sign uploads)
    pub api_secret: SecretString,
}

impl std::fmt::Debug for CloudinaryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("API_DATABASE_URL")?;
        let host = get_env_or_default("API_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("API_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("API_PORT", "5000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("API_PORT".to_string(), e.to_string()))?;

        Ok(Self {
            database_url,
            host,
            port,
            jwt: JwtConfig::from_env()?,
            stripe: StripeConfig::from_env()?,
            cloudinary: CloudinaryConfig::from_env(),
            cors_origin: get_optional_env("CORS_ORIGIN"),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            log_json: get_optional_env("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl JwtConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let secret = get_validated_secret("JWT_SECRET")?;
        validate_secret_length(&secret, "JWT_SECRET")?;

        let expiration_days = match get_optional_env("JWT_EXPIRATION_DAYS") {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|days| *days > 0)
                .ok_or_else(|| {
                    ConfigError::InvalidEnvVar(
                        "JWT_EXPIRATION_DAYS".to_string(),
                        format!("expected a positive integer, got {raw:?}"),
                    )
                })?,
            None => DEFAULT_JWT_EXPIRATION_DAYS,
        };

        Ok(Self {
            secret,
            expiration_days,
        })
    }
}

impl StripeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            secret_key: get_validated_secret("STRIPE_SECRET_KEY")?,
            webhook_secret: get_validated_secret("STRIPE_WEBHOOK_SECRET")?,
            publishable_key: get_optional_env("STRIPE_PUBLISHABLE_KEY"),
            currency: get_env_or_default("STRIPE_CURRENCY", "usd").to_lowercase(),
        })
    }
}

impl CloudinaryConfig {
    fn from_env() -> Option<Self> {
        let cloud_name = get_optional_env("CLOUDINARY_CLOUD_NAME")?;
        let api_key = get_optional_env("CLOUDINARY_API_KEY")?;
        let api_secret = get_optional_env("CLOUDINARY_API_SECRET")?;

        Some(Self {
            cloud_name,
            api_key,
            api_secret: SecretString::from(api_secret),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional, non-empty environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("sk_test_your-key-here", "STRIPE_SECRET_KEY");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength(&"a".repeat(40), "JWT_SECRET");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_stripe_style_key() {
        let result = validate_secret_strength("sk_test_51Hx9aQ2eZvKYlo2C8pR3tWm7", "STRIPE_SECRET_KEY");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_secret_length() {
        assert!(validate_secret_length(&SecretString::from("short"), "JWT_SECRET").is_err());
        assert!(validate_secret_length(&SecretString::from("k".repeat(32)), "JWT_SECRET").is_ok());
    }

    #[test]
    fn test_socket_addr() {
        let config = ApiConfig {
            database_url: SecretString::from("postgres://localhost/cartwheel"),
            host: "0.0.0.0".parse().unwrap(),
            port: 5000,
            jwt: JwtConfig {
                secret: SecretString::from("j".repeat(32)),
                expiration_days: 7,
            },
            stripe: StripeConfig {
                secret_key: SecretString::from("sk"),
                webhook_secret: SecretString::from("whsec"),
                publishable_key: None,
                currency: "usd".to_string(),
            },
            cloudinary: None,
            cors_origin: None,
            sentry_dsn: None,
            sentry_environment: None,
            log_json: false,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.to_string(), "0.0.0.0:5000");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let stripe = StripeConfig {
            secret_key: SecretString::from("sk_live_supersecretvalue"),
            webhook_secret: SecretString::from("whsec_supersecretvalue"),
            publishable_key: Some("pk_live_visible".to_string()),
            currency: "usd".to_string(),
        };
        let cloudinary = CloudinaryConfig {
            cloud_name: "demo-cloud".to_string(),
            api_key: "123456".to_string(),
            api_secret: SecretString::from("cloudinary_hidden_secret"),
        };
        let jwt = JwtConfig {
            secret: SecretString::from("jwt_hidden_secret_value"),
            expiration_days: 7,
        };

        let output = format!("{stripe:?} {cloudinary:?} {jwt:?}");
        assert!(output.contains("pk_live_visible"));
        assert!(output.contains("demo-cloud"));
        assert!(output.contains("[REDACTED]"));
        assert!(!output.contains("supersecretvalue"));
        assert!(!output.contains("cloudinary_hidden_secret"));
        assert!(!output.contains("jwt_hidden_secret_value"));
    }
}
