//! Product image hosting on Cloudinary.
//!
//! Uploads are signed server-side: the signature is the SHA-256 hex digest
//! of the alphabetically sorted `key=value` parameters joined by `&`, with
//! the API secret appended. `file`, `api_key` and `signature_algorithm`
//! are sent but not signed.

use reqwest::Client;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::CloudinaryConfig;

/// Largest accepted image, in bytes.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Folder product images are stored under.
const UPLOAD_FOLDER: &str = "cartwheel/products";

/// Errors that can occur when uploading images.
#[derive(Debug, Error)]
pub enum ImageError {
    /// Upload is not an image or too large.
    #[error("invalid image: {0}")]
    Invalid(String),

    /// Image hosting is not configured.
    #[error("image uploads are not configured")]
    NotConfigured,

    /// HTTP request failed.
    #[error("Cloudinary request failed: {0}")]
    Request(String),

    /// Cloudinary rejected the upload.
    #[error("Cloudinary API error ({status}): {message}")]
    Api { status: u16, message: String },
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Cloudinary upload client.
#[derive(Clone)]
pub struct ImageUploader {
    client: Client,
    cloud_name: String,
    api_key: String,
    api_secret: SecretString,
    base_url: String,
}

impl std::fmt::Debug for ImageUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageUploader")
            .field("cloud_name", &self.cloud_name)
            .field("api_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl ImageUploader {
    /// Create an uploader sharing an HTTP client.
    #[must_use]
    pub fn new(client: Client, config: &CloudinaryConfig) -> Self {
        Self {
            client,
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            base_url: "https://api.cloudinary.com/v1_1".to_string(),
        }
    }

    /// Upload an image and return its HTTPS URL.
    ///
    /// # Errors
    ///
    /// Returns `ImageError::Invalid` for non-image or oversized uploads, and
    /// `Request`/`Api` when Cloudinary fails.
    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn upload(
        &self,
        file_name: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<String, ImageError> {
        validate_image(content_type, data.len())?;

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign_params(
            &[("folder", UPLOAD_FOLDER), ("timestamp", &timestamp)],
            &self.api_secret,
        );

        let part = Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .map_err(|e| ImageError::Invalid(e.to_string()))?;

        let form = Form::new()
            .part("file", part)
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", UPLOAD_FOLDER)
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        let response = self
            .client
            .post(format!("{}/{}/image/upload", self.base_url, self.cloud_name))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ImageError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorResponse>()
                .await
                .map_or_else(|e| e.to_string(), |body| body.error.message);
            return Err(ImageError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| ImageError::Request(e.to_string()))?;

        debug!(url = %body.secure_url, "Image uploaded");

        Ok(body.secure_url)
    }
}

/// Check content type and size before uploading.
///
/// # Errors
///
/// Returns `ImageError::Invalid` describing the problem.
pub fn validate_image(content_type: &str, size: usize) -> Result<(), ImageError> {
    if !content_type.starts_with("image/") {
        return Err(ImageError::Invalid(format!(
            "unsupported content type {content_type}"
        )));
    }
    if size == 0 {
        return Err(ImageError::Invalid("file is empty".to_string()));
    }
    if size > MAX_IMAGE_BYTES {
        return Err(ImageError::Invalid("file exceeds 5 MiB".to_string()));
    }
    Ok(())
}

/// Sign upload parameters: sort by key, join as `k=v&k=v`, append the
/// secret, SHA-256, hex.
fn sign_params(params: &[(&str, &str)], secret: &SecretString) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by_key(|(key, _)| *key);

    let to_sign = sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(secret.expose_secret().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sha256_hex(input: &str) -> String {
        hex::encode(Sha256::digest(input.as_bytes()))
    }

    #[test]
    fn test_signature_sorts_params() {
        let secret = SecretString::from("abcd".to_string());
        let expected = sha256_hex("eager=w_400&folder=shop&timestamp=1315060510abcd");

        let unsorted = sign_params(
            &[("timestamp", "1315060510"), ("folder", "shop"), ("eager", "w_400")],
            &secret,
        );
        let sorted = sign_params(
            &[("eager", "w_400"), ("folder", "shop"), ("timestamp", "1315060510")],
            &secret,
        );

        assert_eq!(unsorted, expected);
        assert_eq!(sorted, expected);
    }

    #[test]
    fn test_signature_depends_on_secret() {
        let params = [("timestamp", "1")];
        assert_ne!(
            sign_params(&params, &SecretString::from("a".to_string())),
            sign_params(&params, &SecretString::from("b".to_string()))
        );
    }

    #[test]
    fn test_validate_image() {
        assert!(validate_image("image/png", 1024).is_ok());
        assert!(validate_image("image/jpeg", MAX_IMAGE_BYTES).is_ok());
        assert!(validate_image("application/pdf", 1024).is_err());
        assert!(validate_image("image/png", 0).is_err());
        assert!(validate_image("image/png", MAX_IMAGE_BYTES + 1).is_err());
    }
}
