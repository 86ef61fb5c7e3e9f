//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::db::{AnalyticsRepository, RepositoryError};
use crate::models::analytics::DashboardStats;
use crate::services::auth::JwtService;
use crate::services::images::ImageUploader;
use crate::services::stripe::StripeClient;

/// How long dashboard statistics are served from memory.
const DASHBOARD_TTL: Duration = Duration::from_secs(60);

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    jwt: JwtService,
    stripe: StripeClient,
    images: Option<ImageUploader>,
    dashboard: Cache<(), DashboardStats>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The pool may be lazy (`PgPool::connect_lazy`); nothing here touches
    /// the database.
    #[must_use]
    pub fn new(config: ApiConfig, pool: PgPool) -> Self {
        let http = reqwest::Client::new();
        let jwt = JwtService::new(&config.jwt);
        let stripe = StripeClient::new(http.clone(), &config.stripe);
        let images = config
            .cloudinary
            .as_ref()
            .map(|cloudinary| ImageUploader::new(http, cloudinary));

        let dashboard = Cache::builder()
            .max_capacity(1)
            .time_to_live(DASHBOARD_TTL)
            .build();

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                jwt,
                stripe,
                images,
                dashboard,
            }),
        }
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the token service.
    #[must_use]
    pub fn jwt(&self) -> &JwtService {
        &self.inner.jwt
    }

    /// Get a reference to the Stripe client.
    #[must_use]
    pub fn stripe(&self) -> &StripeClient {
        &self.inner.stripe
    }

    /// Get the image uploader, if Cloudinary is configured.
    #[must_use]
    pub fn images(&self) -> Option<&ImageUploader> {
        self.inner.images.as_ref()
    }

    /// Dashboard statistics, cached for 60 seconds.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the statistics have to be recomputed and
    /// a query fails.
    pub async fn dashboard_stats(&self) -> Result<DashboardStats, RepositoryError> {
        if let Some(stats) = self.inner.dashboard.get(&()).await {
            return Ok(stats);
        }

        let stats = AnalyticsRepository::new(self.pool()).dashboard().await?;
        self.inner.dashboard.insert((), stats.clone()).await;
        Ok(stats)
    }
}
