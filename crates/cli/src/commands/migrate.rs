//! Database migration command.
//!
//! Migrations live in `crates/api/migrations/` and are embedded in the API
//! library. The server never runs them on startup.

use cartwheel_api::db;

use super::{CliError, connect};

/// Apply all pending migrations.
///
/// # Errors
///
/// Returns `CliError` if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CliError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    db::run_migrations(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
