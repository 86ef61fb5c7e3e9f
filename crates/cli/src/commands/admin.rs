//! Admin role management.
//!
//! Accounts are created through `POST /api/auth/register`; these commands
//! only change the role of an existing account.

use cartwheel_api::db::{RepositoryError, UserRepository};
use cartwheel_core::{Email, UserRole};

use super::{CliError, connect};

/// Give the account with this email the admin role.
///
/// # Errors
///
/// Returns `CliError::UserNotFound` if no account has the email.
pub async fn promote(email: &str) -> Result<(), CliError> {
    set_role(email, UserRole::Admin).await
}

/// Return the account with this email to the customer role.
///
/// # Errors
///
/// Returns `CliError::UserNotFound` if no account has the email.
pub async fn demote(email: &str) -> Result<(), CliError> {
    set_role(email, UserRole::Customer).await
}

async fn set_role(email: &str, role: UserRole) -> Result<(), CliError> {
    let email = Email::parse(email).map_err(|e| CliError::InvalidEmail(e.to_string()))?;
    let pool = connect().await?;

    let user = UserRepository::new(&pool)
        .set_role_by_email(&email, role)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => CliError::UserNotFound(email.to_string()),
            other => other.into(),
        })?;

    tracing::info!(
        "Role updated! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role
    );
    Ok(())
}
