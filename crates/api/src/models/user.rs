//! User domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use cartwheel_core::{Email, UserId, UserRole};

use super::{CurrentUser, ShippingAddress};

/// A registered account (domain type).
///
/// The password hash never leaves the repository layer.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Login email, lowercased.
    pub email: Email,
    /// Account role.
    pub role: UserRole,
    /// Contact phone number.
    pub phone: Option<String>,
    /// Default shipping address.
    pub address: Option<ShippingAddress>,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
        }
    }
}

/// Fields a user may change on their own profile.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<Email>,
    pub phone: Option<String>,
    pub address: Option<ShippingAddress>,
}
