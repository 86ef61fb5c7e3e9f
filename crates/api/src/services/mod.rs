//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Registration, login, profiles and bearer tokens
//! - `orders` - Order placement, cancellation and status changes
//! - `stripe` - Payment intents and webhook handling
//! - `images` - Product image uploads to Cloudinary

pub mod auth;
pub mod images;
pub mod orders;
pub mod stripe;
