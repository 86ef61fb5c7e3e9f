//! Cartwheel Core - Shared domain types.
//!
//! This crate provides the types shared by every Cartwheel component:
//! - `api` - The REST service (catalog, cart, orders, payments, admin)
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Order arithmetic and the order status transition
//! table live here so they can be tested without a database.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, emails, money arithmetic, and status enums

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
