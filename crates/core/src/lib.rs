//! Gusturi Românești Core - Shared domain types.
//!
//! This crate provides the types shared by every Gusturi Românești component:
//! - `storefront` - Customer pages and the admin back-office
//! - `cli` - Migrations, admin bootstrap and catalogue seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure business rules - no I/O, no
//! database access, no HTTP. Database encoding is opt-in through the
//! `postgres` feature.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, emails, prices and the order/user status enums

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
