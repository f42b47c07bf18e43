//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Signup, login, password changes and password reset
//! - `orders` - Order history, cancellation, reorder and checkout
//! - `cart` - Cart edits checked against stock
//! - `admin` - Back-office account management
//! - `audit` - Audit log writer

pub mod admin;
pub mod audit;
pub mod auth;
pub mod cart;
pub mod orders;

pub use admin::{AdminError, AdminService};
pub use audit::AuditLog;
pub use auth::{AuthError, AuthService};
pub use cart::{CartError, CartService};
pub use orders::{OrderError, OrderService};

/// Trim a form field, mapping blank input to `None`.
#[must_use]
pub fn optional_field(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
