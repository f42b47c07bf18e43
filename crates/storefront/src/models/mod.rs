//! Domain models for the storefront.
//!
//! These are validated domain objects, separate from the database row types
//! in [`crate::db`].

pub mod audit;
pub mod cart;
pub mod dashboard;
pub mod order;
pub mod product;
pub mod session;
pub mod user;
pub mod voucher;

pub use audit::AuditEntry;
pub use cart::{Cart, CartLine, ReorderShortfall};
pub use dashboard::{DashboardStats, LowStockProduct, RecentOrder};
pub use order::{
    NewOrder, Order, OrderLine, OrderSummary, PaymentMethod, ReorderItem, ShippingDetails,
};
pub use product::Product;
pub use session::{CurrentUser, keys as session_keys};
pub use user::{LoyaltyBalance, NewUser, ProfileUpdate, User, UserUpdate};
pub use voucher::Voucher;
