//! Order domain types.

use chrono::{DateTime, Utc};

use gusturi_core::{OrderId, OrderStatus, Price, ProductId, UserId, VoucherId};

/// How the customer pays for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaymentMethod {
    /// Cash on delivery.
    #[default]
    CashOnDelivery,
    Card,
}

impl PaymentMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CashOnDelivery => "ramburs",
            Self::Card => "card",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CashOnDelivery => "Ramburs la livrare",
            Self::Card => "Card bancar",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ramburs" => Ok(Self::CashOnDelivery),
            "card" => Ok(Self::Card),
            _ => Err(format!("invalid payment method: {s}")),
        }
    }
}

/// Shipping details captured when the order was placed.
///
/// A snapshot: later profile edits do not change where an order was sent.
#[derive(Debug, Clone, Default)]
pub struct ShippingDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub county: String,
    pub postal_code: Option<String>,
}

/// One row of an order history listing.
#[derive(Debug, Clone)]
pub struct OrderSummary {
    pub id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
    pub total: Price,
    pub placed_at: DateTime<Utc>,
    pub item_count: i64,
}

/// A full order with its shipping snapshot and status timeline.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: Option<UserId>,
    pub status: OrderStatus,
    pub subtotal: Price,
    pub discount: Price,
    pub shipping_cost: Price,
    pub total: Price,
    pub payment_method: PaymentMethod,
    pub shipping: ShippingDetails,
    pub notes: Option<String>,
    pub voucher_code: Option<String>,
    pub tracking_number: Option<String>,
    pub placed_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// A line item of an order, priced at placement time.
#[derive(Debug, Clone)]
pub struct OrderLine {
    /// `None` once the product has been removed from the catalogue.
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub unit_price: Price,
    pub quantity: i32,
    pub subtotal: Price,
    pub image: Option<String>,
}

/// An order ready to be inserted, priced by checkout.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub user_id: UserId,
    pub subtotal: Price,
    pub discount: Price,
    pub shipping_cost: Price,
    pub total: Price,
    pub payment_method: PaymentMethod,
    pub shipping: ShippingDetails,
    pub notes: Option<String>,
    pub voucher_id: Option<VoucherId>,
}

/// A past order line checked against the product's current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderItem {
    /// `None` once the product has been removed from the catalogue.
    pub product_id: Option<ProductId>,
    pub name: String,
    pub requested: i32,
    pub stock: i32,
    pub active: bool,
}
