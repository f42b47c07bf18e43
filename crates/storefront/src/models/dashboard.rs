//! Back-office dashboard figures.

use chrono::{DateTime, Utc};

use gusturi_core::{OrderId, OrderStatus, Price, ProductId};

/// Store-wide totals.
#[derive(Debug, Clone, Default)]
pub struct DashboardStats {
    pub clients: i64,
    pub orders: i64,
    pub products: i64,
    /// Sum of order totals, excluding cancelled orders.
    pub revenue: Price,
}

/// A recently placed order with the client's name.
#[derive(Debug, Clone)]
pub struct RecentOrder {
    pub id: OrderId,
    pub order_number: String,
    /// `None` when the client account has been deleted.
    pub client_name: Option<String>,
    pub total: Price,
    pub status: OrderStatus,
    pub placed_at: DateTime<Utc>,
}

/// An active product running low on stock.
#[derive(Debug, Clone)]
pub struct LowStockProduct {
    pub id: ProductId,
    pub code: String,
    pub name: String,
    pub stock: i32,
}
