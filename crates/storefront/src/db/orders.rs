//! Order repository for database operations.
//!
//! Every customer-facing read is scoped to the requesting user, so a foreign
//! order ID behaves exactly like a missing one.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use gusturi_core::{OrderId, OrderStatus, Price, ProductId, UserId};

use super::RepositoryError;
use crate::models::{NewOrder, Order, OrderLine, OrderSummary, ReorderItem, ShippingDetails};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderSummaryRow {
    id: OrderId,
    order_number: String,
    status: OrderStatus,
    total: Price,
    placed_at: DateTime<Utc>,
    item_count: i64,
}

impl From<OrderSummaryRow> for OrderSummary {
    fn from(row: OrderSummaryRow) -> Self {
        Self {
            id: row.id,
            order_number: row.order_number,
            status: row.status,
            total: row.total,
            placed_at: row.placed_at,
            item_count: row.item_count,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    order_number: String,
    user_id: Option<UserId>,
    status: OrderStatus,
    subtotal: Price,
    discount: Price,
    shipping_cost: Price,
    total: Price,
    payment_method: String,
    shipping_name: String,
    shipping_email: String,
    shipping_phone: String,
    shipping_address: String,
    shipping_city: String,
    shipping_county: String,
    shipping_postal_code: Option<String>,
    notes: Option<String>,
    voucher_code: Option<String>,
    tracking_number: Option<String>,
    placed_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let payment_method = row
            .payment_method
            .parse()
            .map_err(RepositoryError::DataCorruption)?;

        Ok(Self {
            id: row.id,
            order_number: row.order_number,
            user_id: row.user_id,
            status: row.status,
            subtotal: row.subtotal,
            discount: row.discount,
            shipping_cost: row.shipping_cost,
            total: row.total,
            payment_method,
            shipping: ShippingDetails {
                name: row.shipping_name,
                email: row.shipping_email,
                phone: row.shipping_phone,
                address: row.shipping_address,
                city: row.shipping_city,
                county: row.shipping_county,
                postal_code: row.shipping_postal_code,
            },
            notes: row.notes,
            voucher_code: row.voucher_code,
            tracking_number: row.tracking_number,
            placed_at: row.placed_at,
            confirmed_at: row.confirmed_at,
            shipped_at: row.shipped_at,
            delivered_at: row.delivered_at,
            cancelled_at: row.cancelled_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderLineRow {
    product_id: Option<ProductId>,
    product_name: String,
    unit_price: Price,
    quantity: i32,
    subtotal: Price,
    image: Option<String>,
}

impl From<OrderLineRow> for OrderLine {
    fn from(row: OrderLineRow) -> Self {
        Self {
            product_id: row.product_id,
            product_name: row.product_name,
            unit_price: row.unit_price,
            quantity: row.quantity,
            subtotal: row.subtotal,
            image: row.image,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReorderRow {
    product_id: Option<ProductId>,
    product_name: String,
    quantity: i32,
    stock: Option<i32>,
    active: Option<bool>,
}

impl From<ReorderRow> for ReorderItem {
    fn from(row: ReorderRow) -> Self {
        Self {
            product_id: row.product_id,
            name: row.product_name,
            requested: row.quantity,
            stock: row.stock.unwrap_or(0),
            active: row.active.unwrap_or(false),
        }
    }
}

/// Order number and status of an order locked for update.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LockedOrder {
    pub order_number: String,
    pub status: OrderStatus,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// A user's orders, newest first, optionally limited.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        limit: Option<i64>,
    ) -> Result<Vec<OrderSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderSummaryRow>(
            r"
            SELECT o.id, o.order_number, o.status, o.total, o.placed_at,
                   COUNT(oi.id) AS item_count
            FROM shop.order o
            LEFT JOIN shop.order_item oi ON oi.order_id = o.id
            WHERE o.user_id = $1
            GROUP BY o.id
            ORDER BY o.placed_at DESC, o.id DESC
            LIMIT $2
            ",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get one of a user's orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the payment method is unknown.
    pub async fn get_for_user(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            SELECT o.id, o.order_number, o.user_id, o.status, o.subtotal, o.discount,
                   o.shipping_cost, o.total, o.payment_method,
                   o.shipping_name, o.shipping_email, o.shipping_phone, o.shipping_address,
                   o.shipping_city, o.shipping_county, o.shipping_postal_code,
                   o.notes, v.code AS voucher_code, o.tracking_number,
                   o.placed_at, o.confirmed_at, o.shipped_at, o.delivered_at, o.cancelled_at
            FROM shop.order o
            LEFT JOIN shop.voucher v ON v.id = o.voucher_id
            WHERE o.id = $1 AND o.user_id = $2
            ",
        )
        .bind(order_id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Line items of an order, with the product image if the product still exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderLineRow>(
            r"
            SELECT oi.product_id, oi.product_name, oi.unit_price, oi.quantity, oi.subtotal,
                   p.image
            FROM shop.order_item oi
            LEFT JOIN shop.product p ON p.id = oi.product_id
            WHERE oi.order_id = $1
            ORDER BY oi.id
            ",
        )
        .bind(order_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    // =========================================================================
    // Transaction steps
    // =========================================================================

    /// Lock one of a user's orders for the rest of the transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock_for_user(
        conn: &mut PgConnection,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Option<LockedOrder>, RepositoryError> {
        let row = sqlx::query_as::<_, LockedOrder>(
            r"
            SELECT order_number, status
            FROM shop.order
            WHERE id = $1 AND user_id = $2
            FOR UPDATE
            ",
        )
        .bind(order_id)
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row)
    }

    /// Mark an order cancelled.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn mark_cancelled(
        conn: &mut PgConnection,
        order_id: OrderId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE shop.order SET status = 'cancelled', cancelled_at = now() WHERE id = $1",
        )
        .bind(order_id)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// An order's lines joined with current product state.
    ///
    /// Lock the products first with
    /// [`ProductRepository::lock_for_order`](super::ProductRepository::lock_for_order).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn reorder_items(
        conn: &mut PgConnection,
        order_id: OrderId,
    ) -> Result<Vec<ReorderItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, ReorderRow>(
            r"
            SELECT oi.product_id, oi.product_name, oi.quantity, p.stock, p.active
            FROM shop.order_item oi
            LEFT JOIN shop.product p ON p.id = oi.product_id
            WHERE oi.order_id = $1
            ORDER BY oi.id
            ",
        )
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Insert an order header.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` on an order number collision.
    pub async fn insert(conn: &mut PgConnection, order: &NewOrder) -> Result<OrderId, RepositoryError> {
        let id = sqlx::query_scalar::<_, OrderId>(
            r"
            INSERT INTO shop.order (
                order_number, user_id, status, subtotal, discount, shipping_cost, total,
                payment_method, shipping_name, shipping_email, shipping_phone,
                shipping_address, shipping_city, shipping_county, shipping_postal_code,
                notes, voucher_id
            )
            VALUES ($1, $2, 'placed', $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING id
            ",
        )
        .bind(&order.order_number)
        .bind(order.user_id)
        .bind(order.subtotal)
        .bind(order.discount)
        .bind(order.shipping_cost)
        .bind(order.total)
        .bind(order.payment_method.as_str())
        .bind(&order.shipping.name)
        .bind(&order.shipping.email)
        .bind(&order.shipping.phone)
        .bind(&order.shipping.address)
        .bind(&order.shipping.city)
        .bind(&order.shipping.county)
        .bind(&order.shipping.postal_code)
        .bind(&order.notes)
        .bind(order.voucher_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| RepositoryError::from_unique_violation(e, "order number"))?;

        Ok(id)
    }

    /// Insert one line item of an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert_line(
        conn: &mut PgConnection,
        order_id: OrderId,
        line: &OrderLine,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shop.order_item
                (order_id, product_id, product_name, unit_price, quantity, subtotal)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(order_id)
        .bind(line.product_id)
        .bind(&line.product_name)
        .bind(line.unit_price)
        .bind(line.quantity)
        .bind(line.subtotal)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}
