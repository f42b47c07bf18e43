//! Product repository: catalogue reads and stock movements.
//!
//! Stock only changes inside a transaction that first locks the affected
//! product rows, always in ascending ID order.

use sqlx::{PgConnection, PgPool};

use gusturi_core::{OrderId, Price, ProductId, UserId};

use super::RepositoryError;
use crate::models::{CartLine, Product};

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    code: String,
    name: String,
    price: Price,
    stock: i32,
    active: bool,
    image: Option<String>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            code: row.code,
            name: row.name,
            price: row.price,
            stock: row.stock,
            active: row.active,
            image: row.image,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct CartLineRow {
    product_id: ProductId,
    code: String,
    name: String,
    price: Price,
    quantity: i32,
    stock: i32,
    active: bool,
    image: Option<String>,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        Self {
            product_id: row.product_id,
            code: row.code,
            name: row.name,
            unit_price: row.price,
            quantity: row.quantity,
            stock: row.stock,
            active: row.active,
            image: row.image,
        }
    }
}

/// Repository for catalogue products.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT id, code, name, price, stock, active, image FROM shop.product WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Insert a product unless its code already exists.
    ///
    /// Returns `true` if a row was inserted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert_if_absent(
        &self,
        code: &str,
        name: &str,
        price: Price,
        stock: i32,
        image: Option<&str>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            INSERT INTO shop.product (code, name, price, stock, image)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (code) DO NOTHING
            ",
        )
        .bind(code)
        .bind(name)
        .bind(price)
        .bind(stock)
        .bind(image)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Transaction steps
    // =========================================================================

    /// Lock every product referenced by an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock_for_order(
        conn: &mut PgConnection,
        order_id: OrderId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            SELECT id FROM shop.product
            WHERE id IN (SELECT product_id FROM shop.order_item WHERE order_id = $1)
            ORDER BY id
            FOR UPDATE
            ",
        )
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(())
    }

    /// Lock the products in a user's cart and return the cart lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock_cart_lines(
        conn: &mut PgConnection,
        user_id: UserId,
    ) -> Result<Vec<CartLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT c.product_id, p.code, p.name, p.price, c.quantity, p.stock, p.active, p.image
            FROM shop.cart_item c
            JOIN shop.product p ON p.id = c.product_id
            WHERE c.user_id = $1
            ORDER BY p.id
            FOR UPDATE OF p
            ",
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Put an order's quantities back into stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn restore_stock_for_order(
        conn: &mut PgConnection,
        order_id: OrderId,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE shop.product p
            SET stock = p.stock + oi.quantity
            FROM (
                SELECT product_id, SUM(quantity)::INTEGER AS quantity
                FROM shop.order_item
                WHERE order_id = $1 AND product_id IS NOT NULL
                GROUP BY product_id
            ) oi
            WHERE p.id = oi.product_id
            ",
        )
        .bind(order_id)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Take `quantity` units out of stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if there is not enough stock.
    pub async fn decrement_stock(
        conn: &mut PgConnection,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.product SET stock = stock - $2 WHERE id = $1 AND stock >= $2",
        )
        .bind(product_id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!(
                "insufficient stock for product {product_id}"
            )));
        }
        Ok(())
    }
}
