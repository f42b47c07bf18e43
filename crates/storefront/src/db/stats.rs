//! Back-office dashboard queries.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use gusturi_core::{OrderId, OrderStatus, Price, ProductId};

use super::RepositoryError;
use crate::models::{DashboardStats, LowStockProduct, RecentOrder};

#[derive(Debug, sqlx::FromRow)]
struct StatsRow {
    clients: i64,
    orders: i64,
    products: i64,
    revenue: Price,
}

#[derive(Debug, sqlx::FromRow)]
struct RecentOrderRow {
    id: OrderId,
    order_number: String,
    client_name: Option<String>,
    total: Price,
    status: OrderStatus,
    placed_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct LowStockRow {
    id: ProductId,
    code: String,
    name: String,
    stock: i32,
}

/// Read-only aggregate queries for the admin dashboard.
pub struct StatsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StatsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Client, order and product counts, and revenue from non-cancelled orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn totals(&self) -> Result<DashboardStats, RepositoryError> {
        let row = sqlx::query_as::<_, StatsRow>(
            r"
            SELECT
                (SELECT COUNT(*) FROM shop.user WHERE role = 'client') AS clients,
                (SELECT COUNT(*) FROM shop.order) AS orders,
                (SELECT COUNT(*) FROM shop.product) AS products,
                (SELECT COALESCE(SUM(total), 0) FROM shop.order WHERE status <> 'cancelled')
                    AS revenue
            ",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(DashboardStats {
            clients: row.clients,
            orders: row.orders,
            products: row.products,
            revenue: row.revenue,
        })
    }

    /// The most recently placed orders with the client's name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn recent_orders(&self, limit: i64) -> Result<Vec<RecentOrder>, RepositoryError> {
        let rows = sqlx::query_as::<_, RecentOrderRow>(
            r"
            SELECT o.id, o.order_number, u.name AS client_name, o.total, o.status, o.placed_at
            FROM shop.order o
            LEFT JOIN shop.user u ON u.id = o.user_id
            ORDER BY o.placed_at DESC, o.id DESC
            LIMIT $1
            ",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| RecentOrder {
                id: r.id,
                order_number: r.order_number,
                client_name: r.client_name,
                total: r.total,
                status: r.status,
                placed_at: r.placed_at,
            })
            .collect())
    }

    /// Active products with stock below `threshold`, lowest stock first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn low_stock(
        &self,
        threshold: i32,
        limit: i64,
    ) -> Result<Vec<LowStockProduct>, RepositoryError> {
        let rows = sqlx::query_as::<_, LowStockRow>(
            r"
            SELECT id, code, name, stock
            FROM shop.product
            WHERE active AND stock < $1
            ORDER BY stock ASC, id ASC
            LIMIT $2
            ",
        )
        .bind(threshold)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| LowStockProduct {
                id: r.id,
                code: r.code,
                name: r.name,
                stock: r.stock,
            })
            .collect())
    }
}
