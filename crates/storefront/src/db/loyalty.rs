//! Loyalty points repository.

use sqlx::{PgConnection, PgPool};

use gusturi_core::UserId;

use super::RepositoryError;
use crate::models::LoyaltyBalance;

#[derive(Debug, sqlx::FromRow)]
struct LoyaltyRow {
    total: i32,
    used: i32,
}

/// Repository for loyalty point balances.
pub struct LoyaltyRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> LoyaltyRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user's balance. Users without a row have an empty balance.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, user_id: UserId) -> Result<LoyaltyBalance, RepositoryError> {
        let row = sqlx::query_as::<_, LoyaltyRow>(
            "SELECT total, used FROM shop.loyalty_points WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map_or_else(LoyaltyBalance::default, |r| LoyaltyBalance {
            total: r.total,
            used: r.used,
        }))
    }

    /// Create an empty balance for a new account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_empty(conn: &mut PgConnection, user_id: UserId) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO shop.loyalty_points (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}
