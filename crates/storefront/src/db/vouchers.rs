//! Voucher repository.

use rust_decimal::Decimal;
use sqlx::PgConnection;

use gusturi_core::{DiscountType, VoucherId};

use super::RepositoryError;
use crate::models::Voucher;

#[derive(Debug, sqlx::FromRow)]
struct VoucherRow {
    id: VoucherId,
    code: String,
    discount_value: Decimal,
    discount_type: DiscountType,
}

impl From<VoucherRow> for Voucher {
    fn from(row: VoucherRow) -> Self {
        Self {
            id: row.id,
            code: row.code,
            value: row.discount_value,
            discount_type: row.discount_type,
        }
    }
}

/// Voucher lookups. Vouchers are only read during checkout.
pub struct VoucherRepository;

impl VoucherRepository {
    /// Find an active voucher by code (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_active(
        conn: &mut PgConnection,
        code: &str,
    ) -> Result<Option<Voucher>, RepositoryError> {
        let row = sqlx::query_as::<_, VoucherRow>(
            r"
            SELECT id, code, discount_value, discount_type
            FROM shop.voucher
            WHERE upper(code) = upper($1) AND active
            ",
        )
        .bind(code.trim())
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(Into::into))
    }
}
