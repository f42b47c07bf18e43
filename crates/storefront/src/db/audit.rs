//! Audit log repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use gusturi_core::UserId;

use super::RepositoryError;
use crate::models::AuditEntry;

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    id: i64,
    user_id: Option<UserId>,
    user_name: Option<String>,
    action: String,
    details: Option<String>,
    ip: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<AuditRow> for AuditEntry {
    fn from(row: AuditRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            user_name: row.user_name,
            action: row.action,
            details: row.details,
            ip: row.ip,
            user_agent: row.user_agent,
            created_at: row.created_at,
        }
    }
}

/// Repository for the append-only audit log.
pub struct AuditRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AuditRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append an entry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert(
        &self,
        user_id: Option<UserId>,
        action: &str,
        details: Option<&str>,
        ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shop.audit_log (user_id, action, details, ip, user_agent)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(user_id)
        .bind(action)
        .bind(details)
        .bind(ip)
        .bind(user_agent)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// The most recent entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn recent(&self, limit: i64) -> Result<Vec<AuditEntry>, RepositoryError> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r"
            SELECT a.id, a.user_id, u.name AS user_name, a.action, a.details,
                   a.ip, a.user_agent, a.created_at
            FROM shop.audit_log a
            LEFT JOIN shop.user u ON u.id = a.user_id
            ORDER BY a.created_at DESC, a.id DESC
            LIMIT $1
            ",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
