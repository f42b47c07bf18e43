//! Audit log entry.

use chrono::{DateTime, Utc};

use gusturi_core::UserId;

/// A recorded security-relevant action.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: i64,
    pub user_id: Option<UserId>,
    /// Name of the acting user, if the account still exists.
    pub user_name: Option<String>,
    pub action: String,
    pub details: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}
