//! Audit log writer.
//!
//! Records who did what from where. Writing an entry must never fail the
//! action being audited, so errors are logged and swallowed.

use sqlx::PgPool;

use gusturi_core::UserId;

use crate::db::AuditRepository;
use crate::middleware::ClientInfo;

/// Actions written to the audit log.
pub mod actions {
    pub const REGISTER: &str = "register";
    pub const LOGIN: &str = "login";
    pub const LOGOUT: &str = "logout";
    pub const PROFILE_UPDATE: &str = "profile_update";
    pub const PASSWORD_CHANGE: &str = "password_change";
    pub const PASSWORD_RESET_REQUEST: &str = "password_reset_request";
    pub const PASSWORD_RESET: &str = "password_reset";
    pub const ORDER_PLACE: &str = "order_place";
    pub const ORDER_CANCEL: &str = "order_cancel";
    pub const REORDER: &str = "reorder";
    pub const USER_UPDATE: &str = "user_update";
    pub const USER_DELETE: &str = "user_delete";
}

/// Append-only audit log.
pub struct AuditLog<'a> {
    repo: AuditRepository<'a>,
}

impl<'a> AuditLog<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            repo: AuditRepository::new(pool),
        }
    }

    /// Record an action. Failures are logged at `warn` and otherwise ignored.
    pub async fn record(
        &self,
        user_id: Option<UserId>,
        action: &str,
        details: Option<&str>,
        client: &ClientInfo,
    ) {
        let ip = client.ip_string();
        if let Err(e) = self
            .repo
            .insert(
                user_id,
                action,
                details,
                ip.as_deref(),
                client.user_agent.as_deref(),
            )
            .await
        {
            tracing::warn!(error = %e, action, user_id = ?user_id, "Failed to write audit log entry");
        }
    }
}
