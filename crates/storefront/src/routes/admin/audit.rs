//! Audit log viewer.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};

use crate::db::AuditRepository;
use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireAdmin;
use crate::models::{AuditEntry, CurrentUser};
use crate::routes::{MessageQuery, format_datetime};
use crate::state::AppState;

/// Entries shown on the audit page.
const AUDIT_PAGE_SIZE: i64 = 100;

/// One audit log row.
pub struct AuditEntryView {
    pub created_at: String,
    pub user: String,
    pub action: String,
    pub details: String,
    pub ip: String,
    pub user_agent: String,
}

impl From<&AuditEntry> for AuditEntryView {
    fn from(entry: &AuditEntry) -> Self {
        let user = match (&entry.user_name, entry.user_id) {
            (Some(name), Some(id)) => format!("{name} (#{id})"),
            (None, Some(id)) => format!("#{id}"),
            _ => String::new(),
        };

        Self {
            created_at: format_datetime(entry.created_at),
            user,
            action: entry.action.clone(),
            details: entry.details.clone().unwrap_or_default(),
            ip: entry.ip.clone().unwrap_or_default(),
            user_agent: entry.user_agent.clone().unwrap_or_default(),
        }
    }
}

/// Audit log template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/audit.html")]
pub struct AuditTemplate {
    pub viewer: Option<CurrentUser>,
    pub current_path: &'static str,
    pub error: Option<String>,
    pub success: Option<String>,
    pub entries: Vec<AuditEntryView>,
}

/// Display the most recent audit entries.
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Query(query): Query<MessageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let entries = AuditRepository::new(state.pool())
        .recent(AUDIT_PAGE_SIZE)
        .await?;

    Ok(AuditTemplate {
        viewer: Some(admin),
        current_path: "/admin/audit",
        error: query.error,
        success: query.success,
        entries: entries.iter().map(AuditEntryView::from).collect(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use askama::Template;
    use chrono::{TimeZone, Utc};
    use gusturi_core::{Email, UserId, UserRole};

    use super::*;

    fn admin() -> CurrentUser {
        CurrentUser {
            id: UserId::new(1),
            name: "Elena Popa".to_string(),
            email: Email::parse("elena@example.ro").unwrap(),
            role: UserRole::Administrator,
        }
    }

    #[test]
    fn test_audit_page_renders_inside_admin_layout() {
        let entry = AuditEntry {
            id: 1,
            user_id: Some(UserId::new(1)),
            user_name: Some("Elena Popa".to_string()),
            action: "user_update".to_string(),
            details: Some("#4".to_string()),
            ip: Some("10.0.0.7".to_string()),
            user_agent: None,
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap(),
        };
        let html = AuditTemplate {
            viewer: Some(admin()),
            current_path: "/admin/audit",
            error: None,
            success: None,
            entries: vec![AuditEntryView::from(&entry)],
        }
        .render()
        .unwrap();

        assert!(html.contains("admin-sidebar"));
        assert!(html.contains(r#"<a href="/admin/audit" class="active">"#));
        assert!(html.contains("Elena Popa (#1)"));
        assert!(html.contains("01.03.2025 09:30"));
    }
}
