//! User management route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use gusturi_core::{AccountStatus, UserId, UserRole};

use crate::error::AppError;
use crate::filters;
use crate::middleware::{ClientInfo, RequireAdmin};
use crate::models::{CurrentUser, User};
use crate::routes::{MessageQuery, format_datetime, format_optional_datetime, redirect_error, redirect_success};
use crate::services::admin::UserEdit;
use crate::services::audit::actions;
use crate::services::{AdminService, AuditLog};
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// User edit form data.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UserEditForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub county: String,
    pub postal_code: String,
    pub role: String,
    pub status: String,
}

impl UserEditForm {
    fn to_edit(&self) -> Option<UserEdit> {
        Some(UserEdit {
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            address: self.address.clone(),
            city: self.city.clone(),
            county: self.county.clone(),
            postal_code: self.postal_code.clone(),
            role: self.role.parse::<UserRole>().ok()?,
            status: self.status.parse::<AccountStatus>().ok()?,
        })
    }
}

// =============================================================================
// Views
// =============================================================================

/// User view for templates.
#[derive(Debug, Clone)]
pub struct UserView {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub county: String,
    pub postal_code: String,
    pub role: &'static str,
    pub role_label: &'static str,
    pub is_admin: bool,
    pub status: &'static str,
    pub status_label: &'static str,
    pub is_active: bool,
    pub registered_at: String,
    pub last_login_at: String,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.to_string(),
            phone: user.phone.clone().unwrap_or_default(),
            address: user.address.clone().unwrap_or_default(),
            city: user.city.clone().unwrap_or_default(),
            county: user.county.clone().unwrap_or_default(),
            postal_code: user.postal_code.clone().unwrap_or_default(),
            role: user.role.as_str(),
            role_label: user.role.label(),
            is_admin: user.role.is_admin(),
            status: user.status.as_str(),
            status_label: user.status.label(),
            is_active: user.status.is_active(),
            registered_at: format_datetime(user.registered_at),
            last_login_at: format_optional_datetime(user.last_login_at),
        }
    }
}

/// Select option for the edit form.
pub struct OptionView {
    pub value: &'static str,
    pub label: &'static str,
}

/// User list template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/users.html")]
pub struct UsersTemplate {
    pub viewer: Option<CurrentUser>,
    pub current_path: &'static str,
    pub error: Option<String>,
    pub success: Option<String>,
    pub users: Vec<UserView>,
}

/// User detail template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/user_view.html")]
pub struct UserShowTemplate {
    pub viewer: Option<CurrentUser>,
    pub current_path: &'static str,
    pub error: Option<String>,
    pub success: Option<String>,
    pub user: UserView,
    pub is_self: bool,
}

/// User edit template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/user_edit.html")]
pub struct UserEditTemplate {
    pub viewer: Option<CurrentUser>,
    pub current_path: &'static str,
    pub error: Option<String>,
    pub success: Option<String>,
    pub user: UserView,
    pub roles: Vec<OptionView>,
    pub statuses: Vec<OptionView>,
}

// =============================================================================
// Helpers
// =============================================================================

fn parse_user_id(raw: &str) -> Result<UserId, AppError> {
    raw.trim()
        .parse::<i32>()
        .ok()
        .map(UserId::new)
        .filter(UserId::is_valid)
        .ok_or_else(|| AppError::NotFound("Utilizatorul nu a fost găsit.".to_string()))
}

fn user_path(id: UserId) -> String {
    format!("/admin/users/{id}")
}

fn role_options() -> Vec<OptionView> {
    UserRole::ALL
        .iter()
        .map(|role| OptionView {
            value: role.as_str(),
            label: role.label(),
        })
        .collect()
}

fn status_options() -> Vec<OptionView> {
    AccountStatus::ALL
        .iter()
        .map(|status| OptionView {
            value: status.as_str(),
            label: status.label(),
        })
        .collect()
}

// =============================================================================
// Routes
// =============================================================================

/// List all accounts, newest first.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Query(query): Query<MessageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let users = AdminService::new(state.pool()).list_users().await?;

    Ok(UsersTemplate {
        viewer: Some(admin),
        current_path: "/admin/users",
        error: query.error,
        success: query.success,
        users: users.iter().map(UserView::from).collect(),
    })
}

/// Show one account.
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(raw_id): Path<String>,
    Query(query): Query<MessageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_user_id(&raw_id)?;
    let user = AdminService::new(state.pool()).get_user(id).await?;

    Ok(UserShowTemplate {
        is_self: admin.id == id,
        viewer: Some(admin),
        current_path: "/admin/users",
        error: query.error,
        success: query.success,
        user: UserView::from(&user),
    })
}

/// Show the edit form for one account.
pub async fn edit(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(raw_id): Path<String>,
    Query(query): Query<MessageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_user_id(&raw_id)?;
    let user = AdminService::new(state.pool()).get_user(id).await?;

    Ok(UserEditTemplate {
        viewer: Some(admin),
        current_path: "/admin/users",
        error: query.error,
        success: query.success,
        user: UserView::from(&user),
        roles: role_options(),
        statuses: status_options(),
    })
}

/// Apply the edit form.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    client: ClientInfo,
    Path(raw_id): Path<String>,
    Form(form): Form<UserEditForm>,
) -> Result<Response, AppError> {
    let id = parse_user_id(&raw_id)?;
    let edit_path = format!("{}/edit", user_path(id));

    let Some(edit) = form.to_edit() else {
        return Ok(redirect_error(&edit_path, "Rolul sau statusul nu este valid.").into_response());
    };

    match AdminService::new(state.pool()).update_user(id, &edit).await {
        Ok(update) => {
            AuditLog::new(state.pool())
                .record(
                    Some(admin.id),
                    actions::USER_UPDATE,
                    Some(&format!("Utilizator #{id} ({})", update.email)),
                    &client,
                )
                .await;
            tracing::info!(user_id = %id, role = %update.role, status = %update.status, "User updated");

            Ok(redirect_success(&user_path(id), "Utilizatorul a fost actualizat cu succes!")
                .into_response())
        }
        Err(e) if e.is_internal() => Err(e.into()),
        Err(e) => Ok(redirect_error(&edit_path, &e.user_message()).into_response()),
    }
}

/// Delete an account other than the caller's own.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    client: ClientInfo,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_user_id(&raw_id)?;

    match AdminService::new(state.pool()).delete_user(admin.id, id).await {
        Ok(name) => {
            AuditLog::new(state.pool())
                .record(
                    Some(admin.id),
                    actions::USER_DELETE,
                    Some(&format!("Utilizator #{id} ({name})")),
                    &client,
                )
                .await;
            tracing::info!(user_id = %id, "User deleted");

            Ok(redirect_success("/admin/users", "Utilizatorul a fost șters cu succes!").into_response())
        }
        Err(e) if e.is_internal() => Err(e.into()),
        Err(e) => Ok(redirect_error("/admin/users", &e.user_message()).into_response()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_form_rejects_unknown_role() {
        let form = UserEditForm {
            name: "Ion".to_string(),
            email: "ion@example.ro".to_string(),
            role: "superuser".to_string(),
            status: "active".to_string(),
            ..UserEditForm::default()
        };
        assert!(form.to_edit().is_none());
    }

    #[test]
    fn test_edit_form_parses_role_and_status() {
        let form = UserEditForm {
            role: "administrator".to_string(),
            status: "inactive".to_string(),
            ..UserEditForm::default()
        };
        let Some(edit) = form.to_edit() else {
            panic!("valid role/status rejected");
        };
        assert_eq!(edit.role, UserRole::Administrator);
        assert_eq!(edit.status, AccountStatus::Inactive);
    }

    #[test]
    fn test_parse_user_id_rejects_garbage() {
        assert!(parse_user_id("abc").is_err());
        assert!(parse_user_id("0").is_err());
        assert_eq!(parse_user_id("5").ok(), Some(UserId::new(5)));
    }

    #[test]
    fn test_options_cover_every_variant() {
        assert_eq!(role_options().len(), UserRole::ALL.len());
        assert_eq!(status_options().len(), AccountStatus::ALL.len());
    }
}
