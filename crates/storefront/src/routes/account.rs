//! Account route handlers.
//!
//! These routes require authentication.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::db::LoyaltyRepository;
use crate::error::AppError;
use crate::filters;
use crate::middleware::{ClientInfo, RequireAuth, refresh_current_user};
use crate::models::{CurrentUser, LoyaltyBalance, ProfileUpdate, User};
use crate::routes::orders::OrderSummaryView;
use crate::routes::{MessageQuery, format_datetime, redirect_error, redirect_success};
use crate::services::audit::actions;
use crate::services::{AuditLog, AuthService, OrderService, optional_field};
use crate::state::AppState;

/// Orders shown on the account overview.
const RECENT_ORDER_COUNT: i64 = 5;

// =============================================================================
// Form Types
// =============================================================================

/// Profile form data.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProfileForm {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub county: String,
    pub postal_code: String,
}

impl ProfileForm {
    fn to_update(&self) -> ProfileUpdate {
        ProfileUpdate {
            name: self.name.trim().to_string(),
            phone: optional_field(&self.phone),
            address: optional_field(&self.address),
            city: optional_field(&self.city),
            county: optional_field(&self.county),
            postal_code: optional_field(&self.postal_code),
        }
    }
}

/// Password change form data.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PasswordForm {
    pub current_password: String,
    pub new_password: String,
    pub new_password_confirm: String,
}

// =============================================================================
// Views
// =============================================================================

/// Profile fields for the account page.
pub struct ProfileView {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub county: String,
    pub postal_code: String,
    pub registered_at: String,
}

impl From<&User> for ProfileView {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.to_string(),
            phone: user.phone.clone().unwrap_or_default(),
            address: user.address.clone().unwrap_or_default(),
            city: user.city.clone().unwrap_or_default(),
            county: user.county.clone().unwrap_or_default(),
            postal_code: user.postal_code.clone().unwrap_or_default(),
            registered_at: format_datetime(user.registered_at),
        }
    }
}

/// Account overview page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountIndexTemplate {
    pub viewer: Option<CurrentUser>,
    pub error: Option<String>,
    pub success: Option<String>,
    pub profile: ProfileView,
    pub recent_orders: Vec<OrderSummaryView>,
    pub loyalty: LoyaltyBalance,
}

// =============================================================================
// Routes
// =============================================================================

/// Display the account overview: profile, recent orders and loyalty points.
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<MessageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let pool = state.pool();
    let profile = AuthService::new(pool).get_user(user.id).await?;
    let recent_orders = OrderService::new(pool)
        .history(user.id, Some(RECENT_ORDER_COUNT))
        .await?;
    let loyalty = LoyaltyRepository::new(pool).get(user.id).await?;

    Ok(AccountIndexTemplate {
        viewer: Some(user),
        error: query.error,
        success: query.success,
        profile: ProfileView::from(&profile),
        recent_orders: recent_orders.iter().map(OrderSummaryView::from).collect(),
        loyalty,
    })
}

/// Update the caller's profile and the name shown in the navigation.
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    client: ClientInfo,
    Form(form): Form<ProfileForm>,
) -> Result<Response, AppError> {
    let update = form.to_update();

    match AuthService::new(state.pool())
        .update_profile(user.id, &update)
        .await
    {
        Ok(()) => {
            let refreshed = CurrentUser {
                name: update.name,
                ..user
            };
            refresh_current_user(&session, &refreshed).await?;
            AuditLog::new(state.pool())
                .record(Some(refreshed.id), actions::PROFILE_UPDATE, None, &client)
                .await;

            Ok(redirect_success("/account", "Profilul a fost actualizat cu succes!").into_response())
        }
        Err(e) if e.is_internal() => Err(e.into()),
        Err(e) => Ok(redirect_error("/account", &e.user_message()).into_response()),
    }
}

/// Change the caller's password after checking the current one.
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    client: ClientInfo,
    Form(form): Form<PasswordForm>,
) -> Result<Response, AppError> {
    match AuthService::new(state.pool())
        .change_password(
            user.id,
            &form.current_password,
            &form.new_password,
            &form.new_password_confirm,
        )
        .await
    {
        Ok(()) => {
            AuditLog::new(state.pool())
                .record(Some(user.id), actions::PASSWORD_CHANGE, None, &client)
                .await;
            Ok(redirect_success("/account", "Parola a fost schimbată cu succes!").into_response())
        }
        Err(e) if e.is_internal() => Err(e.into()),
        Err(e) => {
            tracing::info!(reason = %e, "Password change rejected");
            Ok(redirect_error("/account", &e.user_message()).into_response())
        }
    }
}
