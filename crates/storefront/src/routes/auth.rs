//! Authentication route handlers.
//!
//! Login, signup, logout and password reset. Validation failures re-render
//! the form with a message; server errors go through [`AppError`].

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{ClientInfo, OptionalAuth, clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::routes::{MessageQuery, landing_page, redirect_success};
use crate::services::audit::actions;
use crate::services::auth::{AuthError, AuthService, Registration};
use crate::services::AuditLog;
use crate::state::AppState;

/// Shown after a reset request whether or not the email exists.
pub const RESET_REQUESTED_MESSAGE: &str = "Dacă adresa de email există în baza noastră de date, vei primi instrucțiuni pentru resetarea parolei.";

const SIGNUP_SUCCESS_MESSAGE: &str = "Contul a fost creat cu succes! Te poți autentifica acum.";
const RESET_SUCCESS_MESSAGE: &str = "Parola a fost resetată cu succes! Te poți autentifica acum.";

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Signup form data.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignupForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub county: String,
    pub postal_code: String,
}

impl SignupForm {
    fn to_registration(&self) -> Registration {
        Registration {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            password: self.password.clone(),
            password_confirm: self.password_confirm.clone(),
            phone: self.phone.clone(),
            address: self.address.clone(),
            city: self.city.clone(),
            county: self.county.clone(),
            postal_code: self.postal_code.clone(),
        }
    }

    /// The form with passwords blanked, for re-rendering.
    fn without_passwords(self) -> Self {
        Self {
            password: String::new(),
            password_confirm: String::new(),
            ..self
        }
    }
}

/// Forgot password form data.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordForm {
    #[serde(default)]
    pub email: String,
}

/// Reset link parameters.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResetQuery {
    pub email: String,
    pub token: String,
}

/// New password form data; email and token ride along as hidden fields.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResetPasswordForm {
    pub email: String,
    pub token: String,
    pub password: String,
    pub password_confirm: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub viewer: Option<CurrentUser>,
    pub error: Option<String>,
    pub success: Option<String>,
    pub email: String,
}

/// Signup page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub viewer: Option<CurrentUser>,
    pub error: Option<String>,
    pub success: Option<String>,
    pub form: SignupForm,
}

/// Forgot password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/forgot_password.html")]
pub struct ForgotPasswordTemplate {
    pub viewer: Option<CurrentUser>,
    pub error: Option<String>,
    pub success: Option<String>,
    /// Set only when reset links are shown instead of emailed.
    pub reset_link: Option<String>,
}

/// Reset password page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/reset_password.html")]
pub struct ResetPasswordTemplate {
    pub viewer: Option<CurrentUser>,
    pub error: Option<String>,
    pub success: Option<String>,
    pub email: String,
    pub token: String,
    /// Whether to show the form at all.
    pub valid: bool,
}

fn session_user(user: &User) -> CurrentUser {
    CurrentUser {
        id: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
        role: user.role,
    }
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page; logged-in users go straight to their landing page.
pub async fn login_page(
    OptionalAuth(viewer): OptionalAuth,
    Query(query): Query<MessageQuery>,
) -> Response {
    if let Some(user) = viewer {
        return Redirect::to(landing_page(&user)).into_response();
    }

    LoginTemplate {
        viewer: None,
        error: query.error,
        success: query.success,
        email: String::new(),
    }
    .into_response()
}

/// Handle login form submission.
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    client: ClientInfo,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let auth = AuthService::new(state.pool());

    let user = match auth.login(&form.email, &form.password).await {
        Ok(user) => user,
        Err(e) if e.is_internal() => return Err(e.into()),
        Err(e) => {
            tracing::info!(reason = %e, "Login rejected");
            return Ok(LoginTemplate {
                viewer: None,
                error: Some(e.user_message()),
                success: None,
                email: form.email,
            }
            .into_response());
        }
    };

    let current = session_user(&user);
    set_current_user(&session, &current).await?;
    set_sentry_user(&user.id);

    AuditLog::new(state.pool())
        .record(Some(user.id), actions::LOGIN, None, &client)
        .await;
    tracing::info!(user_id = %user.id, role = %user.role, "User logged in");

    Ok(Redirect::to(landing_page(&current)).into_response())
}

// =============================================================================
// Signup Routes
// =============================================================================

/// Display the signup page.
pub async fn signup_page(
    OptionalAuth(viewer): OptionalAuth,
    Query(query): Query<MessageQuery>,
) -> Response {
    if let Some(user) = viewer {
        return Redirect::to(landing_page(&user)).into_response();
    }

    SignupTemplate {
        viewer: None,
        error: query.error,
        success: None,
        form: SignupForm::default(),
    }
    .into_response()
}

/// Handle signup form submission.
#[tracing::instrument(skip_all)]
pub async fn signup(
    State(state): State<AppState>,
    client: ClientInfo,
    Form(form): Form<SignupForm>,
) -> Result<Response, AppError> {
    let auth = AuthService::new(state.pool());

    match auth.register(&form.to_registration()).await {
        Ok(user) => {
            AuditLog::new(state.pool())
                .record(
                    Some(user.id),
                    actions::REGISTER,
                    Some(user.email.as_str()),
                    &client,
                )
                .await;
            tracing::info!(user_id = %user.id, "User registered");

            Ok(redirect_success("/auth/login", SIGNUP_SUCCESS_MESSAGE).into_response())
        }
        Err(e) if e.is_internal() => Err(e.into()),
        Err(e) => Ok(SignupTemplate {
            viewer: None,
            error: Some(e.user_message()),
            success: None,
            form: form.without_passwords(),
        }
        .into_response()),
    }
}

// =============================================================================
// Logout Route
// =============================================================================

/// Handle logout. Auditing is best effort and never blocks the logout.
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
    client: ClientInfo,
    OptionalAuth(viewer): OptionalAuth,
) -> Response {
    if let Some(user) = &viewer {
        AuditLog::new(state.pool())
            .record(Some(user.id), actions::LOGOUT, None, &client)
            .await;
    }

    if let Err(e) = clear_current_user(&session).await {
        tracing::error!(error = %e, "Failed to clear session");
    }
    clear_sentry_user();

    Redirect::to("/auth/login").into_response()
}

// =============================================================================
// Password Reset Routes
// =============================================================================

/// Display the forgot password page.
pub async fn forgot_password_page(Query(query): Query<MessageQuery>) -> impl IntoResponse {
    ForgotPasswordTemplate {
        viewer: None,
        error: query.error,
        success: query.success,
        reset_link: None,
    }
}

/// Build the link a customer follows to choose a new password.
fn reset_link(base_url: &str, email: &str, token: &str) -> String {
    format!(
        "{base_url}/auth/reset-password?email={}&token={}",
        urlencoding::encode(email),
        urlencoding::encode(token)
    )
}

/// Handle a password reset request.
///
/// The response is the same whether or not the email belongs to an account.
#[tracing::instrument(skip_all)]
pub async fn forgot_password(
    State(state): State<AppState>,
    client: ClientInfo,
    Form(form): Form<ForgotPasswordForm>,
) -> Result<Response, AppError> {
    let auth = AuthService::new(state.pool());

    let issued = match auth.request_password_reset(&form.email).await {
        Ok(issued) => issued,
        Err(e) if e.is_internal() => return Err(e.into()),
        Err(e) => {
            return Ok(ForgotPasswordTemplate {
                viewer: None,
                error: Some(e.user_message()),
                success: None,
                reset_link: None,
            }
            .into_response());
        }
    };

    let mut shown_link = None;
    if let Some(issued) = issued {
        AuditLog::new(state.pool())
            .record(
                Some(issued.user_id),
                actions::PASSWORD_RESET_REQUEST,
                None,
                &client,
            )
            .await;

        let config = state.config();
        if config.show_reset_links {
            let link = reset_link(&config.base_url, form.email.trim(), &issued.token);
            tracing::info!(
                user_id = %issued.user_id,
                expires_at = %issued.expires_at,
                reset_link = %link,
                "Password reset link issued"
            );
            shown_link = Some(link);
        } else {
            // TODO: deliver the link by email once an SMTP relay is configured
            tracing::info!(user_id = %issued.user_id, "Password reset token issued");
        }
    }

    Ok(ForgotPasswordTemplate {
        viewer: None,
        error: None,
        success: Some(RESET_REQUESTED_MESSAGE.to_string()),
        reset_link: shown_link,
    }
    .into_response())
}

/// Display the new password form for a valid reset link.
pub async fn reset_password_page(
    State(state): State<AppState>,
    Query(query): Query<ResetQuery>,
) -> Result<Response, AppError> {
    let auth = AuthService::new(state.pool());

    let (valid, error) = match auth.verify_reset_token(&query.email, &query.token).await {
        Ok(_) => (true, None),
        Err(e) if e.is_internal() => return Err(e.into()),
        Err(e) => (false, Some(e.user_message())),
    };

    Ok(ResetPasswordTemplate {
        viewer: None,
        error,
        success: None,
        email: query.email,
        token: query.token,
        valid,
    }
    .into_response())
}

/// Handle the new password form, consuming the reset token.
#[tracing::instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    client: ClientInfo,
    Form(form): Form<ResetPasswordForm>,
) -> Result<Response, AppError> {
    let auth = AuthService::new(state.pool());

    match auth
        .reset_password(
            &form.email,
            &form.token,
            &form.password,
            &form.password_confirm,
        )
        .await
    {
        Ok(user_id) => {
            AuditLog::new(state.pool())
                .record(Some(user_id), actions::PASSWORD_RESET, None, &client)
                .await;
            tracing::info!(%user_id, "Password reset completed");

            Ok(redirect_success("/auth/login", RESET_SUCCESS_MESSAGE).into_response())
        }
        Err(e) if e.is_internal() => Err(e.into()),
        Err(e) => {
            let valid = !matches!(e, AuthError::InvalidResetToken);
            Ok(ResetPasswordTemplate {
                viewer: None,
                error: Some(e.user_message()),
                success: None,
                email: form.email,
                token: form.token,
                valid,
            }
            .into_response())
        }
    }
}
