//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                       - Liveness
//! GET  /health/ready                 - Readiness (database ping)
//! GET  /                             - Redirect to the right landing page
//!
//! # Auth
//! GET  /auth/login                   - Login page
//! POST /auth/login                   - Login action (rate limited)
//! GET  /auth/signup                  - Signup page
//! POST /auth/signup                  - Signup action (rate limited)
//! POST /auth/logout                  - Logout action
//! GET  /auth/forgot-password         - Reset request page
//! POST /auth/forgot-password         - Reset request action (rate limited)
//! GET  /auth/reset-password          - New password page (?email&token)
//! POST /auth/reset-password          - New password action (rate limited)
//!
//! # Account (requires auth)
//! GET  /account                      - Profile, recent orders, loyalty points
//! POST /account/profile              - Update profile
//! POST /account/password             - Change password
//! GET  /account/orders               - Order history
//! GET  /account/orders/{id}          - Order detail
//! POST /account/orders/{id}/cancel   - Cancel order
//! POST /account/orders/{id}/reorder  - Put the order's items back in the cart
//!
//! # Cart (requires auth)
//! GET  /cart                         - Cart and checkout form
//! POST /cart/update                  - Set quantity (0 removes)
//! POST /cart/remove                  - Remove line
//! POST /cart/checkout                - Place order
//!
//! # Admin (requires administrator)
//! GET  /admin                        - Dashboard
//! GET  /admin/users                  - User list
//! GET  /admin/users/{id}             - User detail
//! GET  /admin/users/{id}/edit        - Edit form
//! POST /admin/users/{id}             - Update user
//! POST /admin/users/{id}/delete      - Delete user
//! GET  /admin/audit                  - Audit log
//! ```

pub mod account;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod health;
pub mod orders;

use axum::{
    Router,
    middleware::from_fn,
    response::{IntoResponse, Redirect},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tower_sessions::{SessionManagerLayer, SessionStore};

use crate::error::AppError;
use crate::middleware::{
    OptionalAuth, auth_rate_limiter, request_id_middleware, security_headers_middleware,
};
use crate::models::CurrentUser;
use crate::state::AppState;

/// Directory served under `/static`, relative to the workspace root.
pub const STATIC_DIR: &str = "crates/storefront/static";

// =============================================================================
// Shared helpers
// =============================================================================

/// `?error=` / `?success=` messages carried across a redirect.
#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Redirect to `path` with a message in the query string.
pub(crate) fn redirect_with(path: &str, key: &str, message: &str) -> Redirect {
    let separator = if path.contains('?') { '&' } else { '?' };
    Redirect::to(&format!(
        "{path}{separator}{key}={}",
        urlencoding::encode(message)
    ))
}

pub(crate) fn redirect_error(path: &str, message: &str) -> Redirect {
    redirect_with(path, "error", message)
}

pub(crate) fn redirect_success(path: &str, message: &str) -> Redirect {
    redirect_with(path, "success", message)
}

/// Where a user lands after login.
pub(crate) const fn landing_page(user: &CurrentUser) -> &'static str {
    if user.is_admin() { "/admin" } else { "/account" }
}

/// Timestamp as shown on every page.
pub(crate) fn format_datetime(at: DateTime<Utc>) -> String {
    at.format("%d.%m.%Y %H:%M").to_string()
}

pub(crate) fn format_optional_datetime(at: Option<DateTime<Utc>>) -> String {
    at.map(format_datetime).unwrap_or_default()
}

/// `GET /` sends visitors to the login page and users to their landing page.
async fn root(OptionalAuth(viewer): OptionalAuth) -> impl IntoResponse {
    Redirect::to(viewer.as_ref().map_or("/auth/login", landing_page))
}

async fn not_found() -> AppError {
    AppError::NotFound("Pagina nu a fost găsită.".to_string())
}

// =============================================================================
// Routers
// =============================================================================

/// Create the auth routes router.
///
/// Form submissions share one IP-keyed rate limiter; the pages do not.
pub fn auth_routes() -> Router<AppState> {
    let pages = Router::new()
        .route("/login", get(auth::login_page))
        .route("/signup", get(auth::signup_page))
        .route("/forgot-password", get(auth::forgot_password_page))
        .route("/reset-password", get(auth::reset_password_page))
        .route("/logout", post(auth::logout));

    let submissions = Router::new()
        .route("/login", post(auth::login))
        .route("/signup", post(auth::signup))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
        .route_layer(auth_rate_limiter());

    pages.merge(submissions)
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::index))
        .route("/profile", post(account::update_profile))
        .route("/password", post(account::change_password))
        .route("/orders", get(orders::index))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/cancel", post(orders::cancel))
        .route("/orders/{id}/reorder", post(orders::reorder))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/checkout", post(cart::checkout))
}

/// Create all page routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/auth", auth_routes())
        .nest("/account", account_routes())
        .nest("/cart", cart_routes())
        .nest("/admin", admin::routes())
        .fallback(not_found)
}

/// Build the full application: routes, static files and the middleware stack.
///
/// The session store is a parameter so tests can run without `PostgreSQL`.
pub fn app<S>(state: AppState, session_layer: SessionManagerLayer<S>) -> Router
where
    S: SessionStore + Clone,
{
    Router::new()
        .merge(routes())
        .nest_service("/static", ServeDir::new(STATIC_DIR))
        .layer(session_layer)
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<axum::body::Body>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            },
        ))
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gusturi_core::{Email, UserId, UserRole};

    fn user(role: UserRole) -> CurrentUser {
        CurrentUser {
            id: UserId::new(1),
            name: "Maria Ionescu".to_string(),
            email: Email::parse("maria@example.ro").unwrap_or_else(|e| panic!("{e}")),
            role,
        }
    }

    #[test]
    fn test_landing_page_by_role() {
        assert_eq!(landing_page(&user(UserRole::Administrator)), "/admin");
        assert_eq!(landing_page(&user(UserRole::Client)), "/account");
    }

    #[test]
    fn test_redirect_with_encodes_message() {
        let response = redirect_error("/cart", "Stoc insuficient & gata").into_response();
        let location = response
            .headers()
            .get(axum::http::header::LOCATION)
            .and_then(|v| v.to_str().ok());
        assert_eq!(
            location,
            Some("/cart?error=Stoc%20insuficient%20%26%20gata")
        );

        let response = redirect_success("/account/orders/3?tab=x", "ok").into_response();
        let location = response
            .headers()
            .get(axum::http::header::LOCATION)
            .and_then(|v| v.to_str().ok());
        assert_eq!(location, Some("/account/orders/3?tab=x&success=ok"));
    }

    #[test]
    fn test_format_datetime() {
        let Some(at) = DateTime::from_timestamp(1_741_341_600, 0) else {
            panic!("valid timestamp");
        };
        assert_eq!(format_datetime(at), "07.03.2025 10:00");
        assert_eq!(format_optional_datetime(None), "");
    }
}
