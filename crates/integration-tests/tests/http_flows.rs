//! Full-stack requests through the storefront router against `PostgreSQL`.
//!
//! Run with: `cargo test -p gusturi-integration-tests -- --ignored`

#![allow(clippy::unwrap_used)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use secrecy::SecretString;
use sqlx::PgPool;
use tower::ServiceExt;
use tower_sessions::MemoryStore;

use gusturi_core::{OrderStatus, UserId};
use gusturi_integration_tests::{PASSWORD, order, product, register};
use gusturi_storefront::config::{SentryConfig, ShopConfig, StorefrontConfig};
use gusturi_storefront::middleware::session_layer;
use gusturi_storefront::routes;
use gusturi_storefront::state::AppState;

fn app(pool: PgPool, show_reset_links: bool) -> Router {
    let config = StorefrontConfig {
        database_url: SecretString::from("postgres://unused"),
        host: "127.0.0.1".parse().unwrap(),
        port: 3000,
        base_url: "http://localhost:3000".to_string(),
        session_secret: SecretString::from("k8#Qz!2mVb7$Lw9@Xn4%Tr6^Yp1&Hs3*"),
        show_reset_links,
        shop: ShopConfig::default(),
        sentry: SentryConfig::default(),
    };

    routes::app(
        AppState::new(config, pool),
        session_layer(MemoryStore::default(), false),
    )
}

fn form_post(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header("x-forwarded-for", "203.0.113.9")
        .body(Body::from(body))
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Log in through the form and return the session cookie.
async fn login(app: &Router, email: &str) -> String {
    let response = app
        .clone()
        .oneshot(form_post(
            "/auth/login",
            format!("email={}&password={PASSWORD}", email.replace('@', "%40")),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    cookie.split(';').next().unwrap().to_string()
}

async fn forgot_password(app: &Router, email: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(form_post(
            "/auth/forgot-password",
            format!("email={}", email.replace('@', "%40")),
        ))
        .await
        .unwrap();
    (response.status(), body_text(response).await)
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_admin_pages_render_for_administrator(pool: PgPool) {
    let admin = register(&pool, "elena@example.ro").await;
    let client = register(&pool, "ion@example.ro").await;
    sqlx::query("UPDATE shop.user SET role = 'administrator' WHERE id = $1")
        .bind(admin.id)
        .execute(&pool)
        .await
        .unwrap();

    let app = app(pool, false);
    let cookie = login(&app, "elena@example.ro").await;

    let client_page = format!("/admin/users/{}", client.id);
    let client_edit = format!("/admin/users/{}/edit", client.id);
    for uri in [
        "/admin",
        "/admin/users",
        client_page.as_str(),
        client_edit.as_str(),
        "/admin/audit",
    ] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "GET {uri}");
        let body = body_text(response).await;
        assert!(body.contains("admin-sidebar"), "GET {uri} missing admin layout");
    }
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_client_is_forbidden_from_admin(pool: PgPool) {
    register(&pool, "ion@example.ro").await;
    let app = app(pool, false);
    let cookie = login(&app, "ion@example.ro").await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/admin/users")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_reset_request_looks_the_same_for_known_and_unknown_email(pool: PgPool) {
    let user = register(&pool, "maria@example.ro").await;
    let app = app(pool.clone(), false);

    let (known_status, known) = forgot_password(&app, "maria@example.ro").await;
    let (unknown_status, unknown) = forgot_password(&app, "nimeni@example.ro").await;

    assert_eq!(known_status, StatusCode::OK);
    assert_eq!(unknown_status, StatusCode::OK);
    assert_eq!(known, unknown);
    assert!(!known.contains("reset-password?"));

    // A token was still issued for the registered account
    let issued = sqlx::query_scalar::<_, bool>(
        "SELECT reset_token_hash IS NOT NULL FROM shop.user WHERE id = $1",
    )
    .bind(user.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(issued);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_reset_link_shown_only_when_enabled(pool: PgPool) {
    register(&pool, "maria@example.ro").await;
    let app = app(pool, true);

    let (_, body) = forgot_password(&app, "maria@example.ro").await;
    assert!(body.contains("reset-password?email=maria%40example.ro"));
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_unknown_admin_user_is_not_found(pool: PgPool) {
    let admin = register(&pool, "elena@example.ro").await;
    sqlx::query("UPDATE shop.user SET role = 'administrator' WHERE id = $1")
        .bind(admin.id)
        .execute(&pool)
        .await
        .unwrap();
    let app = app(pool, false);
    let cookie = login(&app, "elena@example.ro").await;

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/admin/users/{}", UserId::new(9999)))
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_reorder_of_sold_out_order_lands_on_cart_and_is_audited(pool: PgPool) {
    let user = register(&pool, "maria@example.ro").await;
    let sold_out = product(&pool, "GR-CIO-008", 4599, 0).await;
    let order_id = order(
        &pool,
        user.id,
        "GR-20250101-GGGGGG",
        OrderStatus::Delivered,
        &[(sold_out, 1)],
    )
    .await;

    let app = app(pool.clone(), false);
    let cookie = login(&app, "maria@example.ro").await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/account/orders/{order_id}/reorder"))
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(location.starts_with("/cart?error="), "{location}");

    let details = sqlx::query_scalar::<_, Option<String>>(
        "SELECT details FROM shop.audit_log WHERE user_id = $1 AND action = 'reorder'",
    )
    .bind(user.id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(details.as_deref(), Some("Comanda GR-20250101-GGGGGG"));
}
