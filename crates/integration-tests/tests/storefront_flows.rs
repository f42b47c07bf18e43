//! Order, cart and account flows against a real `PostgreSQL` database.
//!
//! These tests require `DATABASE_URL` to point at a server where the test
//! user may create databases.
//!
//! Run with: `cargo test -p gusturi-integration-tests -- --ignored`

#![allow(clippy::unwrap_used)]

use chrono::{Duration, Utc};
use sqlx::PgPool;

use gusturi_core::{OrderStatus, ProductId, UserId};
use gusturi_integration_tests::{PASSWORD, order, product, register, registration, stock};
use gusturi_storefront::config::ShopConfig;
use gusturi_storefront::models::{PaymentMethod, ShippingDetails};
use gusturi_storefront::services::admin::UserEdit;
use gusturi_storefront::services::auth::hash_reset_token;
use gusturi_storefront::services::orders::CheckoutRequest;
use gusturi_storefront::services::{
    AdminError, AdminService, AuthError, AuthService, CartService, OrderError, OrderService,
};

fn checkout_request() -> CheckoutRequest {
    CheckoutRequest {
        shipping: ShippingDetails {
            name: "Maria Ionescu".to_owned(),
            email: "maria@example.ro".to_owned(),
            phone: "0722123456".to_owned(),
            address: "Str. Florilor 12".to_owned(),
            city: "Cluj-Napoca".to_owned(),
            county: "Cluj".to_owned(),
            postal_code: None,
        },
        payment_method: PaymentMethod::CashOnDelivery,
        voucher_code: None,
        notes: None,
    }
}

async fn order_status(pool: &PgPool, number: &str) -> OrderStatus {
    sqlx::query_scalar::<_, OrderStatus>("SELECT status FROM shop.order WHERE order_number = $1")
        .bind(number)
        .fetch_one(pool)
        .await
        .unwrap()
}

// ============================================================================
// Accounts
// ============================================================================

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_duplicate_email_is_rejected_case_insensitively(pool: PgPool) {
    register(&pool, "maria@example.ro").await;

    let err = AuthService::new(&pool)
        .register(&registration("Maria@Example.RO"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::UserAlreadyExists), "{err:?}");
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_login_rejects_inactive_account(pool: PgPool) {
    let user = register(&pool, "maria@example.ro").await;
    sqlx::query("UPDATE shop.user SET status = 'inactive' WHERE id = $1")
        .bind(user.id)
        .execute(&pool)
        .await
        .unwrap();

    let err = AuthService::new(&pool)
        .login("maria@example.ro", PASSWORD)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InactiveAccount), "{err:?}");
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_reset_token_is_single_use(pool: PgPool) {
    register(&pool, "maria@example.ro").await;
    let auth = AuthService::new(&pool);

    let issued = auth
        .request_password_reset("maria@example.ro")
        .await
        .unwrap()
        .unwrap();

    auth.reset_password("maria@example.ro", &issued.token, "noua-parola", "noua-parola")
        .await
        .unwrap();
    auth.login("maria@example.ro", "noua-parola").await.unwrap();

    let err = auth
        .reset_password("maria@example.ro", &issued.token, "alta-parola", "alta-parola")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidResetToken), "{err:?}");
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_expired_reset_token_is_rejected(pool: PgPool) {
    register(&pool, "maria@example.ro").await;
    sqlx::query(
        "UPDATE shop.user SET reset_token_hash = $1, reset_token_expires_at = $2 WHERE email = $3",
    )
    .bind(hash_reset_token("expirat"))
    .bind(Utc::now() - Duration::minutes(5))
    .bind("maria@example.ro")
    .execute(&pool)
    .await
    .unwrap();

    let auth = AuthService::new(&pool);
    let err = auth
        .verify_reset_token("maria@example.ro", "expirat")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidResetToken), "{err:?}");

    let err = auth
        .reset_password("maria@example.ro", "expirat", "noua-parola", "noua-parola")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidResetToken), "{err:?}");
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_reset_token_of_deactivated_account_is_rejected(pool: PgPool) {
    let user = register(&pool, "maria@example.ro").await;
    let auth = AuthService::new(&pool);
    let issued = auth
        .request_password_reset("maria@example.ro")
        .await
        .unwrap()
        .unwrap();

    sqlx::query("UPDATE shop.user SET status = 'inactive' WHERE id = $1")
        .bind(user.id)
        .execute(&pool)
        .await
        .unwrap();

    let err = auth
        .verify_reset_token("maria@example.ro", &issued.token)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidResetToken), "{err:?}");

    let err = auth
        .reset_password("maria@example.ro", &issued.token, "noua-parola", "noua-parola")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidResetToken), "{err:?}");

    // The old password still stands
    sqlx::query("UPDATE shop.user SET status = 'active' WHERE id = $1")
        .bind(user.id)
        .execute(&pool)
        .await
        .unwrap();
    auth.login("maria@example.ro", PASSWORD).await.unwrap();
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_reset_request_for_unknown_email_issues_nothing(pool: PgPool) {
    let issued = AuthService::new(&pool)
        .request_password_reset("nimeni@example.ro")
        .await
        .unwrap();
    assert!(issued.is_none());
}

// ============================================================================
// Orders
// ============================================================================

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_checkout_then_cancel_restores_stock(pool: PgPool) {
    let user = register(&pool, "maria@example.ro").await;
    let zacusca = product(&pool, "GR-ZAC-001", 1899, 10).await;

    CartService::new(&pool)
        .set_quantity(user.id, zacusca, 3)
        .await
        .unwrap();

    let orders = OrderService::new(&pool);
    let placed = orders
        .checkout(user.id, &checkout_request(), &ShopConfig::default())
        .await
        .unwrap();
    assert_eq!(stock(&pool, zacusca).await, 7);
    assert!(CartService::new(&pool).get(user.id).await.unwrap().is_empty());

    let number = orders.cancel(user.id, placed.id).await.unwrap();
    assert_eq!(number, placed.order_number);
    assert_eq!(stock(&pool, zacusca).await, 10);
    assert_eq!(order_status(&pool, &number).await, OrderStatus::Cancelled);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_confirmed_order_can_be_cancelled(pool: PgPool) {
    let user = register(&pool, "maria@example.ro").await;
    let zacusca = product(&pool, "GR-ZAC-001", 1899, 4).await;
    let branza = product(&pool, "GR-BRA-004", 4250, 0).await;
    let order_id = order(
        &pool,
        user.id,
        "GR-20250101-EEEEEE",
        OrderStatus::Confirmed,
        &[(zacusca, 2), (branza, 3)],
    )
    .await;

    let number = OrderService::new(&pool)
        .cancel(user.id, order_id)
        .await
        .unwrap();
    assert_eq!(number, "GR-20250101-EEEEEE");
    assert_eq!(order_status(&pool, &number).await, OrderStatus::Cancelled);
    assert_eq!(stock(&pool, zacusca).await, 6);
    assert_eq!(stock(&pool, branza).await, 3);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_cancel_shipped_order_changes_nothing(pool: PgPool) {
    let user = register(&pool, "maria@example.ro").await;
    let miere = product(&pool, "GR-MIE-003", 3499, 4).await;
    let order_id = order(&pool, user.id, "GR-20250101-AAAAAA", OrderStatus::Shipped, &[(miere, 2)]).await;

    let err = OrderService::new(&pool)
        .cancel(user.id, order_id)
        .await
        .unwrap_err();
    assert!(
        matches!(err, OrderError::NotCancellable(OrderStatus::Shipped)),
        "{err:?}"
    );
    assert_eq!(stock(&pool, miere).await, 4);
    assert_eq!(
        order_status(&pool, "GR-20250101-AAAAAA").await,
        OrderStatus::Shipped
    );
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_foreign_order_looks_missing(pool: PgPool) {
    let owner = register(&pool, "maria@example.ro").await;
    let other = register(&pool, "ion@example.ro").await;
    let miere = product(&pool, "GR-MIE-003", 3499, 4).await;
    let order_id = order(&pool, owner.id, "GR-20250101-BBBBBB", OrderStatus::Placed, &[(miere, 1)]).await;

    let orders = OrderService::new(&pool);
    assert!(matches!(
        orders.detail(other.id, order_id).await,
        Err(OrderError::NotFound)
    ));
    assert!(matches!(
        orders.cancel(other.id, order_id).await,
        Err(OrderError::NotFound)
    ));
    assert_eq!(
        order_status(&pool, "GR-20250101-BBBBBB").await,
        OrderStatus::Placed
    );
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_reorder_adds_what_stock_allows(pool: PgPool) {
    let user = register(&pool, "maria@example.ro").await;
    let plenty = product(&pool, "GR-ZAC-001", 1899, 10).await;
    let scarce = product(&pool, "GR-BRA-004", 4250, 1).await;
    let retired = product(&pool, "GR-PAL-006", 6900, 5).await;
    sqlx::query("UPDATE shop.product SET active = FALSE WHERE id = $1")
        .bind(retired)
        .execute(&pool)
        .await
        .unwrap();

    let order_id = order(
        &pool,
        user.id,
        "GR-20250101-CCCCCC",
        OrderStatus::Delivered,
        &[(plenty, 2), (scarce, 3), (retired, 1)],
    )
    .await;

    let outcome = OrderService::new(&pool)
        .reorder(user.id, order_id)
        .await
        .unwrap();
    assert_eq!(outcome.lines_added, 2);
    assert_eq!(outcome.shortfalls.len(), 2);
    assert_eq!(outcome.shortfalls[0].requested, 3);
    assert_eq!(outcome.shortfalls[0].available, 1);
    assert_eq!(outcome.shortfalls[1].available, 0);

    let cart = CartService::new(&pool).get(user.id).await.unwrap();
    let quantity_of = |id: ProductId| {
        cart.lines
            .iter()
            .find(|line| line.product_id == id)
            .map(|line| line.quantity)
    };
    assert_eq!(quantity_of(plenty), Some(2));
    assert_eq!(quantity_of(scarce), Some(1));
    assert_eq!(quantity_of(retired), None);

    // Reordering never touches stock
    assert_eq!(stock(&pool, plenty).await, 10);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_reorder_increments_existing_cart_line(pool: PgPool) {
    let user = register(&pool, "maria@example.ro").await;
    let zacusca = product(&pool, "GR-ZAC-001", 1899, 10).await;
    let order_id = order(
        &pool,
        user.id,
        "GR-20250101-FFFFFF",
        OrderStatus::Delivered,
        &[(zacusca, 2)],
    )
    .await;

    let cart = CartService::new(&pool);
    cart.set_quantity(user.id, zacusca, 1).await.unwrap();

    let outcome = OrderService::new(&pool)
        .reorder(user.id, order_id)
        .await
        .unwrap();
    assert_eq!(outcome.lines_added, 1);
    assert!(outcome.shortfalls.is_empty());

    let lines = cart.get(user.id).await.unwrap().lines;
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].product_id, zacusca);
    assert_eq!(lines[0].quantity, 3);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_reorder_with_nothing_in_stock_leaves_cart_empty(pool: PgPool) {
    let user = register(&pool, "maria@example.ro").await;
    let sold_out = product(&pool, "GR-CIO-008", 4599, 0).await;
    let order_id = order(&pool, user.id, "GR-20250101-DDDDDD", OrderStatus::Delivered, &[(sold_out, 1)]).await;

    let err = OrderService::new(&pool)
        .reorder(user.id, order_id)
        .await
        .unwrap_err();
    assert!(
        matches!(&err, OrderError::NothingAvailable { order_number } if order_number == "GR-20250101-DDDDDD"),
        "{err:?}"
    );
    assert!(CartService::new(&pool).get(user.id).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_checkout_rejects_cart_beyond_stock(pool: PgPool) {
    let user = register(&pool, "maria@example.ro").await;
    let miere = product(&pool, "GR-MIE-003", 3499, 5).await;

    CartService::new(&pool)
        .set_quantity(user.id, miere, 4)
        .await
        .unwrap();
    sqlx::query("UPDATE shop.product SET stock = 2 WHERE id = $1")
        .bind(miere)
        .execute(&pool)
        .await
        .unwrap();

    let err = OrderService::new(&pool)
        .checkout(user.id, &checkout_request(), &ShopConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, OrderError::OutOfStock { .. }), "{err:?}");
    assert_eq!(stock(&pool, miere).await, 2);
    assert_eq!(CartService::new(&pool).get(user.id).await.unwrap().lines.len(), 1);
}

// ============================================================================
// Administration
// ============================================================================

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_admin_cannot_delete_self(pool: PgPool) {
    let admin = register(&pool, "admin@example.ro").await;

    let err = AdminService::new(&pool)
        .delete_user(admin.id, admin.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::SelfDelete), "{err:?}");
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_deleting_user_keeps_their_orders(pool: PgPool) {
    let admin = register(&pool, "admin@example.ro").await;
    let client = register(&pool, "maria@example.ro").await;
    let miere = product(&pool, "GR-MIE-003", 3499, 4).await;
    order(&pool, client.id, "GR-20250101-EEEEEE", OrderStatus::Delivered, &[(miere, 1)]).await;

    let name = AdminService::new(&pool)
        .delete_user(admin.id, client.id)
        .await
        .unwrap();
    assert_eq!(name, "Maria Ionescu");

    let owner = sqlx::query_scalar::<_, Option<UserId>>(
        "SELECT user_id FROM shop.order WHERE order_number = 'GR-20250101-EEEEEE'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(owner, None);
}

#[sqlx::test(migrations = "../storefront/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_admin_edit_rejects_taken_email(pool: PgPool) {
    register(&pool, "maria@example.ro").await;
    let ion = register(&pool, "ion@example.ro").await;

    let edit = UserEdit {
        name: "Ion Popescu".to_owned(),
        email: "MARIA@example.ro".to_owned(),
        ..UserEdit::default()
    };
    let err = AdminService::new(&pool)
        .update_user(ion.id, &edit)
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::EmailTaken), "{err:?}");
}
