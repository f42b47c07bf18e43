//! Cart and checkout route handlers.
//!
//! The cart is stored per user in the database, so these routes require
//! authentication.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use gusturi_core::ProductId;

use crate::error::AppError;
use crate::filters;
use crate::middleware::{ClientInfo, RequireAuth};
use crate::models::{
    CartLine, CurrentUser, PaymentMethod, ReorderShortfall, ShippingDetails, session_keys,
};
use crate::routes::{MessageQuery, redirect_error, redirect_success};
use crate::services::audit::actions;
use crate::services::orders::{CheckoutRequest, price_order};
use crate::services::{AuditLog, AuthService, CartService, OrderService, optional_field};
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Quantity change for one cart line.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CartUpdateForm {
    pub product_id: String,
    pub quantity: String,
}

/// Line removal.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CartRemoveForm {
    pub product_id: String,
}

/// Checkout form data.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CheckoutForm {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub county: String,
    pub postal_code: String,
    pub payment_method: String,
    pub voucher_code: String,
    pub notes: String,
}

impl CheckoutForm {
    fn to_request(&self) -> Option<CheckoutRequest> {
        let payment_method = self.payment_method.parse::<PaymentMethod>().ok()?;

        Some(CheckoutRequest {
            shipping: ShippingDetails {
                name: self.name.trim().to_string(),
                email: self.email.trim().to_string(),
                phone: self.phone.trim().to_string(),
                address: self.address.trim().to_string(),
                city: self.city.trim().to_string(),
                county: self.county.trim().to_string(),
                postal_code: optional_field(&self.postal_code),
            },
            payment_method,
            voucher_code: optional_field(&self.voucher_code),
            notes: optional_field(&self.notes),
        })
    }
}

fn parse_product_id(raw: &str) -> Option<ProductId> {
    raw.trim()
        .parse::<i32>()
        .ok()
        .map(ProductId::new)
        .filter(ProductId::is_valid)
}

// =============================================================================
// Views
// =============================================================================

/// One cart line for display.
pub struct CartLineView {
    pub product_id: ProductId,
    pub code: String,
    pub name: String,
    pub image: String,
    pub unit_price: String,
    pub quantity: i32,
    pub stock: i32,
    pub subtotal: String,
    pub available: bool,
}

impl From<&CartLine> for CartLineView {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.product_id,
            code: line.code.clone(),
            name: line.name.clone(),
            image: line.image.clone().unwrap_or_default(),
            unit_price: line.unit_price.to_string(),
            quantity: line.quantity,
            stock: line.stock,
            subtotal: line.subtotal().to_string(),
            available: line.is_available(),
        }
    }
}

/// Checkout form values, prefilled from the profile.
#[derive(Default)]
pub struct CheckoutPrefill {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub county: String,
    pub postal_code: String,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/index.html")]
pub struct CartTemplate {
    pub viewer: Option<CurrentUser>,
    pub error: Option<String>,
    pub success: Option<String>,
    pub lines: Vec<CartLineView>,
    pub shortfalls: Vec<ReorderShortfall>,
    pub subtotal: String,
    pub shipping_cost: String,
    pub total: String,
    pub free_shipping_threshold: String,
    pub can_checkout: bool,
    pub checkout: CheckoutPrefill,
}

// =============================================================================
// Routes
// =============================================================================

/// Display the cart, the checkout form and any shortfalls from the last reorder.
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Query(query): Query<MessageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let pool = state.pool();
    let cart = CartService::new(pool).get(user.id).await?;
    let shortfalls: Vec<ReorderShortfall> = session
        .remove(session_keys::REORDER_SHORTFALL)
        .await?
        .unwrap_or_default();

    let profile = AuthService::new(pool).get_user(user.id).await?;
    let shop = &state.config().shop;
    let pricing = price_order(&cart.lines, None, shop);

    Ok(CartTemplate {
        viewer: Some(user),
        error: query.error,
        success: query.success,
        can_checkout: !cart.is_empty() && cart.lines.iter().all(CartLine::is_available),
        lines: cart.lines.iter().map(CartLineView::from).collect(),
        shortfalls,
        subtotal: pricing.subtotal.to_string(),
        shipping_cost: pricing.shipping_cost.to_string(),
        total: pricing.total.to_string(),
        free_shipping_threshold: shop.free_shipping_threshold.to_string(),
        checkout: CheckoutPrefill {
            name: profile.name,
            email: profile.email.into_inner(),
            phone: profile.phone.unwrap_or_default(),
            address: profile.address.unwrap_or_default(),
            city: profile.city.unwrap_or_default(),
            county: profile.county.unwrap_or_default(),
            postal_code: profile.postal_code.unwrap_or_default(),
        },
    })
}

/// Set the quantity of a cart line; zero removes it.
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<CartUpdateForm>,
) -> Result<Response, AppError> {
    let (Some(product_id), Ok(quantity)) = (
        parse_product_id(&form.product_id),
        form.quantity.trim().parse::<i32>(),
    ) else {
        return Ok(redirect_error("/cart", "Cantitate invalidă.").into_response());
    };

    match CartService::new(state.pool())
        .set_quantity(user.id, product_id, quantity)
        .await
    {
        Ok(()) => Ok(redirect_success("/cart", "Coșul a fost actualizat.").into_response()),
        Err(e) if e.is_internal() => Err(e.into()),
        Err(e) => Ok(redirect_error("/cart", &e.user_message()).into_response()),
    }
}

/// Remove a line from the cart.
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<CartRemoveForm>,
) -> Result<Response, AppError> {
    let Some(product_id) = parse_product_id(&form.product_id) else {
        return Ok(redirect_error("/cart", "Produsul nu a fost găsit.").into_response());
    };

    CartService::new(state.pool())
        .remove(user.id, product_id)
        .await?;

    Ok(redirect_success("/cart", "Produsul a fost eliminat din coș.").into_response())
}

/// Place an order from the cart.
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn checkout(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    client: ClientInfo,
    Form(form): Form<CheckoutForm>,
) -> Result<Response, AppError> {
    let Some(request) = form.to_request() else {
        return Ok(redirect_error("/cart", "Metoda de plată nu este validă.").into_response());
    };

    match OrderService::new(state.pool())
        .checkout(user.id, &request, &state.config().shop)
        .await
    {
        Ok(placed) => {
            AuditLog::new(state.pool())
                .record(
                    Some(user.id),
                    actions::ORDER_PLACE,
                    Some(&format!("Comanda {} ({})", placed.order_number, placed.total)),
                    &client,
                )
                .await;
            Ok(redirect_success(
                &format!("/account/orders/{}", placed.id),
                &format!("Comanda {} a fost plasată cu succes!", placed.order_number),
            )
            .into_response())
        }
        Err(e) if e.is_internal() => Err(e.into()),
        Err(e) => {
            tracing::info!(reason = %e, "Checkout rejected");
            Ok(redirect_error("/cart", &e.user_message()).into_response())
        }
    }
}
