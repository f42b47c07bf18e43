//! Order history, detail, cancellation and reorder.
//!
//! These routes require authentication and only ever show the caller's own
//! orders; a foreign order ID behaves like a missing one.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

use gusturi_core::OrderId;

use crate::error::AppError;
use crate::filters;
use crate::middleware::{ClientInfo, RequireAuth};
use crate::models::{CurrentUser, Order, OrderLine, OrderSummary, session_keys};
use crate::routes::{
    MessageQuery, format_datetime, format_optional_datetime, redirect_error, redirect_success,
};
use crate::services::audit::actions;
use crate::services::{AuditLog, OrderError, OrderService};
use crate::state::AppState;

const CANCELLED_MESSAGE: &str = "Comanda a fost anulată cu succes!";

// =============================================================================
// Views
// =============================================================================

/// One row of an order list.
#[derive(Clone)]
pub struct OrderSummaryView {
    pub id: OrderId,
    pub number: String,
    pub placed_at: String,
    pub status_label: &'static str,
    pub status_class: &'static str,
    pub total: String,
    pub item_count: i64,
}

impl From<&OrderSummary> for OrderSummaryView {
    fn from(order: &OrderSummary) -> Self {
        Self {
            id: order.id,
            number: order.order_number.clone(),
            placed_at: format_datetime(order.placed_at),
            status_label: order.status.label(),
            status_class: order.status.badge_class(),
            total: order.total.to_string(),
            item_count: order.item_count,
        }
    }
}

/// Full order for the detail page.
pub struct OrderView {
    pub id: OrderId,
    pub number: String,
    pub status_label: &'static str,
    pub status_class: &'static str,
    pub cancellable: bool,
    pub placed_at: String,
    pub confirmed_at: String,
    pub shipped_at: String,
    pub delivered_at: String,
    pub cancelled_at: String,
    pub subtotal: String,
    pub discount: String,
    pub has_discount: bool,
    pub shipping_cost: String,
    pub total: String,
    pub payment_method: &'static str,
    pub voucher_code: String,
    pub tracking_number: String,
    pub notes: String,
    pub shipping_name: String,
    pub shipping_email: String,
    pub shipping_phone: String,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_county: String,
    pub shipping_postal_code: String,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            number: order.order_number.clone(),
            status_label: order.status.label(),
            status_class: order.status.badge_class(),
            cancellable: order.status.is_cancellable(),
            placed_at: format_datetime(order.placed_at),
            confirmed_at: format_optional_datetime(order.confirmed_at),
            shipped_at: format_optional_datetime(order.shipped_at),
            delivered_at: format_optional_datetime(order.delivered_at),
            cancelled_at: format_optional_datetime(order.cancelled_at),
            subtotal: order.subtotal.to_string(),
            discount: order.discount.to_string(),
            has_discount: order.discount.is_positive(),
            shipping_cost: order.shipping_cost.to_string(),
            total: order.total.to_string(),
            payment_method: order.payment_method.label(),
            voucher_code: order.voucher_code.clone().unwrap_or_default(),
            tracking_number: order.tracking_number.clone().unwrap_or_default(),
            notes: order.notes.clone().unwrap_or_default(),
            shipping_name: order.shipping.name.clone(),
            shipping_email: order.shipping.email.clone(),
            shipping_phone: order.shipping.phone.clone(),
            shipping_address: order.shipping.address.clone(),
            shipping_city: order.shipping.city.clone(),
            shipping_county: order.shipping.county.clone(),
            shipping_postal_code: order.shipping.postal_code.clone().unwrap_or_default(),
        }
    }
}

/// One line item on the detail page.
pub struct OrderLineView {
    pub name: String,
    pub image: String,
    pub unit_price: String,
    pub quantity: i32,
    pub subtotal: String,
}

impl From<&OrderLine> for OrderLineView {
    fn from(line: &OrderLine) -> Self {
        Self {
            name: line.product_name.clone(),
            image: line.image.clone().unwrap_or_default(),
            unit_price: line.unit_price.to_string(),
            quantity: line.quantity,
            subtotal: line.subtotal.to_string(),
        }
    }
}

// =============================================================================
// Templates
// =============================================================================

/// Order history page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/orders.html")]
pub struct OrdersTemplate {
    pub viewer: Option<CurrentUser>,
    pub error: Option<String>,
    pub success: Option<String>,
    pub orders: Vec<OrderSummaryView>,
}

/// Order detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/order_detail.html")]
pub struct OrderDetailTemplate {
    pub viewer: Option<CurrentUser>,
    pub error: Option<String>,
    pub success: Option<String>,
    pub order: OrderView,
    pub lines: Vec<OrderLineView>,
}

// =============================================================================
// Helpers
// =============================================================================

/// Parse an order ID from the path; anything but a positive integer is invalid.
pub(crate) fn parse_order_id(raw: &str) -> Result<OrderId, OrderError> {
    raw.trim()
        .parse::<i32>()
        .ok()
        .map(OrderId::new)
        .filter(OrderId::is_valid)
        .ok_or(OrderError::InvalidId)
}

fn order_path(id: OrderId) -> String {
    format!("/account/orders/{id}")
}

/// Where to send the user after a failed order action.
fn error_redirect(raw_id: &str, err: &OrderError) -> Response {
    let target = match (err, parse_order_id(raw_id)) {
        (OrderError::InvalidId | OrderError::NotFound, _) | (_, Err(_)) => {
            "/account/orders".to_string()
        }
        (_, Ok(id)) => order_path(id),
    };
    redirect_error(&target, &err.user_message()).into_response()
}

/// A reorder that added nothing lands on the cart, like a successful one.
fn reorder_error_redirect(raw_id: &str, err: &OrderError) -> Response {
    match err {
        OrderError::NothingAvailable { .. } => {
            redirect_error("/cart", &err.user_message()).into_response()
        }
        _ => error_redirect(raw_id, err),
    }
}

// =============================================================================
// Routes
// =============================================================================

/// Display the caller's full order history.
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<MessageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let orders = OrderService::new(state.pool()).history(user.id, None).await?;

    Ok(OrdersTemplate {
        viewer: Some(user),
        error: query.error,
        success: query.success,
        orders: orders.iter().map(OrderSummaryView::from).collect(),
    })
}

/// Display one of the caller's orders.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(raw_id): Path<String>,
    Query(query): Query<MessageQuery>,
) -> Result<Response, AppError> {
    let service = OrderService::new(state.pool());

    let detail = match parse_order_id(&raw_id) {
        Ok(order_id) => service.detail(user.id, order_id).await,
        Err(e) => Err(e),
    };
    let (order, lines) = match detail {
        Ok(detail) => detail,
        Err(e) if e.is_internal() => return Err(e.into()),
        Err(e) => return Ok(error_redirect(&raw_id, &e)),
    };

    Ok(OrderDetailTemplate {
        viewer: Some(user),
        error: query.error,
        success: query.success,
        order: OrderView::from(&order),
        lines: lines.iter().map(OrderLineView::from).collect(),
    }
    .into_response())
}

/// Cancel one of the caller's orders.
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    client: ClientInfo,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError> {
    let order_id = match parse_order_id(&raw_id) {
        Ok(id) => id,
        Err(e) => return Ok(error_redirect(&raw_id, &e)),
    };

    match OrderService::new(state.pool()).cancel(user.id, order_id).await {
        Ok(order_number) => {
            AuditLog::new(state.pool())
                .record(
                    Some(user.id),
                    actions::ORDER_CANCEL,
                    Some(&format!("Comanda {order_number}")),
                    &client,
                )
                .await;
            Ok(redirect_success(&order_path(order_id), CANCELLED_MESSAGE).into_response())
        }
        Err(e) if e.is_internal() => Err(e.into()),
        Err(e) => {
            tracing::info!(reason = %e, "Cancellation rejected");
            Ok(error_redirect(&raw_id, &e))
        }
    }
}

/// Add the items of one of the caller's orders back to their cart.
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn reorder(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    client: ClientInfo,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError> {
    let order_id = match parse_order_id(&raw_id) {
        Ok(id) => id,
        Err(e) => return Ok(error_redirect(&raw_id, &e)),
    };

    match OrderService::new(state.pool()).reorder(user.id, order_id).await {
        Ok(outcome) => {
            if !outcome.shortfalls.is_empty() {
                session
                    .insert(session_keys::REORDER_SHORTFALL, &outcome.shortfalls)
                    .await?;
            }
            AuditLog::new(state.pool())
                .record(
                    Some(user.id),
                    actions::REORDER,
                    Some(&format!("Comanda {}", outcome.order_number)),
                    &client,
                )
                .await;
            Ok(redirect_success("/cart", &outcome.success_message()).into_response())
        }
        Err(e) if e.is_internal() => Err(e.into()),
        Err(e) => {
            tracing::info!(reason = %e, "Reorder rejected");
            if let OrderError::NothingAvailable { order_number } = &e {
                AuditLog::new(state.pool())
                    .record(
                        Some(user.id),
                        actions::REORDER,
                        Some(&format!("Comanda {order_number}")),
                        &client,
                    )
                    .await;
            }
            Ok(reorder_error_redirect(&raw_id, &e))
        }
    }
}
