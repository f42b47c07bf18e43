//! Admin dashboard route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use tracing::instrument;

use crate::db::StatsRepository;
use crate::error::AppError;
use crate::filters;
use crate::middleware::RequireAdmin;
use crate::models::{CurrentUser, DashboardStats, LowStockProduct, RecentOrder};
use crate::routes::{MessageQuery, format_datetime};
use crate::state::AppState;

const RECENT_ORDER_COUNT: i64 = 5;
const LOW_STOCK_THRESHOLD: i32 = 5;
const LOW_STOCK_COUNT: i64 = 5;

/// Recent order row.
#[derive(Debug, Clone)]
pub struct RecentOrderView {
    pub number: String,
    pub client_name: String,
    pub total: String,
    pub status_label: &'static str,
    pub status_class: &'static str,
    pub placed_at: String,
}

impl From<&RecentOrder> for RecentOrderView {
    fn from(order: &RecentOrder) -> Self {
        Self {
            number: order.order_number.clone(),
            client_name: order
                .client_name
                .clone()
                .unwrap_or_else(|| "Cont șters".to_string()),
            total: order.total.to_string(),
            status_label: order.status.label(),
            status_class: order.status.badge_class(),
            placed_at: format_datetime(order.placed_at),
        }
    }
}

/// Dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/dashboard.html")]
pub struct DashboardTemplate {
    pub viewer: Option<CurrentUser>,
    pub current_path: &'static str,
    pub error: Option<String>,
    pub success: Option<String>,
    pub stats: DashboardStats,
    pub revenue: String,
    pub recent_orders: Vec<RecentOrderView>,
    pub low_stock: Vec<LowStockProduct>,
}

/// Display the dashboard: totals, recent orders and low-stock products.
#[instrument(skip_all, fields(admin_id = %admin.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Query(query): Query<MessageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let stats_repo = StatsRepository::new(state.pool());
    let stats = stats_repo.totals().await?;
    let recent_orders = stats_repo.recent_orders(RECENT_ORDER_COUNT).await?;
    let low_stock = stats_repo
        .low_stock(LOW_STOCK_THRESHOLD, LOW_STOCK_COUNT)
        .await?;

    Ok(DashboardTemplate {
        viewer: Some(admin),
        current_path: "/admin",
        error: query.error,
        success: query.success,
        revenue: stats.revenue.to_string(),
        stats,
        recent_orders: recent_orders.iter().map(RecentOrderView::from).collect(),
        low_stock,
    })
}
