//! Order service: history, cancellation, reorder and checkout.
//!
//! Each state-changing operation runs in a single transaction that locks the
//! rows it reads before deciding anything, so two concurrent requests cannot
//! both pass a stock or status check. Returning early drops the transaction,
//! which rolls it back.
//!
//! The allocation and pricing rules are pure functions ([`plan_reorder`],
//! [`price_order`]) so they can be tested without a database.

use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use sqlx::PgPool;
use thiserror::Error;

use gusturi_core::{OrderId, OrderStatus, Price, ProductId, UserId};

use crate::config::ShopConfig;
use crate::db::{
    CartRepository, OrderRepository, ProductRepository, RepositoryError, VoucherRepository,
};
use crate::models::{
    CartLine, NewOrder, Order, OrderLine, OrderSummary, PaymentMethod, ReorderItem,
    ReorderShortfall, ShippingDetails, Voucher,
};

/// Errors from order operations. Each carries a message for the customer.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("missing or invalid order id")]
    InvalidId,

    /// Missing, or owned by someone else.
    #[error("order not found")]
    NotFound,

    #[error("order cannot be cancelled in status {0}")]
    NotCancellable(OrderStatus),

    #[error("no product of order {order_number} is available")]
    NothingAvailable { order_number: String },

    #[error("cart is empty")]
    EmptyCart,

    #[error("product {name} is out of stock")]
    OutOfStock { name: String },

    #[error("invalid voucher code")]
    InvalidVoucher,

    #[error("shipping details are incomplete")]
    MissingShippingDetails,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for OrderError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

impl OrderError {
    /// Message shown to the customer after a redirect.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidId => "ID-ul comenzii lipsește sau este invalid.".to_string(),
            Self::NotFound => {
                "Comanda nu a fost găsită sau nu aveți acces la această comandă.".to_string()
            }
            Self::NotCancellable(status) => format!(
                "Această comandă nu mai poate fi anulată deoarece este deja {}.",
                status.label().to_lowercase()
            ),
            Self::NothingAvailable { .. } => {
                "Nu s-a putut adăuga niciun produs în coș. Toate produsele sunt indisponibile."
                    .to_string()
            }
            Self::EmptyCart => "Coșul tău este gol.".to_string(),
            Self::OutOfStock { name } => {
                format!("Produsul „{name}” nu mai este disponibil în cantitatea dorită.")
            }
            Self::InvalidVoucher => "Codul de reducere nu este valid.".to_string(),
            Self::MissingShippingDetails => {
                "Completează numele, email-ul, telefonul, adresa, orașul și județul pentru livrare."
                    .to_string()
            }
            Self::Repository(_) => {
                "A apărut o eroare la procesarea comenzii. Te rugăm să încerci din nou.".to_string()
            }
        }
    }

    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Repository(_))
    }
}

// =============================================================================
// Reorder planning
// =============================================================================

/// What a reorder will add to the cart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReorderPlan {
    /// Product and quantity to add, only for quantities > 0.
    pub additions: Vec<(ProductId, i32)>,
    /// Lines that could not be added in full.
    pub shortfalls: Vec<ReorderShortfall>,
}

/// Decide how much of each past line can go back into the cart.
///
/// Inactive or deleted products count as having no stock.
#[must_use]
pub fn plan_reorder(items: &[ReorderItem]) -> ReorderPlan {
    let mut plan = ReorderPlan::default();

    for item in items {
        let available = match item.product_id {
            Some(_) if item.active => item.stock.max(0),
            _ => 0,
        };
        let quantity = item.requested.min(available);

        if let Some(product_id) = item.product_id
            && quantity > 0
        {
            plan.additions.push((product_id, quantity));
        }

        if available < item.requested {
            plan.shortfalls.push(ReorderShortfall {
                name: item.name.clone(),
                requested: item.requested,
                available,
            });
        }
    }

    plan
}

/// Result of a successful reorder.
#[derive(Debug, Clone)]
pub struct ReorderOutcome {
    pub order_number: String,
    pub lines_added: usize,
    pub shortfalls: Vec<ReorderShortfall>,
}

impl ReorderOutcome {
    #[must_use]
    pub fn success_message(&self) -> String {
        let mut message = "Produsele au fost adăugate în coș.".to_string();
        if !self.shortfalls.is_empty() {
            message.push_str(" Unele produse nu mai sunt disponibile în cantitatea dorită.");
        }
        message
    }
}

// =============================================================================
// Checkout pricing
// =============================================================================

/// Totals of an order about to be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderPricing {
    pub subtotal: Price,
    pub discount: Price,
    pub shipping_cost: Price,
    pub total: Price,
}

/// Price a cart: voucher discount capped at the subtotal, flat shipping
/// unless the subtotal reaches the free-shipping threshold.
#[must_use]
pub fn price_order(lines: &[CartLine], voucher: Option<&Voucher>, shop: &ShopConfig) -> OrderPricing {
    let subtotal: Price = lines.iter().map(CartLine::subtotal).sum();
    let discount = voucher.map_or(Price::ZERO, |v| v.discount_on(subtotal));
    let shipping_cost = if subtotal >= shop.free_shipping_threshold {
        Price::ZERO
    } else {
        shop.shipping_cost
    };
    let total = subtotal - discount + shipping_cost;

    OrderPricing {
        subtotal,
        discount,
        shipping_cost,
        total,
    }
}

/// Characters for order number suffixes, without look-alikes (0/O, 1/I).
const ORDER_NUMBER_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// `GR-YYYYMMDD-XXXXXX`.
#[must_use]
pub fn generate_order_number(placed_at: DateTime<Utc>) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..6)
        .filter_map(|_| ORDER_NUMBER_CHARSET.choose(&mut rng).copied().map(char::from))
        .collect();
    format!("GR-{}-{suffix}", placed_at.format("%Y%m%d"))
}

/// Checkout form input.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub shipping: ShippingDetails,
    pub payment_method: PaymentMethod,
    pub voucher_code: Option<String>,
    pub notes: Option<String>,
}

/// A newly placed order.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub id: OrderId,
    pub order_number: String,
    pub total: Price,
}

// =============================================================================
// Service
// =============================================================================

/// Order service.
pub struct OrderService<'a> {
    pool: &'a PgPool,
    orders: OrderRepository<'a>,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            orders: OrderRepository::new(pool),
        }
    }

    /// A user's order history, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the query fails.
    pub async fn history(
        &self,
        user_id: UserId,
        limit: Option<i64>,
    ) -> Result<Vec<OrderSummary>, OrderError> {
        Ok(self.orders.list_for_user(user_id, limit).await?)
    }

    /// One of a user's orders with its line items.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::InvalidId` for a non-positive ID and
    /// `OrderError::NotFound` if the order is missing or not theirs.
    pub async fn detail(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<(Order, Vec<OrderLine>), OrderError> {
        if !order_id.is_valid() {
            return Err(OrderError::InvalidId);
        }
        let order = self
            .orders
            .get_for_user(user_id, order_id)
            .await?
            .ok_or(OrderError::NotFound)?;
        let lines = self.orders.lines(order_id).await?;

        Ok((order, lines))
    }

    /// Cancel a placed or confirmed order and put its items back in stock.
    ///
    /// Returns the order number.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::InvalidId`, `NotFound` or `NotCancellable`; nothing
    /// is changed in those cases.
    pub async fn cancel(&self, user_id: UserId, order_id: OrderId) -> Result<String, OrderError> {
        if !order_id.is_valid() {
            return Err(OrderError::InvalidId);
        }

        let mut tx = self.pool.begin().await?;

        let locked = OrderRepository::lock_for_user(&mut tx, user_id, order_id)
            .await?
            .ok_or(OrderError::NotFound)?;
        if !locked.status.is_cancellable() {
            return Err(OrderError::NotCancellable(locked.status));
        }

        OrderRepository::mark_cancelled(&mut tx, order_id).await?;
        ProductRepository::restore_stock_for_order(&mut tx, order_id).await?;

        tx.commit().await?;

        tracing::info!(%user_id, %order_id, order_number = %locked.order_number, "Order cancelled");
        Ok(locked.order_number)
    }

    /// Put the items of a past order back into the cart, as far as stock allows.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::InvalidId` or `NotFound` for a bad order, and
    /// `OrderError::NothingAvailable` if no line could be added; the cart is
    /// unchanged in those cases.
    pub async fn reorder(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<ReorderOutcome, OrderError> {
        if !order_id.is_valid() {
            return Err(OrderError::InvalidId);
        }

        let mut tx = self.pool.begin().await?;

        let locked = OrderRepository::lock_for_user(&mut tx, user_id, order_id)
            .await?
            .ok_or(OrderError::NotFound)?;

        ProductRepository::lock_for_order(&mut tx, order_id).await?;
        let items = OrderRepository::reorder_items(&mut tx, order_id).await?;

        let plan = plan_reorder(&items);
        if plan.additions.is_empty() {
            return Err(OrderError::NothingAvailable {
                order_number: locked.order_number,
            });
        }

        for &(product_id, quantity) in &plan.additions {
            CartRepository::add(&mut tx, user_id, product_id, quantity).await?;
        }

        tx.commit().await?;

        tracing::info!(
            %user_id,
            %order_id,
            lines_added = plan.additions.len(),
            shortfalls = plan.shortfalls.len(),
            "Order re-added to cart"
        );

        Ok(ReorderOutcome {
            order_number: locked.order_number,
            lines_added: plan.additions.len(),
            shortfalls: plan.shortfalls,
        })
    }

    /// Turn the user's cart into an order.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::MissingShippingDetails`, `EmptyCart`, `OutOfStock`
    /// or `InvalidVoucher`; the cart and stock are unchanged in those cases.
    pub async fn checkout(
        &self,
        user_id: UserId,
        request: &CheckoutRequest,
        shop: &ShopConfig,
    ) -> Result<PlacedOrder, OrderError> {
        let shipping = &request.shipping;
        if [
            &shipping.name,
            &shipping.email,
            &shipping.phone,
            &shipping.address,
            &shipping.city,
            &shipping.county,
        ]
        .iter()
        .any(|field| field.trim().is_empty())
        {
            return Err(OrderError::MissingShippingDetails);
        }

        let mut tx = self.pool.begin().await?;

        let lines = ProductRepository::lock_cart_lines(&mut tx, user_id).await?;
        if lines.is_empty() {
            return Err(OrderError::EmptyCart);
        }
        if let Some(line) = lines.iter().find(|line| !line.is_available()) {
            return Err(OrderError::OutOfStock {
                name: line.name.clone(),
            });
        }

        let voucher = match request.voucher_code.as_deref() {
            Some(code) => Some(
                VoucherRepository::find_active(&mut tx, code)
                    .await?
                    .ok_or(OrderError::InvalidVoucher)?,
            ),
            None => None,
        };

        let pricing = price_order(&lines, voucher.as_ref(), shop);
        let new_order = NewOrder {
            order_number: generate_order_number(Utc::now()),
            user_id,
            subtotal: pricing.subtotal,
            discount: pricing.discount,
            shipping_cost: pricing.shipping_cost,
            total: pricing.total,
            payment_method: request.payment_method,
            shipping: shipping.clone(),
            notes: request.notes.clone(),
            voucher_id: voucher.as_ref().map(|v| v.id),
        };

        let order_id = OrderRepository::insert(&mut tx, &new_order).await?;
        for line in &lines {
            let order_line = OrderLine {
                product_id: Some(line.product_id),
                product_name: line.name.clone(),
                unit_price: line.unit_price,
                quantity: line.quantity,
                subtotal: line.subtotal(),
                image: None,
            };
            OrderRepository::insert_line(&mut tx, order_id, &order_line).await?;
            ProductRepository::decrement_stock(&mut tx, line.product_id, line.quantity).await?;
        }
        CartRepository::clear(&mut tx, user_id).await?;

        tx.commit().await?;

        tracing::info!(
            %user_id,
            %order_id,
            order_number = %new_order.order_number,
            total = %pricing.total,
            "Order placed"
        );

        Ok(PlacedOrder {
            id: order_id,
            order_number: new_order.order_number,
            total: pricing.total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gusturi_core::{DiscountType, VoucherId};
    use rust_decimal::Decimal;

    fn item(id: i32, requested: i32, stock: i32, active: bool) -> ReorderItem {
        ReorderItem {
            product_id: Some(ProductId::new(id)),
            name: format!("Produs {id}"),
            requested,
            stock,
            active,
        }
    }

    fn cart_line(id: i32, price_bani: i64, quantity: i32) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            code: format!("P-{id}"),
            name: format!("Produs {id}"),
            unit_price: Price::from_bani(price_bani),
            quantity,
            stock: 100,
            active: true,
            image: None,
        }
    }

    // -------------------------------------------------------------------------
    // plan_reorder
    // -------------------------------------------------------------------------

    #[test]
    fn test_plan_reorder_full_availability() {
        let plan = plan_reorder(&[item(1, 2, 10, true), item(2, 1, 1, true)]);
        assert_eq!(
            plan.additions,
            vec![(ProductId::new(1), 2), (ProductId::new(2), 1)]
        );
        assert!(plan.shortfalls.is_empty());
    }

    #[test]
    fn test_plan_reorder_partial_stock_adds_available_and_reports_shortfall() {
        let plan = plan_reorder(&[item(1, 5, 3, true)]);
        assert_eq!(plan.additions, vec![(ProductId::new(1), 3)]);
        assert_eq!(
            plan.shortfalls,
            vec![ReorderShortfall {
                name: "Produs 1".to_string(),
                requested: 5,
                available: 3,
            }]
        );
    }

    #[test]
    fn test_plan_reorder_out_of_stock_adds_nothing() {
        let plan = plan_reorder(&[item(1, 2, 0, true)]);
        assert!(plan.additions.is_empty());
        assert_eq!(plan.shortfalls.len(), 1);
    }

    #[test]
    fn test_plan_reorder_inactive_product_is_unavailable() {
        let plan = plan_reorder(&[item(1, 2, 50, false)]);
        assert!(plan.additions.is_empty());
        assert_eq!(plan.shortfalls[0].available, 0);
    }

    #[test]
    fn test_plan_reorder_deleted_product_is_unavailable() {
        let deleted = ReorderItem {
            product_id: None,
            name: "Dulceață de caise".to_string(),
            requested: 1,
            stock: 0,
            active: false,
        };
        let plan = plan_reorder(&[deleted, item(2, 1, 4, true)]);
        assert_eq!(plan.additions, vec![(ProductId::new(2), 1)]);
        assert_eq!(plan.shortfalls[0].name, "Dulceață de caise");
    }

    #[test]
    fn test_reorder_success_message_mentions_shortfalls() {
        let mut outcome = ReorderOutcome {
            order_number: "GR-20250101-ABCDEF".to_string(),
            lines_added: 1,
            shortfalls: Vec::new(),
        };
        assert_eq!(outcome.success_message(), "Produsele au fost adăugate în coș.");

        outcome.shortfalls.push(ReorderShortfall {
            name: "Telemea".to_string(),
            requested: 2,
            available: 1,
        });
        assert!(outcome.success_message().ends_with("în cantitatea dorită."));
    }

    // -------------------------------------------------------------------------
    // price_order
    // -------------------------------------------------------------------------

    #[test]
    fn test_price_order_charges_shipping_below_threshold() {
        let pricing = price_order(&[cart_line(1, 2500, 2)], None, &ShopConfig::default());
        assert_eq!(pricing.subtotal, Price::from_bani(5000));
        assert_eq!(pricing.discount, Price::ZERO);
        assert_eq!(pricing.shipping_cost, Price::from_bani(1500));
        assert_eq!(pricing.total, Price::from_bani(6500));
    }

    #[test]
    fn test_price_order_free_shipping_at_threshold() {
        let pricing = price_order(&[cart_line(1, 10000, 2)], None, &ShopConfig::default());
        assert_eq!(pricing.shipping_cost, Price::ZERO);
        assert_eq!(pricing.total, Price::from_bani(20000));
    }

    #[test]
    fn test_price_order_applies_percent_voucher() {
        let voucher = Voucher {
            id: VoucherId::new(1),
            code: "BINE10".to_string(),
            value: Decimal::from(10),
            discount_type: DiscountType::Percent,
        };
        let pricing = price_order(
            &[cart_line(1, 3000, 2), cart_line(2, 4000, 1)],
            Some(&voucher),
            &ShopConfig::default(),
        );
        assert_eq!(pricing.subtotal, Price::from_bani(10000));
        assert_eq!(pricing.discount, Price::from_bani(1000));
        assert_eq!(pricing.total, Price::from_bani(10500));
    }

    #[test]
    fn test_price_order_fixed_voucher_never_goes_negative() {
        let voucher = Voucher {
            id: VoucherId::new(2),
            code: "CADOU100".to_string(),
            value: Decimal::from(100),
            discount_type: DiscountType::Fixed,
        };
        let pricing = price_order(&[cart_line(1, 2000, 1)], Some(&voucher), &ShopConfig::default());
        assert_eq!(pricing.discount, Price::from_bani(2000));
        assert_eq!(pricing.total, Price::from_bani(1500));
    }

    #[test]
    fn test_line_subtotals_sum_to_order_subtotal() {
        let lines = [cart_line(1, 1999, 3), cart_line(2, 550, 7)];
        let pricing = price_order(&lines, None, &ShopConfig::default());
        let line_sum: Price = lines.iter().map(CartLine::subtotal).sum();
        assert_eq!(pricing.subtotal, line_sum);
    }

    // -------------------------------------------------------------------------
    // Misc
    // -------------------------------------------------------------------------

    #[test]
    fn test_order_number_format() {
        let placed_at = DateTime::parse_from_rfc3339("2025-03-07T10:00:00Z")
            .map(|d| d.with_timezone(&Utc))
            .ok();
        let Some(placed_at) = placed_at else {
            panic!("valid timestamp");
        };
        let number = generate_order_number(placed_at);
        assert!(number.starts_with("GR-20250307-"));
        assert_eq!(number.len(), "GR-20250307-".len() + 6);
        assert!(
            number
                .trim_start_matches("GR-20250307-")
                .bytes()
                .all(|b| ORDER_NUMBER_CHARSET.contains(&b))
        );
    }

    #[test]
    fn test_not_cancellable_message_names_status() {
        assert_eq!(
            OrderError::NotCancellable(OrderStatus::Shipped).user_message(),
            "Această comandă nu mai poate fi anulată deoarece este deja expediată."
        );
        assert_eq!(
            OrderError::NotCancellable(OrderStatus::Processing).user_message(),
            "Această comandă nu mai poate fi anulată deoarece este deja în procesare."
        );
    }
}
