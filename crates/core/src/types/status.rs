//! Status enums for orders, accounts and vouchers.
//!
//! Each enum maps to a PostgreSQL enum in the `shop` schema when the
//! `postgres` feature is enabled. `Display`/`FromStr` use the same snake_case
//! codes as the database, so form values round-trip through them; the
//! Romanian labels shown to customers come from `label()`.

use serde::{Deserialize, Serialize};

/// Lifecycle of an order, from placement to delivery or cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Placed,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Placed,
        Self::Confirmed,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Customers may cancel only before the order enters processing.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        matches!(self, Self::Placed | Self::Confirmed)
    }

    /// Cancelled orders are excluded from revenue.
    #[must_use]
    pub const fn counts_toward_revenue(self) -> bool {
        !matches!(self, Self::Cancelled)
    }

    /// Customer-facing label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Placed => "Plasată",
            Self::Confirmed => "Confirmată",
            Self::Processing => "În procesare",
            Self::Shipped => "Expediată",
            Self::Delivered => "Livrată",
            Self::Cancelled => "Anulată",
        }
    }

    /// CSS modifier for the status badge.
    #[must_use]
    pub const fn badge_class(self) -> &'static str {
        match self {
            Self::Placed => "badge-info",
            Self::Confirmed | Self::Processing => "badge-primary",
            Self::Shipped => "badge-warning",
            Self::Delivered => "badge-success",
            Self::Cancelled => "badge-danger",
        }
    }

    /// Database code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Placed => "placed",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// A shopper; sees only their own account and orders.
    #[default]
    Client,
    /// Back-office access, including user management.
    Administrator,
}

impl UserRole {
    pub const ALL: [Self; 2] = [Self::Client, Self::Administrator];

    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Administrator)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Client => "Client",
            Self::Administrator => "Administrator",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Administrator => "administrator",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Self::Client),
            "administrator" => Ok(Self::Administrator),
            _ => Err(format!("invalid user role: {s}")),
        }
    }
}

/// Whether an account may sign in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.account_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    #[default]
    Active,
    Inactive,
}

impl AccountStatus {
    pub const ALL: [Self; 2] = [Self::Active, Self::Inactive];

    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Active => "Activ",
            Self::Inactive => "Inactiv",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            _ => Err(format!("invalid account status: {s}")),
        }
    }
}

/// How a voucher's value is applied to an order subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.discount_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// A fixed amount in lei.
    Fixed,
    /// A percentage of the subtotal.
    Percent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_placed_and_confirmed_are_cancellable() {
        let cancellable: Vec<_> = OrderStatus::ALL
            .into_iter()
            .filter(|s| s.is_cancellable())
            .collect();
        assert_eq!(cancellable, vec![OrderStatus::Placed, OrderStatus::Confirmed]);
    }

    #[test]
    fn test_order_status_codes_round_trip() {
        for status in OrderStatus::ALL {
            assert_eq!(status.to_string().parse::<OrderStatus>(), Ok(status));
        }
        assert!("sent".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_order_status_labels() {
        assert_eq!(OrderStatus::Shipped.label(), "Expediată");
        assert_eq!(OrderStatus::Processing.label(), "În procesare");
        assert!(!OrderStatus::Cancelled.counts_toward_revenue());
    }

    #[test]
    fn test_user_role_from_form_value() {
        assert_eq!("administrator".parse(), Ok(UserRole::Administrator));
        assert_eq!("client".parse(), Ok(UserRole::Client));
        assert!("admin".parse::<UserRole>().is_err());
        assert!(UserRole::Administrator.is_admin());
    }

    #[test]
    fn test_account_status_from_form_value() {
        assert_eq!("inactive".parse(), Ok(AccountStatus::Inactive));
        assert!(AccountStatus::Active.is_active());
        assert!("banned".parse::<AccountStatus>().is_err());
    }

    #[test]
    fn test_serde_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Cancelled).ok().as_deref(),
            Some("\"cancelled\"")
        );
    }
}
