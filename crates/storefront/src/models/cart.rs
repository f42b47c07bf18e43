//! Shopping cart types.

use serde::{Deserialize, Serialize};

use gusturi_core::{Price, ProductId};

/// A cart line joined with the product's current price and stock.
#[derive(Debug, Clone)]
pub struct CartLine {
    pub product_id: ProductId,
    pub code: String,
    pub name: String,
    pub unit_price: Price,
    pub quantity: i32,
    pub stock: i32,
    pub active: bool,
    pub image: Option<String>,
}

impl CartLine {
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.unit_price.times(self.quantity)
    }

    /// Whether the line can be ordered as it stands.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.active && self.stock >= self.quantity
    }
}

/// A user's cart.
#[derive(Debug, Clone, Default)]
pub struct Cart {
    pub lines: Vec<CartLine>,
}

impl Cart {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.lines.iter().map(CartLine::subtotal).sum()
    }

    #[must_use]
    pub fn item_count(&self) -> i32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }
}

/// A product that could not be re-added in the quantity originally ordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderShortfall {
    pub name: String,
    pub requested: i32,
    pub available: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price_bani: i64, quantity: i32, stock: i32) -> CartLine {
        CartLine {
            product_id: ProductId::new(1),
            code: "ZAC-01".to_string(),
            name: "Zacuscă de casă".to_string(),
            unit_price: Price::from_bani(price_bani),
            quantity,
            stock,
            active: true,
            image: None,
        }
    }

    #[test]
    fn test_cart_totals() {
        let cart = Cart {
            lines: vec![line(1850, 2, 10), line(2500, 1, 3)],
        };
        assert_eq!(cart.subtotal(), Price::from_bani(6200));
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn test_line_availability() {
        assert!(line(100, 3, 3).is_available());
        assert!(!line(100, 4, 3).is_available());
        let mut inactive = line(100, 1, 10);
        inactive.active = false;
        assert!(!inactive.is_available());
    }
}
