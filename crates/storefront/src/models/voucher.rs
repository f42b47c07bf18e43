//! Discount vouchers.

use gusturi_core::{DiscountType, Price, VoucherId};
use rust_decimal::Decimal;

/// An active discount code.
#[derive(Debug, Clone)]
pub struct Voucher {
    pub id: VoucherId,
    pub code: String,
    /// Amount in lei for `Fixed`, percentage points for `Percent`.
    pub value: Decimal,
    pub discount_type: DiscountType,
}

impl Voucher {
    /// Discount granted on `subtotal`, never more than the subtotal itself.
    #[must_use]
    pub fn discount_on(&self, subtotal: Price) -> Price {
        let discount = match self.discount_type {
            DiscountType::Fixed => Price::new(self.value),
            DiscountType::Percent => subtotal.percent(self.value),
        };
        discount.min(subtotal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voucher(value: Decimal, discount_type: DiscountType) -> Voucher {
        Voucher {
            id: VoucherId::new(1),
            code: "TOAMNA10".to_string(),
            value,
            discount_type,
        }
    }

    #[test]
    fn test_fixed_discount() {
        let v = voucher(Decimal::from(20), DiscountType::Fixed);
        assert_eq!(v.discount_on(Price::from_bani(10000)), Price::from_bani(2000));
    }

    #[test]
    fn test_fixed_discount_capped_at_subtotal() {
        let v = voucher(Decimal::from(50), DiscountType::Fixed);
        assert_eq!(v.discount_on(Price::from_bani(3000)), Price::from_bani(3000));
    }

    #[test]
    fn test_percent_discount() {
        let v = voucher(Decimal::from(10), DiscountType::Percent);
        assert_eq!(v.discount_on(Price::from_bani(12550)), Price::from_bani(1255));
    }

    #[test]
    fn test_percent_discount_capped_at_subtotal() {
        let v = voucher(Decimal::from(150), DiscountType::Percent);
        assert_eq!(v.discount_on(Price::from_bani(4000)), Price::from_bani(4000));
    }
}
