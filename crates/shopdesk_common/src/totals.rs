//! Order totals in integer cents

use serde::{Deserialize, Serialize};

/// The four amount columns of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderAmounts {
    pub subtotal: u64,
    pub tax: u64,
    pub shipping: u64,
    pub discount: u64,
}

impl OrderAmounts {
    /// subtotal + tax + shipping - discount, floored at zero
    pub fn total(&self) -> u64 {
        self.subtotal
            .saturating_add(self.tax)
            .saturating_add(self.shipping)
            .saturating_sub(self.discount)
    }
}

/// Sum of totals over many orders
pub fn sum_totals(orders: &[OrderAmounts]) -> u64 {
    orders
        .iter()
        .fold(0u64, |acc, o| acc.saturating_add(o.total()))
}

/// Render cents as "123.45"
pub fn format_cents(cents: u64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total() {
        let order = OrderAmounts {
            subtotal: 10_000,
            tax: 2_100,
            shipping: 495,
            discount: 1_000,
        };
        assert_eq!(order.total(), 11_595);
        assert_eq!(format_cents(order.total()), "115.95");
    }

    #[test]
    fn test_discount_larger_than_order_floors_at_zero() {
        let order = OrderAmounts {
            subtotal: 500,
            discount: 2_000,
            ..Default::default()
        };
        assert_eq!(order.total(), 0);
    }

    #[test]
    fn test_sum_totals() {
        let orders = [
            OrderAmounts {
                subtotal: 100,
                ..Default::default()
            },
            OrderAmounts {
                subtotal: 200,
                shipping: 50,
                ..Default::default()
            },
        ];
        assert_eq!(sum_totals(&orders), 350);
        assert_eq!(sum_totals(&[]), 0);
        assert_eq!(format_cents(5), "0.05");
    }
}
