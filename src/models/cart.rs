//! Cart model
//!
//! A cart belongs to exactly one user and holds at most one line per product.

use serde::Serialize;

use super::Product;

/// A cart line joined with its product, as shown on the cart and checkout pages
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub product: Product,
    pub quantity: i64,
}

impl CartLine {
    pub fn subtotal_cents(&self) -> i64 {
        self.product.price_cents * self.quantity
    }
}

/// Sum of all line subtotals
pub fn cart_total_cents(lines: &[CartLine]) -> i64 {
    lines.iter().map(CartLine::subtotal_cents).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn line(price_cents: i64, quantity: i64) -> CartLine {
        let now = Utc::now();
        CartLine {
            product: Product {
                id: 1,
                title: "Book".to_string(),
                price_cents,
                description: "A book".to_string(),
                image_url: "/images/book.png".to_string(),
                user_id: 1,
                created_at: now,
                updated_at: now,
            },
            quantity,
        }
    }

    #[test]
    fn test_cart_total() {
        let lines = vec![line(1999, 2), line(500, 1)];
        assert_eq!(lines[0].subtotal_cents(), 3998);
        assert_eq!(cart_total_cents(&lines), 4498);
        assert_eq!(cart_total_cents(&[]), 0);
    }
}
