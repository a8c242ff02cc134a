//! Order model
//!
//! Orders snapshot the title and price of every line at purchase time, so
//! later edits or deletion of a product leave order history unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    /// Email of the buyer at purchase time
    pub email: String,
    pub total_cents: i64,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// `None` once the product has been deleted
    pub product_id: Option<i64>,
    pub title: String,
    pub price_cents: i64,
    pub quantity: i64,
}

impl OrderItem {
    pub fn subtotal_cents(&self) -> i64 {
        self.price_cents * self.quantity
    }
}
