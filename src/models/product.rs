//! Product model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A product listed in the shop.
///
/// Prices are stored as integer cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub title: String,
    pub price_cents: i64,
    pub description: String,
    /// Public URL of the product image, e.g. `/images/20240101T000000.000Z-book.png`
    pub image_url: String,
    /// The user who created the product and may manage it
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }
}

/// Input for creating a product
#[derive(Debug, Clone)]
pub struct CreateProductInput {
    pub title: String,
    pub price_cents: i64,
    pub description: String,
    pub image_url: String,
}

/// Input for updating a product
#[derive(Debug, Clone)]
pub struct UpdateProductInput {
    pub title: String,
    pub price_cents: i64,
    pub description: String,
    /// Replacement image; `None` keeps the current one
    pub image_url: Option<String>,
}

/// Format cents as a decimal amount, e.g. `1999` -> `"19.99"`
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}
