//! Shop service: cart and orders

use crate::db::repositories::{CartRepository, OrderRepository, ProductRepository};
use crate::models::{cart_total_cents, CartLine, Order, User};
use std::sync::Arc;

pub const MSG_EMPTY_CART: &str = "Your cart is empty.";

#[derive(Debug, thiserror::Error)]
pub enum ShopError {
    #[error("Product not found")]
    ProductNotFound,

    #[error("{}", MSG_EMPTY_CART)]
    EmptyCart,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Cart contents with the amount due
#[derive(Debug)]
pub struct CartSummary {
    pub lines: Vec<CartLine>,
    pub total_cents: i64,
}

pub struct ShopService {
    product_repo: Arc<dyn ProductRepository>,
    cart_repo: Arc<dyn CartRepository>,
    order_repo: Arc<dyn OrderRepository>,
}

impl ShopService {
    pub fn new(
        product_repo: Arc<dyn ProductRepository>,
        cart_repo: Arc<dyn CartRepository>,
        order_repo: Arc<dyn OrderRepository>,
    ) -> Self {
        Self {
            product_repo,
            cart_repo,
            order_repo,
        }
    }

    pub async fn cart(&self, user_id: i64) -> Result<CartSummary, ShopError> {
        let lines = self.cart_repo.get_lines(user_id).await?;
        let total_cents = cart_total_cents(&lines);
        Ok(CartSummary { lines, total_cents })
    }

    /// Add one unit of a product to the user's cart
    pub async fn add_to_cart(&self, user_id: i64, product_id: i64) -> Result<(), ShopError> {
        if self.product_repo.get_by_id(product_id).await?.is_none() {
            return Err(ShopError::ProductNotFound);
        }
        self.cart_repo.add_item(user_id, product_id).await?;
        Ok(())
    }

    /// Drop a product from the cart. Removing an absent product is not an error.
    pub async fn remove_from_cart(&self, user_id: i64, product_id: i64) -> Result<(), ShopError> {
        self.cart_repo.remove_item(user_id, product_id).await?;
        Ok(())
    }

    /// Turn the cart into an order
    pub async fn place_order(&self, user: &User) -> Result<Order, ShopError> {
        let order = self
            .order_repo
            .create_from_cart(user.id, &user.email)
            .await?
            .ok_or(ShopError::EmptyCart)?;

        tracing::info!(
            order_id = order.id,
            user_id = user.id,
            total_cents = order.total_cents,
            "Order placed"
        );
        Ok(order)
    }

    pub async fn orders(&self, user_id: i64) -> Result<Vec<Order>, ShopError> {
        Ok(self.order_repo.list_by_user(user_id).await?)
    }
}
