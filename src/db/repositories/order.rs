//! Order repository

use crate::db::repositories::cart::fetch_cart_lines;
use crate::db::Database;
use crate::models::{cart_total_cents, Order, OrderItem};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Turn the user's cart into an order and empty the cart, atomically.
    ///
    /// Returns `None` when the cart is empty.
    async fn create_from_cart(&self, user_id: i64, email: &str) -> Result<Option<Order>>;

    /// Orders of one user, newest first
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Order>>;
}

pub struct SqlxOrderRepository {
    db: Database,
}

impl SqlxOrderRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn boxed(db: Database) -> Arc<dyn OrderRepository> {
        Arc::new(Self::new(db))
    }
}

#[async_trait]
impl OrderRepository for SqlxOrderRepository {
    async fn create_from_cart(&self, user_id: i64, email: &str) -> Result<Option<Order>> {
        create_order_from_cart(self.db.pool(), user_id, email).await
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Order>> {
        list_orders_by_user(self.db.pool(), user_id).await
    }
}

async fn create_order_from_cart(
    pool: &SqlitePool,
    user_id: i64,
    email: &str,
) -> Result<Option<Order>> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let lines = fetch_cart_lines(&mut *tx, user_id).await?;
    if lines.is_empty() {
        return Ok(None);
    }

    let now = Utc::now();
    let total_cents = cart_total_cents(&lines);

    let result = sqlx::query(
        "INSERT INTO orders (user_id, email, total_cents, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(email)
    .bind(total_cents)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create order")?;
    let order_id = result.last_insert_rowid();

    let mut items = Vec::with_capacity(lines.len());
    for line in &lines {
        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, product_id, title, price_cents, quantity)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(order_id)
        .bind(line.product.id)
        .bind(&line.product.title)
        .bind(line.product.price_cents)
        .bind(line.quantity)
        .execute(&mut *tx)
        .await
        .context("Failed to create order item")?;

        items.push(OrderItem {
            product_id: Some(line.product.id),
            title: line.product.title.clone(),
            price_cents: line.product.price_cents,
            quantity: line.quantity,
        });
    }

    sqlx::query("DELETE FROM cart_items WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to clear cart")?;

    tx.commit().await.context("Failed to commit order")?;

    Ok(Some(Order {
        id: order_id,
        user_id,
        email: email.to_string(),
        total_cents,
        items,
        created_at: now,
    }))
}

async fn list_orders_by_user(pool: &SqlitePool, user_id: i64) -> Result<Vec<Order>> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, email, total_cents, created_at
        FROM orders
        WHERE user_id = ?
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list orders")?;

    let mut orders = rows
        .iter()
        .map(|row| {
            Ok(Order {
                id: row.try_get("id")?,
                user_id: row.try_get("user_id")?,
                email: row.try_get("email")?,
                total_cents: row.try_get("total_cents")?,
                items: Vec::new(),
                created_at: row.try_get("created_at")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let item_rows = sqlx::query(
        r#"
        SELECT i.order_id, i.product_id, i.title, i.price_cents, i.quantity
        FROM order_items i
        JOIN orders o ON o.id = i.order_id
        WHERE o.user_id = ?
        ORDER BY i.id ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list order items")?;

    let mut items_by_order: HashMap<i64, Vec<OrderItem>> = HashMap::new();
    for row in &item_rows {
        let order_id: i64 = row.try_get("order_id")?;
        items_by_order.entry(order_id).or_default().push(OrderItem {
            product_id: row.try_get("product_id")?,
            title: row.try_get("title")?,
            price_cents: row.try_get("price_cents")?,
            quantity: row.try_get("quantity")?,
        });
    }

    for order in &mut orders {
        order.items = items_by_order.remove(&order.id).unwrap_or_default();
    }

    Ok(orders)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        CartRepository, ProductRepository, SqlxCartRepository, SqlxProductRepository,
        SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreateProductInput, UpdateProductInput, User};

    struct Fixture {
        orders: SqlxOrderRepository,
        carts: SqlxCartRepository,
        products: SqlxProductRepository,
        user_id: i64,
    }

    async fn setup() -> Fixture {
        let db = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&db)
            .await
            .expect("Failed to run migrations");
        let user = SqlxUserRepository::new(db.clone())
            .create(&User::new("buyer@example.com".to_string(), "hash".to_string()))
            .await
            .unwrap();
        Fixture {
            orders: SqlxOrderRepository::new(db.clone()),
            carts: SqlxCartRepository::new(db.clone()),
            products: SqlxProductRepository::new(db),
            user_id: user.id,
        }
    }

    async fn product(fx: &Fixture, title: &str, price_cents: i64) -> i64 {
        fx.products
            .create(
                fx.user_id,
                &CreateProductInput {
                    title: title.to_string(),
                    price_cents,
                    description: "Something".to_string(),
                    image_url: "/images/x.png".to_string(),
                },
            )
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_empty_cart_creates_no_order() {
        let fx = setup().await;
        let order = fx
            .orders
            .create_from_cart(fx.user_id, "buyer@example.com")
            .await
            .unwrap();
        assert!(order.is_none());
        assert!(fx.orders.list_by_user(fx.user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_order_snapshots_cart_and_clears_it() {
        let fx = setup().await;
        let book = product(&fx, "Book", 1000).await;
        let pen = product(&fx, "Pen", 150).await;
        fx.carts.add_item(fx.user_id, book).await.unwrap();
        fx.carts.add_item(fx.user_id, pen).await.unwrap();
        fx.carts.add_item(fx.user_id, pen).await.unwrap();

        let order = fx
            .orders
            .create_from_cart(fx.user_id, "buyer@example.com")
            .await
            .unwrap()
            .expect("order");

        assert_eq!(order.total_cents, 1300);
        assert_eq!(order.items.len(), 2);
        assert!(fx.carts.get_lines(fx.user_id).await.unwrap().is_empty());

        // Later price changes and deletions leave history untouched
        fx.products
            .update(
                book,
                &UpdateProductInput {
                    title: "Book 2nd ed.".to_string(),
                    price_cents: 5000,
                    description: "Something".to_string(),
                    image_url: None,
                },
            )
            .await
            .unwrap();
        fx.products.delete_owned(pen, fx.user_id).await.unwrap();

        let orders = fx.orders.list_by_user(fx.user_id).await.unwrap();
        assert_eq!(orders.len(), 1);
        let stored = &orders[0];
        assert_eq!(stored.email, "buyer@example.com");
        assert_eq!(stored.total_cents, 1300);
        assert_eq!(stored.items[0].title, "Book");
        assert_eq!(stored.items[0].price_cents, 1000);
        assert_eq!(stored.items[1].product_id, None);
        assert_eq!(stored.items[1].quantity, 2);
    }

    #[tokio::test]
    async fn test_orders_listed_newest_first() {
        let fx = setup().await;
        let book = product(&fx, "Book", 1000).await;

        fx.carts.add_item(fx.user_id, book).await.unwrap();
        let first = fx.orders.create_from_cart(fx.user_id, "b@e.com").await.unwrap().unwrap();
        fx.carts.add_item(fx.user_id, book).await.unwrap();
        let second = fx.orders.create_from_cart(fx.user_id, "b@e.com").await.unwrap().unwrap();

        let orders = fx.orders.list_by_user(fx.user_id).await.unwrap();
        assert_eq!(orders[0].id, second.id);
        assert_eq!(orders[1].id, first.id);
    }
}
