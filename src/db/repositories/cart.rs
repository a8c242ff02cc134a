//! Cart repository
//!
//! Cart lines are rows of `cart_items`, one per (user, product).

use crate::db::repositories::product::row_to_product;
use crate::db::Database;
use crate::models::CartLine;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Add one unit of a product, creating the line if needed
    async fn add_item(&self, user_id: i64, product_id: i64) -> Result<()>;

    /// Remove a product's line entirely. Returns whether a line existed.
    async fn remove_item(&self, user_id: i64, product_id: i64) -> Result<bool>;

    /// Cart lines joined with their products, in the order they were added
    async fn get_lines(&self, user_id: i64) -> Result<Vec<CartLine>>;

    async fn clear(&self, user_id: i64) -> Result<()>;
}

pub struct SqlxCartRepository {
    db: Database,
}

impl SqlxCartRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn boxed(db: Database) -> Arc<dyn CartRepository> {
        Arc::new(Self::new(db))
    }
}

#[async_trait]
impl CartRepository for SqlxCartRepository {
    async fn add_item(&self, user_id: i64, product_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cart_items (user_id, product_id, quantity, added_at)
            VALUES (?, ?, 1, ?)
            ON CONFLICT(user_id, product_id) DO UPDATE SET quantity = quantity + 1
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .bind(Utc::now())
        .execute(self.db.pool())
        .await
        .context("Failed to add cart item")?;
        Ok(())
    }

    async fn remove_item(&self, user_id: i64, product_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = ? AND product_id = ?")
            .bind(user_id)
            .bind(product_id)
            .execute(self.db.pool())
            .await
            .context("Failed to remove cart item")?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_lines(&self, user_id: i64) -> Result<Vec<CartLine>> {
        fetch_cart_lines(self.db.pool(), user_id).await
    }

    async fn clear(&self, user_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = ?")
            .bind(user_id)
            .execute(self.db.pool())
            .await
            .context("Failed to clear cart")?;
        Ok(())
    }
}

pub(crate) async fn fetch_cart_lines<'e, E>(executor: E, user_id: i64) -> Result<Vec<CartLine>>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT p.id, p.title, p.price_cents, p.description, p.image_url, p.user_id,
               p.created_at, p.updated_at, c.quantity
        FROM cart_items c
        JOIN products p ON p.id = c.product_id
        WHERE c.user_id = ?
        ORDER BY c.added_at ASC, c.product_id ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
    .context("Failed to load cart lines")?;

    rows.iter()
        .map(|row| {
            Ok(CartLine {
                product: row_to_product(row)?,
                quantity: row.try_get("quantity")?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        ProductRepository, SqlxProductRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreateProductInput, User};

    struct Fixture {
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
    async fn test_add_same_product_twice_increments() {
        let fx = setup().await;
        let book = product(&fx, "Book", 1000).await;

        fx.carts.add_item(fx.user_id, book).await.unwrap();
        fx.carts.add_item(fx.user_id, book).await.unwrap();

        let lines = fx.carts.get_lines(fx.user_id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product.id, book);
        assert_eq!(lines[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_lines_join_products() {
        let fx = setup().await;
        let book = product(&fx, "Book", 1000).await;
        let pen = product(&fx, "Pen", 150).await;

        fx.carts.add_item(fx.user_id, book).await.unwrap();
        fx.carts.add_item(fx.user_id, pen).await.unwrap();
        fx.carts.add_item(fx.user_id, pen).await.unwrap();

        let lines = fx.carts.get_lines(fx.user_id).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].product.title, "Book");
        assert_eq!(lines[1].quantity, 2);
        assert_eq!(crate::models::cart_total_cents(&lines), 1300);
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let fx = setup().await;
        let book = product(&fx, "Book", 1000).await;
        let pen = product(&fx, "Pen", 150).await;
        fx.carts.add_item(fx.user_id, book).await.unwrap();
        fx.carts.add_item(fx.user_id, pen).await.unwrap();

        assert!(fx.carts.remove_item(fx.user_id, book).await.unwrap());
        assert!(!fx.carts.remove_item(fx.user_id, book).await.unwrap());
        assert_eq!(fx.carts.get_lines(fx.user_id).await.unwrap().len(), 1);

        fx.carts.clear(fx.user_id).await.unwrap();
        assert!(fx.carts.get_lines(fx.user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deleting_product_drops_cart_line() {
        let fx = setup().await;
        let book = product(&fx, "Book", 1000).await;
        fx.carts.add_item(fx.user_id, book).await.unwrap();

        fx.products.delete_owned(book, fx.user_id).await.unwrap();
        assert!(fx.carts.get_lines(fx.user_id).await.unwrap().is_empty());
    }
}
