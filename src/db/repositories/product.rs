//! Product repository

use crate::db::Database;
use crate::models::{CreateProductInput, ListParams, PagedResult, Product, UpdateProductInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// Product repository trait
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Create a product owned by `user_id`
    async fn create(&self, user_id: i64, input: &CreateProductInput) -> Result<Product>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Product>>;

    /// Update fields of an existing product, returning the new state
    async fn update(&self, id: i64, input: &UpdateProductInput) -> Result<Option<Product>>;

    /// Delete a product only if `user_id` owns it. Returns whether a row was removed.
    async fn delete_owned(&self, id: i64, user_id: i64) -> Result<bool>;

    /// All products, oldest first, one page at a time
    async fn list(&self, params: &ListParams) -> Result<PagedResult<Product>>;

    /// Products created by one user, oldest first
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Product>>;
}

/// SQLx-based product repository implementation
pub struct SqlxProductRepository {
    db: Database,
}

impl SqlxProductRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn boxed(db: Database) -> Arc<dyn ProductRepository> {
        Arc::new(Self::new(db))
    }
}

#[async_trait]
impl ProductRepository for SqlxProductRepository {
    async fn create(&self, user_id: i64, input: &CreateProductInput) -> Result<Product> {
        create_product(self.db.pool(), user_id, input).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Product>> {
        get_product_by_id(self.db.pool(), id).await
    }

    async fn update(&self, id: i64, input: &UpdateProductInput) -> Result<Option<Product>> {
        update_product(self.db.pool(), id, input).await
    }

    async fn delete_owned(&self, id: i64, user_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(self.db.pool())
            .await
            .context("Failed to delete product")?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, params: &ListParams) -> Result<PagedResult<Product>> {
        list_products(self.db.pool(), params).await
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Product>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, price_cents, description, image_url, user_id, created_at, updated_at
            FROM products
            WHERE user_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.db.pool())
        .await
        .context("Failed to list products by user")?;

        rows.iter().map(row_to_product).collect()
    }
}

async fn create_product(
    pool: &SqlitePool,
    user_id: i64,
    input: &CreateProductInput,
) -> Result<Product> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO products (title, price_cents, description, image_url, user_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.title)
    .bind(input.price_cents)
    .bind(&input.description)
    .bind(&input.image_url)
    .bind(user_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create product")?;

    Ok(Product {
        id: result.last_insert_rowid(),
        title: input.title.clone(),
        price_cents: input.price_cents,
        description: input.description.clone(),
        image_url: input.image_url.clone(),
        user_id,
        created_at: now,
        updated_at: now,
    })
}

async fn get_product_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Product>> {
    let row = sqlx::query(
        r#"
        SELECT id, title, price_cents, description, image_url, user_id, created_at, updated_at
        FROM products
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get product by ID")?;

    row.as_ref().map(row_to_product).transpose()
}

async fn update_product(
    pool: &SqlitePool,
    id: i64,
    input: &UpdateProductInput,
) -> Result<Option<Product>> {
    let result = sqlx::query(
        r#"
        UPDATE products
        SET title = ?, price_cents = ?, description = ?,
            image_url = COALESCE(?, image_url), updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&input.title)
    .bind(input.price_cents)
    .bind(&input.description)
    .bind(input.image_url.as_deref())
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update product")?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_product_by_id(pool, id).await
}

async fn list_products(pool: &SqlitePool, params: &ListParams) -> Result<PagedResult<Product>> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(pool)
        .await
        .context("Failed to count products")?;

    let rows = sqlx::query(
        r#"
        SELECT id, title, price_cents, description, image_url, user_id, created_at, updated_at
        FROM products
        ORDER BY created_at ASC, id ASC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(pool)
    .await
    .context("Failed to list products")?;

    let items = rows.iter().map(row_to_product).collect::<Result<Vec<_>>>()?;
    Ok(PagedResult::new(items, total, params))
}

pub(crate) fn row_to_product(row: &sqlx::sqlite::SqliteRow) -> Result<Product> {
    Ok(Product {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        price_cents: row.try_get("price_cents")?,
        description: row.try_get("description")?,
        image_url: row.try_get("image_url")?,
        user_id: row.try_get("user_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
