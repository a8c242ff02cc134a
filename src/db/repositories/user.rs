//! User repository
//!
//! Database operations for users.

use crate::db::Database;
use crate::models::User;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Get the user holding a reset token, whether or not it has expired
    async fn get_by_reset_token(&self, token: &str) -> Result<Option<User>>;

    /// Store a reset token and its expiry on a user
    async fn set_reset_token(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Replace the password hash and clear the reset token in one write,
    /// but only while `token` is still the user's live token at `now`.
    /// Returns false when the token was already consumed or has expired.
    async fn reset_password(
        &self,
        user_id: i64,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    db: Database,
}

impl SqlxUserRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(db: Database) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(db))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        create_user(self.db.pool(), user).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        get_user_by_id(self.db.pool(), id).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        get_user_by_email(self.db.pool(), email).await
    }

    async fn get_by_reset_token(&self, token: &str) -> Result<Option<User>> {
        get_user_by_reset_token(self.db.pool(), token).await
    }

    async fn set_reset_token(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        set_reset_token(self.db.pool(), user_id, token, expires_at).await
    }

    async fn reset_password(
        &self,
        user_id: i64,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        reset_password(self.db.pool(), user_id, token, password_hash, now).await
    }
}

async fn create_user(pool: &SqlitePool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (email, password_hash, created_at, updated_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        email: user.email.clone(),
        password_hash: user.password_hash.clone(),
        reset_token: None,
        reset_token_expires_at: None,
        created_at: now,
        updated_at: now,
    })
}

const USER_COLUMNS: &str =
    "id, email, password_hash, reset_token, reset_token_expires_at, created_at, updated_at";

async fn get_user_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;
    row.as_ref().map(row_to_user).transpose()
}

async fn get_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by email")?;
    row.as_ref().map(row_to_user).transpose()
}

async fn get_user_by_reset_token(pool: &SqlitePool, token: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM users WHERE reset_token = ?",
        USER_COLUMNS
    ))
    .bind(token)
    .fetch_optional(pool)
    .await
    .context("Failed to get user by reset token")?;
    row.as_ref().map(row_to_user).transpose()
}

async fn set_reset_token(
    pool: &SqlitePool,
    user_id: i64,
    token: &str,
    expires_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET reset_token = ?, reset_token_expires_at = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(token)
    .bind(expires_at)
    .bind(Utc::now())
    .bind(user_id)
    .execute(pool)
    .await
    .context("Failed to store reset token")?;
    Ok(())
}

async fn reset_password(
    pool: &SqlitePool,
    user_id: i64,
    token: &str,
    password_hash: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET password_hash = ?, reset_token = NULL, reset_token_expires_at = NULL, updated_at = ?
        WHERE id = ? AND reset_token = ? AND reset_token_expires_at > ?
        "#,
    )
    .bind(password_hash)
    .bind(now)
    .bind(user_id)
    .bind(token)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to update password")?;
    Ok(result.rows_affected() == 1)
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        reset_token: row.try_get("reset_token")?,
        reset_token_expires_at: row.try_get("reset_token_expires_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
