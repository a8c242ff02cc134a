//! Session repository
//!
//! Database operations for server-side sessions. Flash messages are stored
//! as a JSON object in the `flash` column.

use crate::db::Database;
use crate::models::{Flash, Session};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Create a new session
    async fn create(&self, session: &Session) -> Result<Session>;

    /// Get session by ID (cookie value)
    async fn get_by_id(&self, id: &str) -> Result<Option<Session>>;

    /// Persist the mutable fields of a session
    async fn update(&self, session: &Session) -> Result<()>;

    /// Delete a session
    async fn delete(&self, id: &str) -> Result<()>;

    /// Delete expired sessions, returning how many were removed
    async fn delete_expired(&self) -> Result<u64>;
}

/// SQLx-based session repository implementation
pub struct SqlxSessionRepository {
    db: Database,
}

impl SqlxSessionRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(db: Database) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(db))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        create_session(self.db.pool(), session).await
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        get_session_by_id(self.db.pool(), id).await
    }

    async fn update(&self, session: &Session) -> Result<()> {
        update_session(self.db.pool(), session).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
            .bind(Utc::now())
            .execute(self.db.pool())
            .await
            .context("Failed to delete expired sessions")?;
        Ok(result.rows_affected())
    }
}

async fn create_session(pool: &SqlitePool, session: &Session) -> Result<Session> {
    let flash = serde_json::to_string(&session.flash).context("Failed to encode flash")?;

    sqlx::query(
        r#"
        INSERT INTO sessions (id, user_id, is_logged_in, csrf_token, flash, expires_at, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&session.id)
    .bind(session.user_id)
    .bind(session.is_logged_in)
    .bind(&session.csrf_token)
    .bind(flash)
    .bind(session.expires_at)
    .bind(session.created_at)
    .execute(pool)
    .await
    .context("Failed to create session")?;

    Ok(session.clone())
}

async fn get_session_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Session>> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, is_logged_in, csrf_token, flash, expires_at, created_at
        FROM sessions
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get session by ID")?;

    row.as_ref().map(row_to_session).transpose()
}

async fn update_session(pool: &SqlitePool, session: &Session) -> Result<()> {
    let flash = serde_json::to_string(&session.flash).context("Failed to encode flash")?;

    sqlx::query(
        r#"
        UPDATE sessions
        SET user_id = ?, is_logged_in = ?, csrf_token = ?, flash = ?, expires_at = ?
        WHERE id = ?
        "#,
    )
    .bind(session.user_id)
    .bind(session.is_logged_in)
    .bind(&session.csrf_token)
    .bind(flash)
    .bind(session.expires_at)
    .bind(&session.id)
    .execute(pool)
    .await
    .context("Failed to update session")?;
    Ok(())
}

fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<Session> {
    let flash_json: String = row.try_get("flash")?;
    // A corrupt flash column should not lock the visitor out
    let flash: Flash = serde_json::from_str(&flash_json).unwrap_or_default();

    Ok(Session {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        is_logged_in: row.try_get("is_logged_in")?,
        csrf_token: row.try_get("csrf_token")?,
        flash,
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
    })
}
