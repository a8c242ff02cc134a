//! Database migrations
//!
//! Migrations are embedded SQL applied in version order. Applied versions
//! are recorded in `_migrations`, so running them again is a no-op.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::Database;

/// A single schema migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (unique, ascending)
    pub version: i32,
    pub name: &'static str,
    /// SQL statements, separated by `;`
    pub up: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        up: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                reset_token VARCHAR(128),
                reset_token_expires_at TIMESTAMP,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_users_reset_token ON users(reset_token);
        "#,
    },
    Migration {
        version: 2,
        name: "create_sessions",
        up: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id INTEGER,
                is_logged_in INTEGER NOT NULL DEFAULT 0,
                csrf_token VARCHAR(128) NOT NULL,
                flash TEXT NOT NULL DEFAULT '{}',
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
        "#,
    },
    Migration {
        version: 3,
        name: "create_products",
        up: r#"
            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(255) NOT NULL,
                price_cents INTEGER NOT NULL,
                description TEXT NOT NULL,
                image_url VARCHAR(512) NOT NULL,
                user_id INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_products_user_id ON products(user_id);
        "#,
    },
    Migration {
        version: 4,
        name: "create_cart_items",
        up: r#"
            CREATE TABLE IF NOT EXISTS cart_items (
                user_id INTEGER NOT NULL,
                product_id INTEGER NOT NULL,
                quantity INTEGER NOT NULL CHECK (quantity > 0),
                added_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (user_id, product_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
                FOREIGN KEY (product_id) REFERENCES products(id) ON DELETE CASCADE
            );
        "#,
    },
    Migration {
        version: 5,
        name: "create_orders",
        up: r#"
            CREATE TABLE IF NOT EXISTS orders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                email VARCHAR(255) NOT NULL,
                total_cents INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_orders_user_id ON orders(user_id);
            CREATE TABLE IF NOT EXISTS order_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                order_id INTEGER NOT NULL,
                product_id INTEGER,
                title VARCHAR(255) NOT NULL,
                price_cents INTEGER NOT NULL,
                quantity INTEGER NOT NULL,
                FOREIGN KEY (order_id) REFERENCES orders(id) ON DELETE CASCADE,
                FOREIGN KEY (product_id) REFERENCES products(id) ON DELETE SET NULL
            );
            CREATE INDEX IF NOT EXISTS idx_order_items_order_id ON order_items(order_id);
        "#,
    },
];

/// Run all pending migrations, returning how many were applied
pub async fn run_migrations(db: &Database) -> Result<usize> {
    create_migrations_table(db).await?;

    let applied = get_applied_migrations(db).await?;
    let applied_versions: Vec<i64> = applied.iter().map(|m| m.version).collect();

    let mut count = 0;
    for migration in MIGRATIONS {
        if applied_versions.contains(&i64::from(migration.version)) {
            continue;
        }
        tracing::info!(
            "Applying migration {}: {}",
            migration.version,
            migration.name
        );
        apply_migration(db, migration)
            .await
            .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
        count += 1;
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

async fn create_migrations_table(db: &Database) -> Result<()> {
    db.execute(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name VARCHAR(255) NOT NULL UNIQUE,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .await?;
    Ok(())
}

async fn get_applied_migrations(db: &Database) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(db.pool())
        .await
        .context("Failed to read applied migrations")?;

    rows.iter()
        .map(|row| {
            Ok(MigrationRecord {
                version: row.try_get("version")?,
                name: row.try_get("name")?,
                applied_at: row.try_get("applied_at")?,
            })
        })
        .collect()
}

/// Apply one migration and its bookkeeping row in a single transaction
async fn apply_migration(db: &Database, migration: &Migration) -> Result<()> {
    let mut tx = db.pool().begin().await?;

    for statement in split_sql_statements(migration.up) {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name, applied_at) VALUES (?, ?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split SQL into individual statements, skipping comment-only fragments
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty() && !is_comment_only(stmt))
        .collect()
}

fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

/// Number of migrations not yet applied
pub async fn pending_count(db: &Database) -> Result<usize> {
    create_migrations_table(db).await?;
    let applied = get_applied_migrations(db).await?;
    Ok(MIGRATIONS.len().saturating_sub(applied.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    async fn table_exists(db: &Database, name: &str) -> bool {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(name)
        .fetch_one(db.pool())
        .await
        .expect("Failed to query sqlite_master");
        count == 1
    }

    #[tokio::test]
    async fn test_run_migrations_creates_tables() {
        let db = create_test_pool().await.unwrap();
        let applied = run_migrations(&db).await.expect("Migrations failed");
        assert_eq!(applied, MIGRATIONS.len());

        for table in ["users", "sessions", "products", "cart_items", "orders", "order_items"] {
            assert!(table_exists(&db, table).await, "missing table {}", table);
        }
    }

    #[tokio::test]
    async fn test_run_migrations_is_idempotent() {
        let db = create_test_pool().await.unwrap();
        run_migrations(&db).await.unwrap();

        assert_eq!(run_migrations(&db).await.unwrap(), 0);
        assert_eq!(pending_count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_pending_count_before_migrating() {
        let db = create_test_pool().await.unwrap();
        assert_eq!(pending_count(&db).await.unwrap(), MIGRATIONS.len());
    }

    #[tokio::test]
    async fn test_unique_email_constraint() {
        let db = create_test_pool().await.unwrap();
        run_migrations(&db).await.unwrap();

        db.execute("INSERT INTO users (email, password_hash) VALUES ('a@b.c', 'x')")
            .await
            .unwrap();
        let result = db
            .execute("INSERT INTO users (email, password_hash) VALUES ('a@b.c', 'y')")
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_cart_quantity_must_be_positive() {
        let db = create_test_pool().await.unwrap();
        run_migrations(&db).await.unwrap();

        db.execute("INSERT INTO users (id, email, password_hash) VALUES (1, 'a@b.c', 'x')")
            .await
            .unwrap();
        db.execute(
            "INSERT INTO products (id, title, price_cents, description, image_url, user_id) \
             VALUES (1, 'Book', 100, 'A book', 'images/x.png', 1)",
        )
        .await
        .unwrap();

        let result = db
            .execute("INSERT INTO cart_items (user_id, product_id, quantity) VALUES (1, 1, 0)")
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_split_sql_statements() {
        let statements = split_sql_statements("CREATE TABLE a (id INT); CREATE TABLE b (id INT);");
        assert_eq!(statements.len(), 2);

        let statements = split_sql_statements("-- Comment\nCREATE TABLE a (id INT);\n-- trailing");
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn test_is_comment_only() {
        assert!(is_comment_only("-- This is a comment"));
        assert!(is_comment_only("-- Line 1\n-- Line 2"));
        assert!(!is_comment_only("-- Comment\nCREATE TABLE test"));
    }
}
