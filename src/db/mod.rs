//! Database layer
//!
//! SQLite through `sqlx`. `Database` owns the pool; `migrations` builds the
//! schema; `repositories` hold one repository per entity.
//!
//! ```ignore
//! use bazaar::db::{create_pool, migrations};
//!
//! let db = create_pool(&config.database).await?;
//! migrations::run_migrations(&db).await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, create_test_pool, Database};
