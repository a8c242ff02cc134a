//! Database repositories
//!
//! One repository per entity, each a trait plus its `sqlx` implementation.

pub mod cart;
pub mod order;
pub mod product;
pub mod session;
pub mod user;

pub use cart::{CartRepository, SqlxCartRepository};
pub use order::{OrderRepository, SqlxOrderRepository};
pub use product::{ProductRepository, SqlxProductRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
