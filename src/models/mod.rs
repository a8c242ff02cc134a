//! Data models
//!
//! Plain data structures shared by the repositories, services and views:
//! users, cart lines, products, orders, sessions and pagination.

mod cart;
mod order;
mod pagination;
mod product;
mod session;
mod user;

pub use cart::{cart_total_cents, CartLine};
pub use order::{Order, OrderItem};
pub use pagination::{ListParams, PagedResult, Pagination};
pub use product::{format_cents, CreateProductInput, Product, UpdateProductInput};
pub use session::{Flash, Session};
pub use user::{CreateUserInput, User};
