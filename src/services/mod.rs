//! Services layer - business logic
//!
//! Services sit between the web handlers and the repositories. They apply
//! validation and ownership rules and translate storage failures into their
//! own error types.

pub mod auth;
pub mod email;
pub mod password;
pub mod product;
pub mod session;
pub mod shop;
pub mod token;
pub mod validation;

pub use auth::{AuthError, AuthService};
pub use email::{mailer_from_config, Email, LogMailer, Mailer, SmtpMailer};
pub use password::{hash_password, verify_password};
pub use product::{ProductError, ProductForm, ProductService, UpdatedProduct};
pub use session::SessionService;
pub use shop::{CartSummary, ShopError, ShopService};
pub use validation::{FieldError, ValidationErrors};
