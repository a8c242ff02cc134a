//! Web layer - routing, middleware and page handlers
//!
//! - Auth pages: login, signup, logout, password reset
//! - Shop pages: product listings, cart, checkout, orders
//! - Admin pages: product management for the logged-in user
//! - Static files: `public/` at the root, uploaded images under `/images`

pub mod admin;
pub mod auth;
pub mod context;
pub mod error;
pub mod middleware;
pub mod shop;
pub mod upload;


use axum::{
    extract::DefaultBodyLimit,
    handler::HandlerWithoutStateExt,
    http::{header, HeaderName, HeaderValue},
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    services::ServeDir,
    set_header::SetResponseHeaderLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

pub use error::WebError;
pub use middleware::{AppState, AuthenticatedUser};

/// Directory served at the site root
pub const PUBLIC_DIR: &str = "public";

/// Allowance for form fields on top of the image itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/login", get(auth::get_login).post(auth::post_login))
        .route("/signup", get(auth::get_signup).post(auth::post_signup))
        .route("/logout", post(auth::post_logout))
        .route("/reset", get(auth::get_reset).post(auth::post_reset))
        .route("/reset/{token}", get(auth::get_new_password))
        .route("/new-password", post(auth::post_new_password));

    let shop_routes = Router::new()
        .route("/", get(shop::get_index))
        .route("/products", get(shop::get_products))
        .route("/products/{id}", get(shop::get_product));

    let customer_routes = Router::new()
        .route("/cart", get(shop::get_cart).post(shop::post_cart))
        .route("/cart-delete-item", post(shop::post_cart_delete_item))
        .route("/checkout", get(shop::get_checkout))
        .route("/create-order", post(shop::post_create_order))
        .route("/orders", get(shop::get_orders))
        .route_layer(axum_middleware::from_fn(middleware::require_auth));

    let upload_limit = usize::try_from(state.upload_config.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    let admin_routes = Router::new()
        .route(
            "/add-product",
            get(admin::get_add_product).post(admin::post_add_product),
        )
        .route("/edit-product/{id}", get(admin::get_edit_product))
        .route("/edit-product", post(admin::post_edit_product))
        .route("/products", get(admin::get_products))
        .route("/delete-product", post(admin::post_delete_product))
        .route("/product/{id}", delete(admin::delete_product))
        .route_layer(axum_middleware::from_fn(middleware::require_auth))
        .layer(DefaultBodyLimit::max(upload_limit));

    let public_files = ServeDir::new(PUBLIC_DIR).not_found_service(shop::not_found.into_service());

    Router::new()
        .merge(auth_routes)
        .merge(shop_routes)
        .merge(customer_routes)
        .nest("/admin", admin_routes)
        .route("/500", get(shop::get_error_page))
        .nest_service("/images", ServeDir::new(&state.upload_config.path))
        .fallback_service(public_files)
        .layer(axum_middleware::from_fn(middleware::csrf_middleware))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::error_page_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::session_middleware,
        ))
        .layer(
            ServiceBuilder::new()
                // One INFO line per request, visible under `tower_http=info`
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_FRAME_OPTIONS,
                    HeaderValue::from_static("SAMEORIGIN"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::REFERRER_POLICY,
                    HeaderValue::from_static("no-referrer"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("x-dns-prefetch-control"),
                    HeaderValue::from_static("off"),
                ))
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}
