//! Storefront pages: product listings, cart, checkout and orders

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;

use crate::services::ShopError;

use super::context::{base_context, render, Page};
use super::error::WebError;
use super::middleware::{AppState, AuthenticatedUser};

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    /// Requested page number; anything unparseable means the first page
    pub fn page_number(&self) -> u32 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse::<u32>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProductIdForm {
    pub product_id: String,
}

/// Parse a product id from a path or form value, treating garbage as not found
pub fn parse_product_id(raw: &str) -> Result<i64, WebError> {
    raw.trim().parse::<i64>().map_err(|_| WebError::NotFound)
}

/// GET /
pub async fn get_index(
    State(state): State<AppState>,
    page: Page,
    Query(query): Query<PageQuery>,
) -> Result<Response, WebError> {
    render_product_listing(state, page, query, "Shop", "shop/index.html").await
}

/// GET /products
pub async fn get_products(
    State(state): State<AppState>,
    page: Page,
    Query(query): Query<PageQuery>,
) -> Result<Response, WebError> {
    render_product_listing(state, page, query, "All Products", "shop/product-list.html").await
}

async fn render_product_listing(
    state: AppState,
    mut page: Page,
    query: PageQuery,
    title: &str,
    template: &str,
) -> Result<Response, WebError> {
    let products = state.product_service.list(query.page_number()).await?;
    let mut context = page.context(&state, title).await?;
    context.insert("products", &products.items);
    context.insert("pagination", &products.pagination());
    render(&state, template, &context)
}

/// GET /products/{id}
pub async fn get_product(
    State(state): State<AppState>,
    mut page: Page,
    Path(id): Path<String>,
) -> Result<Response, WebError> {
    let product = state.product_service.get(parse_product_id(&id)?).await?;
    let mut context = page.context(&state, &product.title).await?;
    context.insert("product", &product);
    render(&state, "shop/product-detail.html", &context)
}

/// GET /cart
pub async fn get_cart(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    mut page: Page,
) -> Result<Response, WebError> {
    let cart = state.shop_service.cart(user.id).await?;
    let mut context = page.context(&state, "Your Cart").await?;
    context.insert("lines", &cart.lines);
    context.insert("total_cents", &cart.total_cents);
    render(&state, "shop/cart.html", &context)
}

/// POST /cart
pub async fn post_cart(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Form(form): Form<ProductIdForm>,
) -> Result<Response, WebError> {
    let product_id = parse_product_id(&form.product_id)?;
    state.shop_service.add_to_cart(user.id, product_id).await?;
    Ok(Redirect::to("/cart").into_response())
}

/// POST /cart-delete-item
pub async fn post_cart_delete_item(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Form(form): Form<ProductIdForm>,
) -> Result<Response, WebError> {
    let product_id = parse_product_id(&form.product_id)?;
    state.shop_service.remove_from_cart(user.id, product_id).await?;
    Ok(Redirect::to("/cart").into_response())
}

/// GET /checkout
pub async fn get_checkout(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    mut page: Page,
) -> Result<Response, WebError> {
    let cart = state.shop_service.cart(user.id).await?;
    let mut context = page.context(&state, "Checkout").await?;
    context.insert("lines", &cart.lines);
    context.insert("total_cents", &cart.total_cents);
    render(&state, "shop/checkout.html", &context)
}

/// POST /create-order
pub async fn post_create_order(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    mut page: Page,
) -> Result<Response, WebError> {
    match state.shop_service.place_order(&user).await {
        Ok(_) => Ok(Redirect::to("/orders").into_response()),
        Err(e @ ShopError::EmptyCart) => {
            page.flash_error(&state, &e.to_string()).await?;
            Ok(Redirect::to("/cart").into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /orders
pub async fn get_orders(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    mut page: Page,
) -> Result<Response, WebError> {
    let orders = state.shop_service.orders(user.id).await?;
    let mut context = page.context(&state, "Your Orders").await?;
    context.insert("orders", &orders);
    render(&state, "shop/orders.html", &context)
}

/// GET /500
pub async fn get_error_page(State(state): State<AppState>, page: Page) -> Response {
    let context = base_context(&page.session, page.user.as_ref(), &page.path, "Error!");
    let html = state.views.render_or_fallback("500.html", &context);
    (StatusCode::INTERNAL_SERVER_ERROR, Html(html)).into_response()
}

/// Fallback for unknown paths
pub async fn not_found() -> WebError {
    WebError::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_number() {
        let query = |p: Option<&str>| PageQuery { page: p.map(str::to_string) };
        assert_eq!(query(None).page_number(), 1);
        assert_eq!(query(Some("3")).page_number(), 3);
        assert_eq!(query(Some("0")).page_number(), 1);
        assert_eq!(query(Some("abc")).page_number(), 1);
        assert_eq!(query(Some("-2")).page_number(), 1);
    }

    #[test]
    fn test_parse_product_id() {
        assert_eq!(parse_product_id(" 42 ").unwrap(), 42);
        assert!(matches!(parse_product_id("abc"), Err(WebError::NotFound)));
    }
}
