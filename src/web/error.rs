//! Web error type
//!
//! Handlers return `WebError` for anything they don't turn into a page
//! themselves. Not-found responses are tagged with `ErrorPage` so the
//! error page middleware can render the full 404 template around them.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};

use crate::services::{AuthError, ProductError, ShopError};
use crate::views::simple_error_page;

#[derive(Debug, thiserror::Error)]
pub enum WebError {
    #[error("Not found")]
    NotFound,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Marker left on responses that should be replaced by a rendered error page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPage {
    NotFound,
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        match self {
            WebError::NotFound => {
                let mut response = (
                    StatusCode::NOT_FOUND,
                    Html(simple_error_page("Page Not Found!", "There is nothing here.")),
                )
                    .into_response();
                response.extensions_mut().insert(ErrorPage::NotFound);
                response
            }
            WebError::Forbidden(message) => {
                tracing::warn!("Forbidden: {}", message);
                (
                    StatusCode::FORBIDDEN,
                    Html(simple_error_page("Forbidden", &message)),
                )
                    .into_response()
            }
            WebError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Html(simple_error_page("Bad Request", &message)),
            )
                .into_response(),
            WebError::Internal(e) => {
                tracing::error!("Request failed: {:#}", e);
                Redirect::to("/500").into_response()
            }
        }
    }
}

impl From<AuthError> for WebError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InternalError(e) => WebError::Internal(e),
            other => WebError::BadRequest(other.to_string()),
        }
    }
}

impl From<ProductError> for WebError {
    fn from(e: ProductError) -> Self {
        match e {
            ProductError::NotFound => WebError::NotFound,
            ProductError::Forbidden => WebError::Forbidden(e.to_string()),
            ProductError::Validation(errors) => WebError::BadRequest(errors.to_string()),
            ProductError::InternalError(e) => WebError::Internal(e),
        }
    }
}

impl From<ShopError> for WebError {
    fn from(e: ShopError) -> Self {
        match e {
            ShopError::ProductNotFound => WebError::NotFound,
            ShopError::EmptyCart => WebError::BadRequest(e.to_string()),
            ShopError::InternalError(e) => WebError::Internal(e),
        }
    }
}
