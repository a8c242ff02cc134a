//! Product management for logged-in users
//!
//! Every user manages their own products. Attempts to edit or delete
//! someone else's product send the visitor back to the shop.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};

use crate::models::{format_cents, Product};
use crate::services::{ProductError, ProductForm, ValidationErrors};

use super::context::{render, render_with_status, Page};
use super::error::WebError;
use super::middleware::{AppState, AuthenticatedUser};
use super::shop::{parse_product_id, ProductIdForm};
use super::upload::{delete_image, read_product_form, ProductUpload};

/// Product fields as shown in the edit form
#[derive(Debug, Default, Serialize)]
struct ProductFormView {
    id: Option<i64>,
    title: String,
    price: String,
    description: String,
}

impl ProductFormView {
    fn from_product(product: &Product) -> Self {
        Self {
            id: Some(product.id),
            title: product.title.clone(),
            price: format_cents(product.price_cents),
            description: product.description.clone(),
        }
    }

    fn from_form(id: Option<i64>, form: &ProductForm) -> Self {
        Self {
            id,
            title: form.title.clone(),
            price: form.price.clone(),
            description: form.description.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct EditQuery {
    pub edit: Option<String>,
}

/// JSON body returned by the asynchronous delete endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// GET /admin/add-product
pub async fn get_add_product(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    mut page: Page,
) -> Result<Response, WebError> {
    let mut context = page.context(&state, "Add Product").await?;
    context.insert("editing", &false);
    context.insert("product", &ProductFormView::default());
    render(&state, "admin/edit-product.html", &context)
}

/// POST /admin/add-product
pub async fn post_add_product(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    mut page: Page,
    multipart: Multipart,
) -> Result<Response, WebError> {
    let upload = read_product_form(&state.upload_config, multipart).await?;

    match state
        .product_service
        .create(user.id, &upload.form, upload.image_url())
        .await
    {
        Ok(_) => Ok(Redirect::to("/admin/products").into_response()),
        Err(e) => {
            discard_upload(&state, &upload).await;
            match e {
                ProductError::Validation(errors) => {
                    render_invalid_product(&state, &mut page, "Add Product", false, None, &upload.form, &errors).await
                }
                other => Err(other.into()),
            }
        }
    }
}

/// GET /admin/edit-product/{id}?edit=true
pub async fn get_edit_product(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    mut page: Page,
    Path(id): Path<String>,
    Query(query): Query<EditQuery>,
) -> Result<Response, WebError> {
    if query.edit.as_deref() != Some("true") {
        return Ok(Redirect::to("/").into_response());
    }
    let Ok(product_id) = parse_product_id(&id) else {
        return Ok(Redirect::to("/").into_response());
    };

    let product = match state.product_service.get_for_edit(product_id, user.id).await {
        Ok(product) => product,
        Err(ProductError::NotFound | ProductError::Forbidden) => {
            return Ok(Redirect::to("/").into_response())
        }
        Err(e) => return Err(e.into()),
    };

    let mut context = page.context(&state, "Edit Product").await?;
    context.insert("editing", &true);
    context.insert("product", &ProductFormView::from_product(&product));
    render(&state, "admin/edit-product.html", &context)
}

/// POST /admin/edit-product
pub async fn post_edit_product(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    mut page: Page,
    multipart: Multipart,
) -> Result<Response, WebError> {
    let upload = read_product_form(&state.upload_config, multipart).await?;
    let product_id = upload
        .product_id
        .as_deref()
        .and_then(|id| id.trim().parse::<i64>().ok());
    let Some(product_id) = product_id else {
        discard_upload(&state, &upload).await;
        return Ok(Redirect::to("/").into_response());
    };

    match state
        .product_service
        .update(user.id, product_id, &upload.form, upload.image_url())
        .await
    {
        Ok(updated) => {
            if let Some(old_image) = updated.replaced_image {
                delete_image(&state.upload_config, &old_image).await;
            }
            Ok(Redirect::to("/admin/products").into_response())
        }
        Err(e) => {
            discard_upload(&state, &upload).await;
            match e {
                ProductError::Validation(errors) => {
                    render_invalid_product(
                        &state,
                        &mut page,
                        "Edit Product",
                        true,
                        Some(product_id),
                        &upload.form,
                        &errors,
                    )
                    .await
                }
                ProductError::NotFound | ProductError::Forbidden => Ok(Redirect::to("/").into_response()),
                other => Err(other.into()),
            }
        }
    }
}

/// GET /admin/products
pub async fn get_products(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    mut page: Page,
) -> Result<Response, WebError> {
    let products = state.product_service.list_for_owner(user.id).await?;
    let mut context = page.context(&state, "Admin Products").await?;
    context.insert("products", &products);
    render(&state, "admin/products.html", &context)
}

/// POST /admin/delete-product
pub async fn post_delete_product(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Form(form): Form<ProductIdForm>,
) -> Result<Response, WebError> {
    let product_id = parse_product_id(&form.product_id)?;
    match state.product_service.delete(user.id, product_id).await {
        Ok(product) => {
            delete_image(&state.upload_config, &product.image_url).await;
            Ok(Redirect::to("/admin/products").into_response())
        }
        Err(ProductError::Forbidden) => Ok(Redirect::to("/").into_response()),
        Err(e) => Err(e.into()),
    }
}

/// DELETE /admin/product/{id}
///
/// Used by the admin page's script; answers with JSON instead of a redirect.
pub async fn delete_product(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<String>,
) -> (StatusCode, Json<MessageResponse>) {
    let failed = |status: StatusCode| {
        (
            status,
            Json(MessageResponse {
                message: "Deleting product failed.".to_string(),
            }),
        )
    };

    let Ok(product_id) = id.trim().parse::<i64>() else {
        return failed(StatusCode::NOT_FOUND);
    };

    match state.product_service.delete(user.id, product_id).await {
        Ok(product) => {
            delete_image(&state.upload_config, &product.image_url).await;
            (
                StatusCode::OK,
                Json(MessageResponse {
                    message: "Success!".to_string(),
                }),
            )
        }
        Err(ProductError::NotFound) => failed(StatusCode::NOT_FOUND),
        Err(ProductError::Forbidden) => failed(StatusCode::FORBIDDEN),
        Err(e) => {
            tracing::error!("Failed to delete product {}: {}", product_id, e);
            failed(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Remove an image saved for a submission that was rejected
async fn discard_upload(state: &AppState, upload: &ProductUpload) {
    if let Some(image) = &upload.image {
        delete_image(&state.upload_config, &image.url).await;
    }
}

async fn render_invalid_product(
    state: &AppState,
    page: &mut Page,
    title: &str,
    editing: bool,
    product_id: Option<i64>,
    form: &ProductForm,
    errors: &ValidationErrors,
) -> Result<Response, WebError> {
    let product = ProductFormView::from_form(product_id, form);
    let mut context = page.invalid_form_context(state, title, errors, &product).await?;
    context.insert("editing", &editing);
    context.insert("product", &product);
    render_with_status(state, StatusCode::UNPROCESSABLE_ENTITY, "admin/edit-product.html", &context)
}
