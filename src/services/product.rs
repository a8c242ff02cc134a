//! Product service
//!
//! Catalogue browsing for everyone and product management for the user who
//! created each product. Image files are handled by the caller; this service
//! only records URLs and reports which ones became unreferenced.

use crate::db::repositories::ProductRepository;
use crate::models::{
    CreateProductInput, ListParams, PagedResult, Product, UpdateProductInput,
};
use crate::services::validation::{validate_product, ValidationErrors, MSG_NOT_AN_IMAGE};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ProductError {
    #[error("Validation error: {0}")]
    Validation(ValidationErrors),

    #[error("Product not found")]
    NotFound,

    /// The product exists but belongs to someone else
    #[error("Not allowed to modify this product")]
    Forbidden,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Raw product form fields as submitted
#[derive(Debug, Clone, Default)]
pub struct ProductForm {
    pub title: String,
    pub price: String,
    pub description: String,
}

/// Result of an edit, with the image URL that is no longer used
#[derive(Debug)]
pub struct UpdatedProduct {
    pub product: Product,
    pub replaced_image: Option<String>,
}

pub struct ProductService {
    product_repo: Arc<dyn ProductRepository>,
    items_per_page: u32,
}

impl ProductService {
    pub fn new(product_repo: Arc<dyn ProductRepository>, items_per_page: u32) -> Self {
        Self {
            product_repo,
            items_per_page,
        }
    }

    pub async fn list(&self, page: u32) -> Result<PagedResult<Product>, ProductError> {
        let params = ListParams::new(page, self.items_per_page);
        Ok(self.product_repo.list(&params).await?)
    }

    pub async fn get(&self, id: i64) -> Result<Product, ProductError> {
        self.product_repo
            .get_by_id(id)
            .await?
            .ok_or(ProductError::NotFound)
    }

    pub async fn list_for_owner(&self, user_id: i64) -> Result<Vec<Product>, ProductError> {
        Ok(self.product_repo.list_by_user(user_id).await?)
    }

    /// Fetch a product its owner wants to edit
    pub async fn get_for_edit(&self, id: i64, user_id: i64) -> Result<Product, ProductError> {
        let product = self.get(id).await?;
        if !product.is_owned_by(user_id) {
            return Err(ProductError::Forbidden);
        }
        Ok(product)
    }

    /// Create a product. A missing image is a validation failure.
    pub async fn create(
        &self,
        user_id: i64,
        form: &ProductForm,
        image_url: Option<String>,
    ) -> Result<Product, ProductError> {
        let Some(image_url) = image_url else {
            return Err(ProductError::Validation(ValidationErrors::single(
                "image",
                MSG_NOT_AN_IMAGE,
            )));
        };
        let price_cents = validate_product(&form.title, &form.price, &form.description)
            .map_err(ProductError::Validation)?;

        let product = self
            .product_repo
            .create(
                user_id,
                &CreateProductInput {
                    title: form.title.trim().to_string(),
                    price_cents,
                    description: form.description.trim().to_string(),
                    image_url,
                },
            )
            .await?;

        tracing::info!(product_id = product.id, user_id, "Product created");
        Ok(product)
    }

    /// Update a product owned by `user_id`, optionally replacing its image
    pub async fn update(
        &self,
        user_id: i64,
        product_id: i64,
        form: &ProductForm,
        image_url: Option<String>,
    ) -> Result<UpdatedProduct, ProductError> {
        let existing = self.get_for_edit(product_id, user_id).await?;
        let price_cents = validate_product(&form.title, &form.price, &form.description)
            .map_err(ProductError::Validation)?;

        let replaced_image = image_url
            .as_ref()
            .filter(|new_url| **new_url != existing.image_url)
            .map(|_| existing.image_url.clone());

        let product = self
            .product_repo
            .update(
                product_id,
                &UpdateProductInput {
                    title: form.title.trim().to_string(),
                    price_cents,
                    description: form.description.trim().to_string(),
                    image_url,
                },
            )
            .await?
            .ok_or(ProductError::NotFound)?;

        tracing::info!(product_id, user_id, "Product updated");
        Ok(UpdatedProduct {
            product,
            replaced_image,
        })
    }

    /// Delete a product owned by `user_id`, returning it so its image can be removed
    pub async fn delete(&self, user_id: i64, product_id: i64) -> Result<Product, ProductError> {
        let product = self.get_for_edit(product_id, user_id).await?;
        if !self.product_repo.delete_owned(product_id, user_id).await? {
            return Err(ProductError::NotFound);
        }
        tracing::info!(product_id, user_id, "Product deleted");
        Ok(product)
    }
}
