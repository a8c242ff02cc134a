//! Product form uploads
//!
//! The add and edit product forms are multipart: text fields plus an
//! optional image. Images of a disallowed type are dropped, which the
//! product service reports as "not an image" when one is required.

use axum::extract::Multipart;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::config::UploadConfig;
use crate::services::ProductForm;

use super::error::WebError;

/// URL prefix images are served under
pub const IMAGE_URL_PREFIX: &str = "/images/";

/// Image written to the upload directory
#[derive(Debug, Clone)]
pub struct SavedImage {
    pub file_name: String,
    pub url: String,
    pub path: PathBuf,
}

/// Parsed product form
#[derive(Debug, Default)]
pub struct ProductUpload {
    pub form: ProductForm,
    pub product_id: Option<String>,
    pub image: Option<SavedImage>,
}

impl ProductUpload {
    pub fn image_url(&self) -> Option<String> {
        self.image.as_ref().map(|i| i.url.clone())
    }
}

/// Read a product form, saving an acceptable image to the upload directory.
/// On error nothing stays behind in the upload directory.
pub async fn read_product_form(
    config: &UploadConfig,
    multipart: Multipart,
) -> Result<ProductUpload, WebError> {
    let mut upload = ProductUpload::default();
    match read_fields(config, multipart, &mut upload).await {
        Ok(()) => Ok(upload),
        Err(e) => {
            if let Some(saved) = upload.image.take() {
                delete_image(config, &saved.url).await;
            }
            Err(e)
        }
    }
}

async fn read_fields(
    config: &UploadConfig,
    mut multipart: Multipart,
    upload: &mut ProductUpload,
) -> Result<(), WebError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| WebError::BadRequest(format!("Failed to read multipart: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == "image" {
            let file_name = field.file_name().unwrap_or("").to_string();
            let content_type = field.content_type().unwrap_or("").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| WebError::BadRequest(format!("Failed to read file: {}", e)))?;

            if file_name.is_empty() || data.is_empty() {
                continue;
            }
            if !config.is_type_allowed(&content_type) {
                tracing::debug!("Ignoring upload {} of type {}", file_name, content_type);
                continue;
            }
            if data.len() as u64 > config.max_file_size {
                return Err(WebError::BadRequest(format!(
                    "File too large. Maximum size: {} bytes ({} MB)",
                    config.max_file_size,
                    config.max_file_size / 1024 / 1024
                )));
            }

            if let Some(previous) = upload.image.take() {
                delete_image(config, &previous.url).await;
            }
            upload.image = Some(save_image(config, &file_name, &data).await?);
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| WebError::BadRequest(format!("Failed to read field {}: {}", name, e)))?;
        match name.as_str() {
            "title" => upload.form.title = value,
            "price" => upload.form.price = value,
            "description" => upload.form.description = value,
            "productId" => upload.product_id = Some(value),
            _ => {}
        }
    }

    Ok(())
}

async fn save_image(config: &UploadConfig, original_name: &str, data: &[u8]) -> Result<SavedImage, WebError> {
    fs::create_dir_all(&config.path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create upload directory {:?}: {}", config.path, e))?;

    let file_name = image_file_name(Utc::now(), original_name);
    let path = config.path.join(&file_name);
    fs::write(&path, data)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to save image {:?}: {}", path, e))?;

    tracing::debug!("Saved image {:?} ({} bytes)", path, data.len());
    Ok(SavedImage {
        url: format!("{}{}", IMAGE_URL_PREFIX, file_name),
        file_name,
        path,
    })
}

/// Timestamped, filesystem-safe name for an uploaded file
pub fn image_file_name(now: DateTime<Utc>, original_name: &str) -> String {
    format!(
        "{}-{}",
        now.format("%Y%m%dT%H%M%S%.3fZ"),
        sanitize_file_name(original_name)
    )
}

fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Path on disk for an image URL, if it points into the upload directory
pub fn image_path(upload_dir: &Path, image_url: &str) -> Option<PathBuf> {
    let name = image_url.strip_prefix(IMAGE_URL_PREFIX)?;
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return None;
    }
    Some(upload_dir.join(name))
}

/// Remove an image that is no longer referenced. Failures are logged only.
pub async fn delete_image(config: &UploadConfig, image_url: &str) {
    let Some(path) = image_path(&config.path, image_url) else {
        tracing::warn!("Refusing to delete image outside upload directory: {}", image_url);
        return;
    };
    if let Err(e) = fs::remove_file(&path).await {
        tracing::warn!("Failed to delete image {:?}: {}", path, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_image_file_name() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            image_file_name(now, "book cover.png"),
            "20240309T140507.000Z-book_cover.png"
        );
    }

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\pic.jpg"), "pic.jpg");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "image");
    }

    #[test]
    fn test_image_path() {
        let dir = Path::new("/srv/images");
        assert_eq!(
            image_path(dir, "/images/a.png"),
            Some(PathBuf::from("/srv/images/a.png"))
        );
        assert_eq!(image_path(dir, "/images/../secret"), None);
        assert_eq!(image_path(dir, "/other/a.png"), None);
        assert_eq!(image_path(dir, "/images/"), None);
    }

    #[tokio::test]
    async fn test_delete_image_removes_file() {
        let temp = tempfile::tempdir().unwrap();
        let config = UploadConfig {
            path: temp.path().to_path_buf(),
            ..UploadConfig::default()
        };
        let saved = save_image(&config, "a.png", b"png").await.unwrap();
        assert!(saved.path.exists());
        assert!(saved.url.starts_with(IMAGE_URL_PREFIX));

        delete_image(&config, &saved.url).await;
        assert!(!saved.path.exists());

        // Missing files are only logged
        delete_image(&config, &saved.url).await;
    }
}
