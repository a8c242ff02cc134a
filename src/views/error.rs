//! View engine error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewError {
    /// Template rendering or parsing error
    #[error("Template error: {0}")]
    TemplateError(String),

    /// Template directory could not be read
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
