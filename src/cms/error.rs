//! Error types for the CMS adapters

use crate::cms::{PostId, PostType};
use crate::error::Error as CrateError;
use thiserror::Error;

/// Error type for CMS operations
#[derive(Debug, Error)]
pub enum CmsError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response
    #[error("API error: {status_code} - {message}")]
    Api {
        /// HTTP status code
        status_code: u16,
        /// Error message
        message: String,
    },

    /// Authentication error
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Unexpected response format
    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    /// Record does not exist
    #[error("{0} {1} not found")]
    NotFound(PostType, PostId),

    /// Local file could not be read for upload
    #[error("Cannot read {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl From<CmsError> for CrateError {
    fn from(err: CmsError) -> Self {
        match err {
            CmsError::Http(e) => CrateError::Http(e),
            _ => CrateError::Cms(err.to_string()),
        }
    }
}
