//! Error types for the site-migrate crate

use thiserror::Error;

/// Result type for migration operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for migration operations
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Web crawling error
    #[error("Crawl error: {0}")]
    Crawl(String),

    /// Response cache error
    #[error("Cache error: {0}")]
    Cache(String),

    /// Destination CMS error
    #[error("CMS error: {0}")]
    Cms(String),

    /// Import step error
    #[error("Import error: {0}")]
    Import(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}
