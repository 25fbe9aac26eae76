//! Error types for the importers

use crate::cms::CmsError;
use crate::error::Error as CrateError;
use thiserror::Error;

/// Error type for import operations
#[derive(Debug, Error)]
pub enum ImportError {
    /// Destination CMS error
    #[error("CMS error: {0}")]
    Cms(#[from] CmsError),

    /// A dependent import ran before the page itself was imported
    #[error("Page {0} has not been imported")]
    PageNotImported(String),

    /// The navigation menu to populate does not exist
    #[error("Menu '{0}' not found")]
    MenuNotFound(String),

    /// Invalid fixup pattern
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl From<ImportError> for CrateError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Cms(e) => e.into(),
            _ => CrateError::Import(err.to_string()),
        }
    }
}
