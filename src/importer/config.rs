//! # Import Configuration Module
//!
//! Settings shared by every importer: who authors the records, whether
//! already-imported entities are reused or recreated, where the local mirror
//! of the legacy files lives, and which structured field lists a page's
//! downloads.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration passed to each importer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Author of every created record
    pub author_id: u64,

    /// Reuse already-imported entities instead of replacing them
    pub skip_existing: bool,

    /// Local mirror of the legacy site; downloads live at `mirror_path/<relative url>`
    pub mirror_path: PathBuf,

    /// Structured field holding a page's download list
    pub downloads_field: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            author_id: 2,
            skip_existing: true,
            mirror_path: PathBuf::from("import_content"),
            downloads_field: "page_downloads".to_string(),
        }
    }
}

/// Builder for ImportConfig
#[derive(Debug, Default)]
pub struct ImportConfigBuilder {
    config: ImportConfig,
}

impl ImportConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ImportConfig::default(),
        }
    }

    /// Set the author of created records
    pub fn author_id(mut self, author_id: u64) -> Self {
        self.config.author_id = author_id;
        self
    }

    /// Set whether existing entities are reused
    pub fn skip_existing(mut self, skip_existing: bool) -> Self {
        self.config.skip_existing = skip_existing;
        self
    }

    /// Set the local mirror directory
    pub fn mirror_path(mut self, mirror_path: impl Into<PathBuf>) -> Self {
        self.config.mirror_path = mirror_path.into();
        self
    }

    /// Set the downloads field name
    pub fn downloads_field(mut self, field: impl Into<String>) -> Self {
        self.config.downloads_field = field.into();
        self
    }

    pub fn build(self) -> ImportConfig {
        self.config
    }
}

impl ImportConfig {
    /// Create a new builder
    pub fn builder() -> ImportConfigBuilder {
        ImportConfigBuilder::new()
    }

    /// Local path of a legacy file
    pub fn mirror_file(&self, relative_url: &str) -> PathBuf {
        let relative = relative_url.split(['?', '#']).next().unwrap_or(relative_url);
        self.mirror_path.join(Path::new(relative.trim_start_matches('/')))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ImportConfig::default();
        assert_eq!(config.author_id, 2);
        assert!(config.skip_existing);
        assert_eq!(config.downloads_field, "page_downloads");
    }

    #[test]
    fn test_builder_and_partial_json() {
        let built = ImportConfig::builder()
            .author_id(7)
            .skip_existing(false)
            .mirror_path("/srv/mirror")
            .build();
        assert_eq!(built.author_id, 7);
        assert!(!built.skip_existing);

        let parsed: ImportConfig =
            serde_json::from_str(r#"{"skip_existing": false}"#).unwrap();
        assert!(!parsed.skip_existing);
        assert_eq!(parsed.author_id, 2);
    }

    #[test]
    fn test_mirror_file_strips_query() {
        let config = ImportConfig::builder().mirror_path("/srv/mirror").build();
        assert_eq!(
            config.mirror_file("docs/leave.pdf?v=2"),
            PathBuf::from("/srv/mirror/docs/leave.pdf")
        );
    }

    #[test]
    fn test_mirror_file_of_extracted_spaced_name() {
        let root = url::Url::parse("http://legacy.test/jac/").unwrap();
        let link = root.join("docs/Leave Form.pdf").unwrap();
        let relative = crate::crawler::relative_url(&root, &link).unwrap();

        let config = ImportConfig::builder().mirror_path("/srv/mirror").build();
        assert_eq!(
            config.mirror_file(&relative),
            PathBuf::from("/srv/mirror/docs/Leave Form.pdf")
        );
    }
}
