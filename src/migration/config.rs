//! # Migration Configuration Module
//!
//! Everything a migration run needs, with defaults matching the legacy
//! intranet this tool was written for. A JSON file can override any subset
//! of the settings; omitted keys keep their defaults.

use crate::cms::MetaKeys;
use crate::crawler::CrawlerConfig;
use crate::error::{Error, Result};
use crate::importer::ImportConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A regex replacement applied to one migrated page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FormFixup {
    /// Migration key of the page to patch
    pub key: String,

    /// Pattern to replace, in `regex` syntax
    pub pattern: String,

    /// Literal replacement text
    pub replacement: String,
}

impl Default for FormFixup {
    fn default() -> Self {
        Self {
            key: "853.htm".to_string(),
            pattern: r#"(?i)<form id="finder"[\S\s]*?</form>"#.to_string(),
            replacement: "[people_finder_form]".to_string(),
        }
    }
}

/// Configuration of a complete migration run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    pub crawler: CrawlerConfig,

    pub import: ImportConfig,

    /// Prefixes identifying links to the legacy site in migrated content
    pub legacy_base_urls: Vec<String>,

    /// Destination of links to the legacy front page, if any
    pub home_url: Option<String>,

    /// Navigation menu receiving the page hierarchy
    pub menu_name: String,

    pub form_fixup: FormFixup,

    /// Meta keys marking records as migrated
    pub meta_keys: MetaKeys,

    /// Response cache directory
    pub cache_dir: PathBuf,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            import: ImportConfig::default(),
            legacy_base_urls: vec![
                "http://intranet.justice.gsi.gov.uk/jac/".to_string(),
                "/jac/".to_string(),
            ],
            home_url: None,
            menu_name: "Primary Navigation".to_string(),
            form_fixup: FormFixup::default(),
            meta_keys: MetaKeys::default(),
            cache_dir: PathBuf::from(".site-migrate/cache"),
        }
    }
}

/// Builder for MigrationConfig
#[derive(Debug, Default)]
pub struct MigrationConfigBuilder {
    config: MigrationConfig,
}

impl MigrationConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: MigrationConfig::default(),
        }
    }

    pub fn crawler(mut self, crawler: CrawlerConfig) -> Self {
        self.config.crawler = crawler;
        self
    }

    pub fn import(mut self, import: ImportConfig) -> Self {
        self.config.import = import;
        self
    }

    /// Set the legacy URL prefixes to rewrite
    pub fn legacy_base_urls(mut self, urls: Vec<String>) -> Self {
        self.config.legacy_base_urls = urls;
        self
    }

    pub fn home_url(mut self, home_url: impl Into<String>) -> Self {
        self.config.home_url = Some(home_url.into());
        self
    }

    pub fn menu_name(mut self, menu_name: impl Into<String>) -> Self {
        self.config.menu_name = menu_name.into();
        self
    }

    pub fn form_fixup(mut self, fixup: FormFixup) -> Self {
        self.config.form_fixup = fixup;
        self
    }

    pub fn meta_keys(mut self, meta_keys: MetaKeys) -> Self {
        self.config.meta_keys = meta_keys;
        self
    }

    pub fn cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = cache_dir.into();
        self
    }

    pub fn build(self) -> MigrationConfig {
        self.config
    }
}

impl MigrationConfig {
    /// Create a new builder
    pub fn builder() -> MigrationConfigBuilder {
        MigrationConfigBuilder::new()
    }

    /// Read a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&contents)
    }

    /// Parse a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.crawler.root_url)
            .map_err(|e| Error::Config(format!("Invalid root URL {}: {}", self.crawler.root_url, e)))?;
        if self.crawler.max_pages == 0 {
            return Err(Error::Config("max_pages must be at least 1".to_string()));
        }
        if self.meta_keys.marker.trim().is_empty() || self.meta_keys.key.trim().is_empty() {
            return Err(Error::Config("meta_keys must not be empty".to_string()));
        }
        if self.menu_name.trim().is_empty() {
            return Err(Error::Config("menu_name must not be empty".to_string()));
        }
        regex::Regex::new(&self.form_fixup.pattern)
            .map_err(|e| Error::Config(format!("Invalid form fixup pattern: {}", e)))?;
        Ok(())
    }
}
