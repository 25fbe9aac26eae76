//! # Crawler Configuration Module
//!
//! Configuration for the legacy-site crawl: where to start, how many pages
//! to fetch, and the CSS selectors that locate the parts of a legacy page the
//! migration cares about (main content, breadcrumbs, nested menus, news
//! listings). Uses a builder pattern like the rest of the crate's configs.

use serde::{Deserialize, Serialize};

/// Configuration for the crawler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Root URL of the legacy site; also the base for relative URLs
    pub root_url: String,

    /// Maximum number of pages to crawl
    pub max_pages: u32,

    /// Rate limit in milliseconds between requests
    pub rate_limit_ms: u64,

    /// Whether to respect robots.txt
    pub respect_robots_txt: bool,

    /// User agent to use for requests
    pub user_agent: String,

    /// Selectors for the legacy page layout
    pub selectors: PageSelectors,

    /// Relative URLs treated as the site's front page
    pub front_page_paths: Vec<String>,

    /// Relative URLs of news-archive pages
    pub news_archive_paths: Vec<String>,

    /// Relative URLs that must never be imported
    pub excluded_paths: Vec<String>,

    /// File extensions (lowercase, no dot) that mark a link as a download
    pub download_extensions: Vec<String>,
}

/// CSS selectors describing the legacy page layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSelectors {
    /// Main content container
    pub content: String,

    /// Breadcrumb trail links, in order from the root
    pub breadcrumbs: String,

    /// Navigation menu container (nested `ul`/`li` lists)
    pub menu: String,

    /// Marker present only on the news-archive page
    pub news_archive_marker: String,

    /// A single news story within a listing
    pub news_item: String,

    /// Story headline, relative to a news item
    pub news_title: String,

    /// Story date, relative to a news item
    pub news_date: String,

    /// Story body, relative to a news item
    pub news_body: String,
}

impl Default for PageSelectors {
    fn default() -> Self {
        Self {
            content: "#content".to_string(),
            breadcrumbs: ".breadcrumb a".to_string(),
            menu: "#navigation".to_string(),
            news_archive_marker: "#news-archive".to_string(),
            news_item: ".news-item".to_string(),
            news_title: "h2, h3".to_string(),
            news_date: ".date".to_string(),
            news_body: ".summary".to_string(),
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            root_url: "http://jacintranet.dev/scraper/import_content/".to_string(),
            max_pages: 1000,
            rate_limit_ms: 0,
            respect_robots_txt: false,
            user_agent: format!("site-migrate/{}", env!("CARGO_PKG_VERSION")),
            selectors: PageSelectors::default(),
            front_page_paths: vec![
                String::new(),
                "index.htm".to_string(),
                "index.html".to_string(),
            ],
            news_archive_paths: Vec::new(),
            excluded_paths: Vec::new(),
            download_extensions: ["pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "rtf", "zip", "csv"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

/// Builder for CrawlerConfig
#[derive(Debug, Default)]
pub struct CrawlerConfigBuilder {
    config: CrawlerConfig,
}

impl CrawlerConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: CrawlerConfig::default(),
        }
    }

    /// Set the root URL to crawl from
    pub fn root_url(mut self, root_url: impl Into<String>) -> Self {
        self.config.root_url = root_url.into();
        self
    }

    /// Set the maximum number of pages to crawl
    pub fn max_pages(mut self, max_pages: u32) -> Self {
        self.config.max_pages = max_pages;
        self
    }

    /// Set the rate limit in milliseconds between requests
    pub fn rate_limit_ms(mut self, rate_limit_ms: u64) -> Self {
        self.config.rate_limit_ms = rate_limit_ms;
        self
    }

    /// Set whether to respect robots.txt
    pub fn respect_robots_txt(mut self, respect_robots_txt: bool) -> Self {
        self.config.respect_robots_txt = respect_robots_txt;
        self
    }

    /// Set the user agent to use for requests
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the page layout selectors
    pub fn selectors(mut self, selectors: PageSelectors) -> Self {
        self.config.selectors = selectors;
        self
    }

    /// Set the relative URLs of news-archive pages
    pub fn news_archive_paths(mut self, paths: Vec<String>) -> Self {
        self.config.news_archive_paths = paths;
        self
    }

    /// Set the relative URLs that must never be imported
    pub fn excluded_paths(mut self, paths: Vec<String>) -> Self {
        self.config.excluded_paths = paths;
        self
    }

    /// Build the configuration
    pub fn build(self) -> CrawlerConfig {
        self.config
    }
}

impl CrawlerConfig {
    /// Create a new builder
    pub fn builder() -> CrawlerConfigBuilder {
        CrawlerConfigBuilder::new()
    }

    /// Whether a link with this path should be treated as a download
    pub fn is_download_path(&self, path: &str) -> bool {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        match file_name.rsplit_once('.') {
            Some((_, ext)) => {
                let ext = ext.to_ascii_lowercase();
                self.download_extensions.iter().any(|known| *known == ext)
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_defaults() {
        let config = CrawlerConfig::builder()
            .root_url("http://legacy.test/site/")
            .max_pages(5)
            .news_archive_paths(vec!["news.htm".to_string()])
            .build();

        assert_eq!(config.root_url, "http://legacy.test/site/");
        assert_eq!(config.max_pages, 5);
        assert_eq!(config.news_archive_paths, vec!["news.htm"]);
        assert!(config.front_page_paths.contains(&"index.htm".to_string()));
    }

    #[test]
    fn test_download_detection_ignores_case_and_pages() {
        let config = CrawlerConfig::default();
        assert!(config.is_download_path("docs/Annual-Report.PDF"));
        assert!(config.is_download_path("forms/leave.docx"));
        assert!(!config.is_download_path("853.htm"));
        assert!(!config.is_download_path("images/"));
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config: CrawlerConfig =
            serde_json::from_str(r#"{"max_pages": 20, "selectors": {"content": "main"}}"#).unwrap();
        assert_eq!(config.max_pages, 20);
        assert_eq!(config.selectors.content, "main");
        assert_eq!(config.selectors.breadcrumbs, ".breadcrumb a");
    }
}
