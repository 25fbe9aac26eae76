//! # Legacy Site Crawler Module
//!
//! Collects every reachable page of the legacy site into a flat, crawl-ordered
//! [`CrawlCollection`]. Fetching is delegated to `spider`; each page's raw HTML
//! goes through an on-disk response cache, then `scraper` pulls out the parts
//! the migration needs: main content, links, downloads, breadcrumbs, nested
//! menu context and news stories.
//!
//! ## Key Components
//!
//! - `CrawlerConfig`: root URL, page ceiling and page-layout selectors
//! - `ScrapedPage`: one legacy page plus its classification flags
//! - `crawl_site`: runs (or replays from cache) the crawl

mod config;
mod content_extraction;
mod error;
mod spider_integration;
pub mod storage;

pub use config::{CrawlerConfig, CrawlerConfigBuilder, PageSelectors};
pub use content_extraction::{extract_page, relative_url};
pub use error::CrawlError;
pub use spider_integration::crawl_site;

use crate::cms::{MigrationKey, Post, PostId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use url::Url;

/// A file linked from a legacy page's content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Download {
    /// Path relative to the crawl root; also the path under the local mirror
    pub relative_url: String,

    /// Link text
    pub title: String,
}

impl Download {
    /// Idempotence key of the attachment imported for this download
    pub fn key(&self) -> MigrationKey {
        MigrationKey::new(&self.relative_url)
    }
}

/// A nested-menu observation: `child` is listed under `parent` in a page's menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuClaim {
    /// Absolute URL of the nested link
    pub child: String,

    /// Absolute URL of the enclosing menu item's link
    pub parent: String,
}

/// A news story listed on the front page or the news archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsStory {
    /// Headline
    pub title: String,

    /// Publication date, when the listing carries a parseable one
    pub date: Option<NaiveDate>,

    /// Story body HTML
    pub content: String,

    /// Path of the story's own page relative to the crawl root, if linked
    pub relative_url: Option<String>,
}

impl NewsStory {
    /// Idempotence key of the post imported for this story
    pub fn key(&self) -> MigrationKey {
        match &self.relative_url {
            Some(relative_url) => MigrationKey::new(relative_url),
            None => {
                let date = self
                    .date
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "undated".to_string());
                MigrationKey::new(format!("news/{}/{}", date, slugify(&self.title)))
            }
        }
    }
}

/// A crawled legacy page
#[derive(Debug, Clone)]
pub struct ScrapedPage {
    /// Absolute URL of the page
    pub url: String,

    /// Path relative to the crawl root
    pub relative_url: String,

    /// Page title
    pub title: String,

    /// Raw HTML as fetched
    pub html: String,

    /// Inner HTML of the main content container
    pub content: String,

    /// Absolute URLs of every link on the page
    pub links: Vec<String>,

    /// Downloads linked from the main content
    pub downloads: Vec<Download>,

    /// Absolute URLs of the breadcrumb trail, root first
    pub breadcrumbs: Vec<String>,

    /// Parent/child pairs observed in the nested navigation menu
    pub menu_claims: Vec<MenuClaim>,

    /// News stories listed on this page
    pub news: Vec<NewsStory>,

    /// Whether this is the site's front page
    pub is_front_page: bool,

    /// Whether this is the news-archive page
    pub is_news_archive: bool,

    /// False for pages explicitly excluded or without a content container
    pub should_import: bool,

    destination: OnceCell<Post>,
}

impl ScrapedPage {
    /// A page with no content yet, importable by default
    pub fn new(url: impl Into<String>, relative_url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            relative_url: relative_url.into(),
            title: String::new(),
            html: String::new(),
            content: String::new(),
            links: Vec::new(),
            downloads: Vec::new(),
            breadcrumbs: Vec::new(),
            menu_claims: Vec::new(),
            news: Vec::new(),
            is_front_page: false,
            is_news_archive: false,
            should_import: true,
            destination: OnceCell::new(),
        }
    }

    /// Whether the page goes through the generic page import
    pub fn is_importable(&self) -> bool {
        !self.is_front_page && !self.is_news_archive && self.should_import
    }

    /// Whether the page's content links to any downloads
    pub fn has_downloads(&self) -> bool {
        !self.downloads.is_empty()
    }

    /// Idempotence key of the destination page
    pub fn key(&self) -> MigrationKey {
        MigrationKey::new(&self.relative_url)
    }

    /// The destination post this page was imported as, once known
    pub fn destination(&self) -> Option<&Post> {
        self.destination.get()
    }

    /// Identifier of the destination post, once known
    pub fn destination_id(&self) -> Option<PostId> {
        self.destination().map(|post| post.id)
    }

    /// Record the destination post. Returns false if one was already set.
    pub fn set_destination(&self, post: Post) -> bool {
        self.destination.set(post).is_ok()
    }
}

/// The crawl result: every page in crawl order, read-only after collection
#[derive(Debug, Clone)]
pub struct CrawlCollection {
    root: Url,
    pages: Vec<ScrapedPage>,
}

impl CrawlCollection {
    /// Build a collection from already-fetched `(url, html)` pairs
    pub fn from_html<I>(config: &CrawlerConfig, documents: I) -> Result<Self, CrawlError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let root = Url::parse(&config.root_url)?;
        let mut pages: Vec<ScrapedPage> = Vec::new();

        for (url, html) in documents {
            let url = Url::parse(&url)?;
            if pages.iter().any(|p| p.url == url.as_str()) {
                continue;
            }
            if let Some(page) = extract_page(&url, &html, &root, config)? {
                pages.push(page);
            }
        }

        Ok(Self { root, pages })
    }

    /// Root URL of the crawl
    pub fn root(&self) -> &Url {
        &self.root
    }

    /// All pages in crawl order
    pub fn pages(&self) -> &[ScrapedPage] {
        &self.pages
    }

    /// Look up a page by absolute URL
    pub fn get(&self, url: &str) -> Option<&ScrapedPage> {
        self.pages.iter().find(|p| p.url == url)
    }

    /// The front page, if one was crawled
    pub fn front_page(&self) -> Option<&ScrapedPage> {
        self.pages.iter().find(|p| p.is_front_page)
    }

    /// Pages that go through the generic page import
    pub fn importable(&self) -> impl Iterator<Item = &ScrapedPage> {
        self.pages.iter().filter(|p| p.is_importable())
    }

    /// Pages whose news listings feed the post import
    pub fn news_sources(&self) -> impl Iterator<Item = &ScrapedPage> {
        self.pages
            .iter()
            .filter(|p| p.is_front_page || p.is_news_archive)
    }

    /// Number of pages
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Whether the crawl found nothing
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Lowercase, hyphen-separated form of a title
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::PostType;

    fn page(relative_url: &str) -> ScrapedPage {
        ScrapedPage::new(format!("http://legacy.test/{}", relative_url), relative_url)
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("New Office Opens!"), "new-office-opens");
        assert_eq!(slugify("  Q&A: 2015 "), "q-a-2015");
    }

    #[test]
    fn test_story_key_prefers_relative_url() {
        let linked = NewsStory {
            title: "Budget".to_string(),
            date: None,
            content: String::new(),
            relative_url: Some("news/12.htm".to_string()),
        };
        assert_eq!(linked.key().as_str(), "news/12.htm");

        let unlinked = NewsStory {
            relative_url: None,
            date: NaiveDate::from_ymd_opt(2015, 3, 12),
            ..linked
        };
        assert_eq!(unlinked.key().as_str(), "news/2015-03-12/budget");
    }

    #[test]
    fn test_classification_flags_exclude_pages() {
        let mut front = page("index.htm");
        front.is_front_page = true;
        let mut archive = page("news.htm");
        archive.is_news_archive = true;
        let mut flagged = page("old.htm");
        flagged.should_import = false;

        assert!(!front.is_importable());
        assert!(!archive.is_importable());
        assert!(!flagged.is_importable());
        assert!(page("853.htm").is_importable());
    }

    #[test]
    fn test_destination_is_set_once() {
        let p = page("853.htm");
        assert!(p.destination().is_none());

        let post = Post {
            id: 7,
            post_type: PostType::Page,
            title: "Page".to_string(),
            content: String::new(),
            parent: None,
            link: "https://cms.test/?p=7".to_string(),
            key: Some(p.key()),
        };
        assert!(p.set_destination(post.clone()));
        assert!(!p.set_destination(Post { id: 8, ..post }));
        assert_eq!(p.destination_id(), Some(7));
    }
}
