//! # site-migrate - Legacy Site Migration for Rust
//!
//! This crate moves a legacy static website into a WordPress-style CMS. It
//! crawls the old site, reconstructs its page tree from breadcrumbs and
//! nested menus, and imports pages, downloads, menu structure and news posts
//! through the CMS's REST API. Links and images in the imported content that
//! still point at the old site are then rewritten to their new locations.
//!
//! ## Features
//!
//! - Website crawling with `spider` and an on-disk response cache
//! - Page-layout extraction with `scraper`
//! - Page hierarchy reconstruction that skips pages which were never imported
//! - Idempotent imports keyed by each entity's legacy relative URL:
//!   - Pages and news posts
//!   - Downloads, deduplicated against the page's downloads field and the
//!     media library
//!   - Navigation menu items
//! - Legacy link and asset rewriting
//! - A `Cms` trait with a WordPress REST adapter and an in-memory adapter
//!   for dry runs
//!
//! ## Example
//!
//! ```rust,no_run
//! use site_migrate::cms::MemoryCms;
//! use site_migrate::migration::{Migration, MigrationConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MigrationConfig::builder()
//!         .home_url("https://intranet.example/")
//!         .build();
//!     let cms = MemoryCms::new("https://intranet.example").with_menu("Primary Navigation");
//!
//!     let report = Migration::new(config, cms).run().await?;
//!     println!("{} pages created", report.pages.created);
//!     Ok(())
//! }
//! ```

mod error;

pub mod cms;
pub mod crawler;
pub mod hierarchy;
pub mod importer;
pub mod migration;
pub mod navigation;
pub mod rewriter;

pub use error::{Error, Result};

/// Re-export of types module for public use
pub mod prelude {
    pub use crate::cms::{Cms, MemoryCms, MigrationKey, Post, PostType, WordPressCms};
    pub use crate::crawler::{CrawlCollection, CrawlerConfig, ScrapedPage};
    pub use crate::error::Error;
    pub use crate::error::Result;
    pub use crate::importer::{ImportConfig, ImportOutcome};
    pub use crate::migration::{Migration, MigrationConfig, MigrationReport};
}
