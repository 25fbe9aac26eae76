//! # Migration Pipeline Module
//!
//! Sequences a complete run against one destination CMS:
//!
//! 1. crawl the legacy site (or replay the cached crawl)
//! 2. build the navigation structure
//! 3. import pages and their downloads
//! 4. parent each page under its resolved hierarchy parent
//! 5. mirror the hierarchy into the navigation menu
//! 6. import news stories as posts
//! 7. rewrite legacy links in pages and posts
//! 8. apply the form fixup
//!
//! Steps run one after another; the first error ends the run.

mod config;
mod fixups;

pub use config::{FormFixup, MigrationConfig, MigrationConfigBuilder};
pub use fixups::{link_parents, replace_form};

use crate::cms::{Cms, PostType};
use crate::crawler::storage::{Storage, StorageConfig};
use crate::crawler::{CrawlCollection, crawl_site};
use crate::error::Result;
use crate::hierarchy::PageHierarchy;
use crate::importer::{
    DownloadsImporter, DownloadsOutcome, ImportOutcome, MenuImportReport, MenuImporter,
    PageImporter, PostImporter,
};
use crate::navigation::NavigationStructure;
use crate::rewriter::{AssetRewriter, LegacyLinks, RewriteReport};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, instrument};

/// Per-outcome tally of an import step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub excluded: usize,
}

impl OutcomeCounts {
    pub fn record(&mut self, outcome: ImportOutcome) {
        match outcome {
            ImportOutcome::Created => self.created += 1,
            ImportOutcome::Updated => self.updated += 1,
            ImportOutcome::Skipped => self.skipped += 1,
            ImportOutcome::Excluded => self.excluded += 1,
        }
    }
}

/// What a run did
#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    pub crawled: usize,
    pub pages: OutcomeCounts,
    /// Pages whose downloads field was saved
    pub download_pages: usize,
    pub parents_linked: usize,
    pub menu: MenuImportReport,
    pub posts: OutcomeCounts,
    pub page_rewrites: RewriteReport,
    pub post_rewrites: RewriteReport,
    pub form_replaced: bool,
}

/// A migration run against one destination
pub struct Migration<C: Cms> {
    config: MigrationConfig,
    cms: C,
    interactive: bool,
}

impl<C: Cms> Migration<C> {
    pub fn new(config: MigrationConfig, cms: C) -> Self {
        Self {
            config,
            cms,
            interactive: false,
        }
    }

    /// Print step banners and progress bars to the terminal
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub fn cms(&self) -> &C {
        &self.cms
    }

    /// Crawl the legacy site and import everything
    #[instrument(skip(self), fields(root = %self.config.crawler.root_url))]
    pub async fn run(&self) -> Result<MigrationReport> {
        self.step("Spidering site");
        let storage = Storage::with_config(StorageConfig {
            base_path: self.config.cache_dir.clone(),
        });
        let collection = crawl_site(&self.config.crawler, &storage).await?;
        info!("Crawled {} pages", collection.len());

        self.import_collection(&collection).await
    }

    /// Import an already crawled site
    #[instrument(skip_all, fields(pages = collection.len()))]
    pub async fn import_collection(&self, collection: &CrawlCollection) -> Result<MigrationReport> {
        let mut report = MigrationReport {
            crawled: collection.len(),
            ..MigrationReport::default()
        };
        let import = &self.config.import;
        let pages = collection.pages();

        self.step("Generating navigation structure");
        let navigation = NavigationStructure::build(pages);

        self.step("Importing pages");
        let page_importer = PageImporter::new(&self.cms, import);
        let downloads_importer = DownloadsImporter::new(&self.cms, import);
        let bar = self.progress(pages.len(), "pages");
        for page in pages {
            bar.set_message(page.relative_url.clone());
            let outcome = page_importer.import(page).await?;
            report.pages.record(outcome);
            if outcome != ImportOutcome::Excluded {
                if let DownloadsOutcome::Saved(_) = downloads_importer.import(page).await? {
                    report.download_pages += 1;
                }
            }
            bar.inc(1);
        }
        bar.finish_and_clear();

        self.step("Importing page hierarchy");
        let hierarchy = PageHierarchy::new(&navigation, pages);
        report.parents_linked = link_parents(&self.cms, &hierarchy, pages).await?;

        self.step("Adding pages to the navigation menu");
        report.menu = MenuImporter::new(&self.cms)
            .import_hierarchy(&hierarchy, &self.config.menu_name)
            .await?;

        self.step("Importing news posts");
        let post_importer = PostImporter::new(&self.cms, import);
        for source in collection.news_sources() {
            for story in &source.news {
                let (_, outcome) = post_importer.import(story, source).await?;
                report.posts.record(outcome);
            }
        }

        self.step("Rewriting links and images in pages and posts");
        let links = LegacyLinks::new(&self.config.legacy_base_urls)
            .map_err(crate::importer::ImportError::from)?;
        let mut rewriter = AssetRewriter::new(&self.cms, import, links);
        if let Some(home_url) = &self.config.home_url {
            rewriter = rewriter.with_home(home_url, &self.config.crawler.front_page_paths);
        }
        report.page_rewrites = rewriter.rewrite_all(PostType::Page).await?;
        report.post_rewrites = rewriter.rewrite_all(PostType::Post).await?;

        self.step("Replacing embedded form with shortcode");
        report.form_replaced = replace_form(&self.cms, &self.config.form_fixup).await?;

        info!(
            "Migration finished: {} pages created, {} posts created",
            report.pages.created, report.posts.created
        );
        Ok(report)
    }

    fn step(&self, name: &str) {
        info!("{}", name);
        if self.interactive {
            println!("{}", name);
        }
    }

    fn progress(&self, len: usize, unit: &str) -> ProgressBar {
        if !self.interactive {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len as u64);
        let template = format!("[{{elapsed_precise}}] {{bar:40.cyan/blue}} {{pos}}/{{len}} {} {{msg}}", unit);
        if let Ok(style) = ProgressStyle::default_bar().template(&template) {
            bar.set_style(style.progress_chars("##-"));
        }
        bar
    }
}
