//! # site-migrate CLI Application
//!
//! Command-line entry point for migrating the legacy intranet into the
//! destination CMS.
//!
//! ## Key Components
//!
//! - CLI argument parsing with clap
//! - Subcommands:
//!   - `run`: crawl the legacy site and import everything
//!   - `crawl`: only crawl, filling the response cache
//!
//! Every setting has a built-in default; a JSON config file and flags
//! override them, in that order. The CMS password is read from the
//! `SITE_MIGRATE_CMS_PASSWORD` environment variable.

mod telemetry;

use anyhow::{Context, anyhow};
use clap::{Args, Parser, Subcommand};
use site_migrate::cms::{Cms, MemoryCms, WordPressCms};
use site_migrate::crawler::crawl_site;
use site_migrate::crawler::storage::{Storage, StorageConfig};
use site_migrate::migration::{Migration, MigrationConfig, MigrationReport};
use std::path::PathBuf;
use telemetry::OtelGuard;
use tracing::instrument;

const PASSWORD_VAR: &str = "SITE_MIGRATE_CMS_PASSWORD";

#[derive(Parser)]
#[command(author, version, about = "Migrate a legacy website into a WordPress CMS", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Crawl the legacy site and import it into the CMS
    Run(RunArgs),

    /// Crawl the legacy site into the response cache without importing
    Crawl(SiteArgs),
}

#[derive(Args, Debug)]
struct SiteArgs {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root URL of the legacy site
    #[arg(short, long)]
    url: Option<String>,

    /// Maximum number of pages to crawl
    #[arg(short = 'p', long)]
    max_pages: Option<u32>,

    /// Response cache directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    site: SiteArgs,

    /// Local mirror of the legacy files
    #[arg(short, long)]
    mirror_path: Option<PathBuf>,

    /// Author id of created records
    #[arg(short, long)]
    author_id: Option<u64>,

    /// Replace already imported records instead of reusing them
    #[arg(long)]
    overwrite: bool,

    /// Structured field listing a page's downloads
    #[arg(long)]
    downloads_field: Option<String>,

    /// Legacy URL prefix to rewrite (repeatable)
    #[arg(long = "legacy-base-url")]
    legacy_base_urls: Vec<String>,

    /// Where links to the legacy front page should point
    #[arg(long)]
    home_url: Option<String>,

    /// Navigation menu receiving the page hierarchy
    #[arg(long)]
    menu: Option<String>,

    /// Site URL of the destination CMS
    #[arg(long, default_value = "http://localhost")]
    cms_url: String,

    /// CMS user owning the application password
    #[arg(long, default_value = "admin")]
    cms_user: String,

    /// Import into an in-memory CMS instead of the real one
    #[arg(long)]
    dry_run: bool,
}

impl SiteArgs {
    fn load_config(&self) -> anyhow::Result<MigrationConfig> {
        let mut config = match &self.config {
            Some(path) => MigrationConfig::from_file(path)?,
            None => MigrationConfig::default(),
        };
        if let Some(url) = &self.url {
            config.crawler.root_url = url.clone();
        }
        if let Some(max_pages) = self.max_pages {
            config.crawler.max_pages = max_pages;
        }
        if let Some(cache_dir) = &self.cache_dir {
            config.cache_dir = cache_dir.clone();
        }
        Ok(config)
    }
}

impl RunArgs {
    fn load_config(&self) -> anyhow::Result<MigrationConfig> {
        let mut config = self.site.load_config()?;
        if let Some(mirror_path) = &self.mirror_path {
            config.import.mirror_path = mirror_path.clone();
        }
        if let Some(author_id) = self.author_id {
            config.import.author_id = author_id;
        }
        if self.overwrite {
            config.import.skip_existing = false;
        }
        if let Some(field) = &self.downloads_field {
            config.import.downloads_field = field.clone();
        }
        if !self.legacy_base_urls.is_empty() {
            config.legacy_base_urls = self.legacy_base_urls.clone();
        }
        if let Some(home_url) = &self.home_url {
            config.home_url = Some(home_url.clone());
        }
        if let Some(menu) = &self.menu {
            config.menu_name = menu.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    let _otel: OtelGuard = telemetry::init_tracing_subscriber()?;

    match cli.command {
        Some(Commands::Run(args)) => {
            run_command(args).await?;
        }
        Some(Commands::Crawl(args)) => {
            crawl_command(args).await?;
        }
        None => {
            // If no command is provided, show help
            let _ = Cli::parse_from(["site-migrate", "--help"]);
        }
    }

    Ok(())
}

#[instrument]
async fn run_command(args: RunArgs) -> anyhow::Result<()> {
    let config = args.load_config()?;

    let report = if args.dry_run {
        println!("Dry run: importing into an in-memory CMS");
        let cms = MemoryCms::new(args.cms_url.clone()).with_menu(config.menu_name.clone());
        let migration = Migration::new(config, cms).interactive(true);
        let report = migration.run().await?;
        println!("{} CMS writes", migration.cms().write_count());
        report
    } else {
        let password = std::env::var(PASSWORD_VAR)
            .with_context(|| format!("{} must be set to the CMS application password", PASSWORD_VAR))?;
        let cms = WordPressCms::new(args.cms_url.clone(), args.cms_user.clone(), password)
            .map_err(|e| anyhow!("Cannot create CMS client: {}", e))?
            .with_meta_keys(config.meta_keys.clone());
        run_migration(config, cms).await?
    };

    print_report(&report);
    println!("Done");
    Ok(())
}

async fn run_migration<C: Cms>(config: MigrationConfig, cms: C) -> anyhow::Result<MigrationReport> {
    Ok(Migration::new(config, cms).interactive(true).run().await?)
}

#[instrument]
async fn crawl_command(args: SiteArgs) -> anyhow::Result<()> {
    let config = args.load_config()?;
    println!("Crawling {}...", config.crawler.root_url);

    let storage = Storage::with_config(StorageConfig {
        base_path: config.cache_dir.clone(),
    });
    let collection = crawl_site(&config.crawler, &storage).await?;

    println!("Crawled {} pages under {}", collection.len(), collection.root());
    if let Some(front) = collection.front_page() {
        println!("  front page: {} ({})", front.title, front.relative_url);
    }
    println!("  importable: {}", collection.importable().count());
    println!(
        "  with downloads: {}",
        collection.pages().iter().filter(|p| p.has_downloads()).count()
    );
    println!(
        "  news stories: {}",
        collection.news_sources().map(|p| p.news.len()).sum::<usize>()
    );
    println!("Done");
    Ok(())
}

fn print_report(report: &MigrationReport) {
    println!("Crawled {} pages", report.crawled);
    println!(
        "Pages: {} created, {} updated, {} skipped, {} excluded",
        report.pages.created, report.pages.updated, report.pages.skipped, report.pages.excluded
    );
    println!("Downloads saved on {} pages", report.download_pages);
    println!("Parents linked: {}", report.parents_linked);
    println!(
        "Menu items: {} added, {} reused",
        report.menu.added, report.menu.reused
    );
    println!(
        "Posts: {} created, {} updated, {} skipped",
        report.posts.created, report.posts.updated, report.posts.skipped
    );
    println!(
        "Rewritten: {} pages, {} posts",
        report.page_rewrites.rewritten, report.post_rewrites.rewritten
    );
    let unresolved = report.page_rewrites.unresolved.len() + report.post_rewrites.unresolved.len();
    if unresolved > 0 {
        println!("Unresolved legacy references: {}", unresolved);
    }
    if report.form_replaced {
        println!("Replaced People Finder form with shortcode");
    }
}
