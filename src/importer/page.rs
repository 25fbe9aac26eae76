//! Page importer

use crate::cms::{Cms, PostType};
use crate::crawler::ScrapedPage;
use crate::importer::{Draft, ImportConfig, ImportError, ImportOutcome, upsert};
use tracing::{debug, instrument};

/// Imports legacy pages as destination pages
pub struct PageImporter<'a, C: Cms> {
    cms: &'a C,
    config: &'a ImportConfig,
}

impl<'a, C: Cms> PageImporter<'a, C> {
    pub fn new(cms: &'a C, config: &'a ImportConfig) -> Self {
        Self { cms, config }
    }

    /// Create or refresh the destination page and record it on `page`.
    ///
    /// Front page, news archive and excluded pages are left alone.
    #[instrument(skip(self, page), fields(page = %page.relative_url))]
    pub async fn import(&self, page: &ScrapedPage) -> Result<ImportOutcome, ImportError> {
        if !page.is_importable() {
            return Ok(ImportOutcome::Excluded);
        }

        let draft = Draft {
            post_type: PostType::Page,
            key: page.key(),
            title: &page.title,
            content: &page.content,
            date: None,
        };
        let (post, outcome) = upsert(self.cms, self.config, draft).await?;

        if !page.set_destination(post) {
            debug!("Destination of {} was already recorded", page.relative_url);
        }
        Ok(outcome)
    }
}
