//! News post importer

use crate::cms::{Cms, Post, PostType};
use crate::crawler::{NewsStory, ScrapedPage};
use crate::importer::{Draft, ImportConfig, ImportError, ImportOutcome, upsert};
use tracing::instrument;

/// Imports news stories as blog posts
pub struct PostImporter<'a, C: Cms> {
    cms: &'a C,
    config: &'a ImportConfig,
}

impl<'a, C: Cms> PostImporter<'a, C> {
    pub fn new(cms: &'a C, config: &'a ImportConfig) -> Self {
        Self { cms, config }
    }

    /// Create or refresh the post for one story listed on `source`
    #[instrument(skip(self, story, source), fields(source = %source.relative_url, key = %story.key()))]
    pub async fn import(
        &self,
        story: &NewsStory,
        source: &ScrapedPage,
    ) -> Result<(Post, ImportOutcome), ImportError> {
        let draft = Draft {
            post_type: PostType::Post,
            key: story.key(),
            title: &story.title,
            content: &story.content,
            date: story.date.and_then(|d| d.and_hms_opt(0, 0, 0)),
        };
        upsert(self.cms, self.config, draft).await
    }
}
