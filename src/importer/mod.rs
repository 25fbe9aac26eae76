//! # Content Importers Module
//!
//! Turns scraped entities into destination records, idempotently. Each
//! importer looks an entity up by its [`MigrationKey`] before writing, and
//! `ImportConfig::skip_existing` decides whether a record that is already
//! there is reused or replaced.
//!
//! ## Key Components
//!
//! - `PageImporter`: legacy pages become destination pages
//! - `DownloadsImporter`: files linked from a page become attachments listed
//!   in the page's downloads field
//! - `MenuImporter`: the page hierarchy becomes navigation menu items
//! - `PostImporter`: news stories become blog posts

mod config;
mod downloads;
mod error;
mod menu;
mod page;
mod post;

pub use config::{ImportConfig, ImportConfigBuilder};
pub use downloads::{DownloadsImporter, DownloadsOutcome};
pub use error::ImportError;
pub use menu::{MenuImportReport, MenuImporter};
pub use page::PageImporter;
pub use post::PostImporter;

use crate::cms::{Cms, MigrationKey, NewPost, Post, PostType, PostUpdate};
use chrono::NaiveDateTime;
use std::fmt;
use tracing::debug;

/// What an import did with one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    /// A new record was created
    Created,
    /// An existing record was overwritten
    Updated,
    /// An existing record was reused as is
    Skipped,
    /// The entity is not imported at all
    Excluded,
}

impl fmt::Display for ImportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImportOutcome::Created => "created",
            ImportOutcome::Updated => "updated",
            ImportOutcome::Skipped => "skipped",
            ImportOutcome::Excluded => "excluded",
        };
        f.write_str(name)
    }
}

/// A page or post to create or refresh
struct Draft<'a> {
    post_type: PostType,
    key: MigrationKey,
    title: &'a str,
    content: &'a str,
    date: Option<NaiveDateTime>,
}

/// Shared skip/update/create policy of the page and post importers
async fn upsert<C: Cms>(
    cms: &C,
    config: &ImportConfig,
    draft: Draft<'_>,
) -> Result<(Post, ImportOutcome), ImportError> {
    match cms.find_by_key(draft.post_type, &draft.key).await? {
        Some(existing) if config.skip_existing => {
            debug!("Reusing {} {} for {}", draft.post_type, existing.id, draft.key);
            Ok((existing, ImportOutcome::Skipped))
        }
        Some(existing) => {
            let update = PostUpdate {
                title: Some(draft.title.to_string()),
                content: Some(draft.content.to_string()),
                parent: None,
            };
            let post = cms.update_post(draft.post_type, existing.id, &update).await?;
            debug!("Updated {} {} for {}", draft.post_type, post.id, draft.key);
            Ok((post, ImportOutcome::Updated))
        }
        None => {
            let new = NewPost {
                post_type: draft.post_type,
                title: draft.title.to_string(),
                content: draft.content.to_string(),
                author: Some(config.author_id),
                parent: None,
                date: draft.date,
                key: draft.key,
            };
            let post = cms.create_post(&new).await?;
            debug!("Created {} {} for {}", new.post_type, post.id, new.key);
            Ok((post, ImportOutcome::Created))
        }
    }
}
