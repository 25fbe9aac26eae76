//! # Page Downloads Importer
//!
//! Every file linked from a page's content becomes an attachment listed
//! once in the page's downloads field. Two independent checks keep repeated
//! runs from duplicating files:
//!
//! 1. the page's field already lists an attachment with the download's
//!    *title* (last match wins)
//! 2. the media library already holds an attachment keyed by the download's
//!    *relative URL*
//!
//! With `skip_existing`, a hit on (1) leaves the entry alone and a hit on (2)
//! reuses the attachment. Without it, both are deleted and the file is
//! uploaded again. The field is written once per page. Nothing is rolled
//! back: an upload failure aborts the page with earlier deletions applied.

use crate::cms::{Cms, DownloadsField, MediaUpload, Post, PostId, PostType};
use crate::crawler::{Download, ScrapedPage};
use crate::importer::{ImportConfig, ImportError};
use tracing::{debug, info, instrument};

/// Result of importing one page's downloads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadsOutcome {
    /// The page links to no downloads; nothing was read or written
    NotApplicable,
    /// The field was saved with these attachment ids, in order
    Saved(Vec<PostId>),
    /// The CMS did not accept the field value
    NotSaved,
}

/// Imports the downloads linked from legacy pages
pub struct DownloadsImporter<'a, C: Cms> {
    cms: &'a C,
    config: &'a ImportConfig,
}

impl<'a, C: Cms> DownloadsImporter<'a, C> {
    pub fn new(cms: &'a C, config: &'a ImportConfig) -> Self {
        Self { cms, config }
    }

    /// Import the downloads of an already imported page
    #[instrument(skip(self, page), fields(page = %page.relative_url, downloads = page.downloads.len()))]
    pub async fn import(&self, page: &ScrapedPage) -> Result<DownloadsOutcome, ImportError> {
        if !page.has_downloads() {
            return Ok(DownloadsOutcome::NotApplicable);
        }
        let page_id = page
            .destination_id()
            .ok_or_else(|| ImportError::PageNotImported(page.relative_url.clone()))?;
        let field_name = self.config.downloads_field.as_str();

        let stored = self.cms.get_field(PostType::Page, page_id, field_name).await?;
        let mut field = DownloadsField::from_value(stored.as_ref());
        let mut listed = self.listed_attachments(&field).await?;

        for download in &page.downloads {
            let listed_match = listed
                .iter()
                .rev()
                .find(|a| a.title == download.title)
                .map(|a| a.id);
            if let Some(existing_id) = listed_match {
                if self.config.skip_existing {
                    debug!("{} already listed as {}", download.title, existing_id);
                    continue;
                }
                field.remove(existing_id);
                listed.retain(|a| a.id != existing_id);
                self.cms.delete_post(PostType::Attachment, existing_id).await?;
                debug!("Deleted listed attachment {}", existing_id);
            }

            let attachment = self.library_attachment(download, page_id).await?;
            field.push(attachment.id);
        }

        let saved = self
            .cms
            .save_field(PostType::Page, page_id, field_name, &field.to_value())
            .await?;
        if saved {
            info!("Saved {} downloads", field.len());
            Ok(DownloadsOutcome::Saved(field.files()))
        } else {
            Ok(DownloadsOutcome::NotSaved)
        }
    }

    /// Attachments currently referenced by the field; missing ones are ignored
    async fn listed_attachments(&self, field: &DownloadsField) -> Result<Vec<Post>, ImportError> {
        let mut ids = field.files();
        ids.dedup();
        let mut attachments = Vec::with_capacity(ids.len());
        for id in ids {
            if attachments.iter().any(|a: &Post| a.id == id) {
                continue;
            }
            if let Some(attachment) = self.cms.get_post(PostType::Attachment, id).await? {
                attachments.push(attachment);
            }
        }
        Ok(attachments)
    }

    /// The attachment for `download`, reusing or replacing a keyed one
    async fn library_attachment(&self, download: &Download, page_id: PostId) -> Result<Post, ImportError> {
        let key = download.key();
        if let Some(existing) = self.cms.find_by_key(PostType::Attachment, &key).await? {
            if self.config.skip_existing {
                debug!("Reusing attachment {} for {}", existing.id, key);
                return Ok(existing);
            }
            self.cms.delete_post(PostType::Attachment, existing.id).await?;
            debug!("Deleted attachment {} for re-upload", existing.id);
        }

        let upload = MediaUpload {
            path: self.config.mirror_file(&download.relative_url),
            title: download.title.clone(),
            parent: Some(page_id),
            author: Some(self.config.author_id),
            key,
        };
        let attachment = self.cms.upload_media(&upload).await?;
        debug!("Uploaded {} as {}", upload.path.display(), attachment.id);
        Ok(attachment)
    }
}
