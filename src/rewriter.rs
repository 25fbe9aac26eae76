//! # Asset Rewriter Module
//!
//! Rewrites links and images in migrated content that still point at the
//! legacy site. A reference is any `href`/`src` attribute value starting with
//! one of the legacy base URLs (the absolute and site-relative forms of the
//! same root). The remainder of the value is a migration key, resolved to:
//!
//! 1. the permalink of the migrated page or post with that key
//! 2. the file URL of the migrated attachment with that key
//! 3. a fresh attachment, when the file exists in the local mirror
//!
//! Unresolved references are left as they are. Rewritten values no longer
//! start with a legacy prefix, so running the rewriter again changes nothing.

use crate::cms::{Cms, MediaUpload, MigrationKey, Post, PostType, PostUpdate};
use crate::importer::{ImportConfig, ImportError};
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;
use std::ops::Range;
use tracing::{debug, info, instrument, warn};

/// Attribute values inside double or single quotes
const ATTRIBUTE_PATTERN: &str = r#"(?i)\b(?:href|src)\s*=\s*(?:"([^"]*)"|'([^']*)')"#;

/// One legacy reference found in content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyReference<'a> {
    /// Byte range of the attribute value
    pub range: Range<usize>,

    /// Full attribute value
    pub value: &'a str,

    /// Value with the legacy prefix removed
    pub path: &'a str,
}

impl<'a> LegacyReference<'a> {
    /// Percent-decoded path without query string or fragment
    pub fn key(&self) -> Cow<'a, str> {
        let path = self.path.split(['?', '#']).next().unwrap_or(self.path);
        urlencoding::decode(path).unwrap_or(Cow::Borrowed(path))
    }

    /// Fragment including the `#`, if any
    pub fn fragment(&self) -> Option<&'a str> {
        self.path.find('#').map(|i| &self.path[i..])
    }
}

/// Finds and replaces legacy references. Holds no state beyond the prefixes.
#[derive(Debug, Clone)]
pub struct LegacyLinks {
    prefixes: Vec<String>,
    pattern: Regex,
}

impl LegacyLinks {
    pub fn new(base_urls: &[String]) -> Result<Self, regex::Error> {
        let mut prefixes: Vec<String> = base_urls
            .iter()
            .filter(|url| !url.is_empty())
            .cloned()
            .collect();
        // Longest first so an absolute URL is not matched by a shorter variant
        prefixes.sort_by(|a, b| b.len().cmp(&a.len()));
        prefixes.dedup();

        Ok(Self {
            prefixes,
            pattern: Regex::new(ATTRIBUTE_PATTERN)?,
        })
    }

    /// Every legacy reference in `content`, in document order
    pub fn references<'c>(&self, content: &'c str) -> Vec<LegacyReference<'c>> {
        self.pattern
            .captures_iter(content)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
            .filter_map(|m| {
                let value = m.as_str();
                let prefix = self.prefixes.iter().find(|p| value.starts_with(p.as_str()))?;
                Some(LegacyReference {
                    range: m.range(),
                    value,
                    path: &value[prefix.len()..],
                })
            })
            .collect()
    }

    /// Replace every reference whose key `resolve` maps to a target.
    ///
    /// The reference's fragment is carried over to the target.
    pub fn rewrite<'c, F>(&self, content: &'c str, mut resolve: F) -> Cow<'c, str>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let references = self.references(content);
        let mut output = String::new();
        let mut last = 0;

        for reference in &references {
            let Some(mut target) = resolve(&reference.key()) else {
                continue;
            };
            if let Some(fragment) = reference.fragment() {
                if !target.contains('#') {
                    target.push_str(fragment);
                }
            }
            output.push_str(&content[last..reference.range.start]);
            output.push_str(&target);
            last = reference.range.end;
        }

        if last == 0 {
            return Cow::Borrowed(content);
        }
        output.push_str(&content[last..]);
        Cow::Owned(output)
    }
}

/// Totals of a rewrite pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteReport {
    /// Records inspected
    pub scanned: usize,

    /// Records whose content was written back
    pub rewritten: usize,

    /// Keys no target could be found for
    pub unresolved: Vec<String>,
}

/// Rewrites legacy references in migrated records through the CMS
pub struct AssetRewriter<'a, C: Cms> {
    cms: &'a C,
    config: &'a ImportConfig,
    links: LegacyLinks,
    home_url: Option<String>,
    front_page_paths: Vec<String>,
    resolved: HashMap<String, Option<String>>,
}

impl<'a, C: Cms> AssetRewriter<'a, C> {
    pub fn new(cms: &'a C, config: &'a ImportConfig, links: LegacyLinks) -> Self {
        Self {
            cms,
            config,
            links,
            home_url: None,
            front_page_paths: Vec::new(),
            resolved: HashMap::new(),
        }
    }

    /// Send references to the legacy front page to `home_url`
    pub fn with_home(mut self, home_url: impl Into<String>, front_page_paths: &[String]) -> Self {
        self.home_url = Some(home_url.into());
        self.front_page_paths = front_page_paths.to_vec();
        self
    }

    /// Rewrite every migrated record of `post_type`
    #[instrument(skip(self))]
    pub async fn rewrite_all(&mut self, post_type: PostType) -> Result<RewriteReport, ImportError> {
        let posts = self.cms.list_migrated(post_type).await?;
        let mut report = RewriteReport::default();
        for post in &posts {
            report.scanned += 1;
            if self.rewrite_post(post, &mut report).await?.is_some() {
                report.rewritten += 1;
            }
        }
        info!(
            "Rewrote {} of {} {}s, {} unresolved references",
            report.rewritten,
            report.scanned,
            post_type,
            report.unresolved.len()
        );
        Ok(report)
    }

    /// Rewrite one record; returns the updated record if its content changed
    pub async fn rewrite_post(
        &mut self,
        post: &Post,
        report: &mut RewriteReport,
    ) -> Result<Option<Post>, ImportError> {
        let keys: Vec<String> = self
            .links
            .references(&post.content)
            .iter()
            .map(|r| r.key().into_owned())
            .collect();
        if keys.is_empty() {
            return Ok(None);
        }

        for key in keys {
            if self.resolved.contains_key(&key) {
                continue;
            }
            let target = self.resolve(&key, post).await?;
            if target.is_none() {
                warn!("No destination for legacy reference {} in {} {}", key, post.post_type, post.id);
                report.unresolved.push(key.clone());
            }
            self.resolved.insert(key, target);
        }

        let resolved = &self.resolved;
        let content = self
            .links
            .rewrite(&post.content, |key| resolved.get(key).cloned().flatten());
        let Cow::Owned(content) = content else {
            return Ok(None);
        };
        if content == post.content {
            return Ok(None);
        }

        let updated = self
            .cms
            .update_post(post.post_type, post.id, &PostUpdate::content(content))
            .await?;
        debug!("Rewrote references in {} {}", post.post_type, post.id);
        Ok(Some(updated))
    }

    async fn resolve(&self, key: &str, referrer: &Post) -> Result<Option<String>, ImportError> {
        if let Some(home) = &self.home_url {
            if key.is_empty() || self.front_page_paths.iter().any(|p| p == key) {
                return Ok(Some(home.clone()));
            }
        }
        if key.is_empty() {
            return Ok(None);
        }

        let migration_key = MigrationKey::new(key);
        for post_type in [PostType::Page, PostType::Post, PostType::Attachment] {
            if let Some(found) = self.cms.find_by_key(post_type, &migration_key).await? {
                return Ok(Some(found.link));
            }
        }

        let path = self.config.mirror_file(key);
        let is_file = tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Ok(None);
        }

        let title = key.rsplit('/').next().unwrap_or(key).to_string();
        let upload = MediaUpload {
            path,
            title,
            parent: Some(referrer.id),
            author: Some(self.config.author_id),
            key: migration_key,
        };
        let attachment = self.cms.upload_media(&upload).await?;
        debug!("Uploaded {} for legacy reference {}", upload.path.display(), key);
        Ok(Some(attachment.link))
    }
}
