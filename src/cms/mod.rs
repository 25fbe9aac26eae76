//! # Destination CMS Module
//!
//! The collaborator surface the importers write through. Every record the
//! migration creates carries the migration marker and a [`MigrationKey`]
//! (the legacy relative URL), which is how "was this already imported" is
//! answered on later runs.
//!
//! ## Key Components
//!
//! - `Cms`: the operations the importers need (keyed lookup, post CRUD,
//!   structured fields, media upload, navigation menus)
//! - `WordPressCms`: adapter over the WordPress REST API
//! - `MemoryCms`: in-process adapter used for dry runs

pub mod error;
mod http;
pub mod memory;
pub mod wordpress;

pub use error::CmsError;
pub use http::{Credentials, HttpClient};
pub use memory::MemoryCms;
pub use wordpress::WordPressCms;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

/// Meta keys identifying migrated records in the destination.
///
/// The defaults are the keys earlier imports of the same site used, so
/// records they created are recognised as already imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaKeys {
    /// Flag set to `1` on every migrated record
    pub marker: String,

    /// Holds the record's [`MigrationKey`]
    pub key: String,
}

impl Default for MetaKeys {
    fn default() -> Self {
        Self {
            marker: "reddot_import".to_string(),
            key: "reddot_url".to_string(),
        }
    }
}

/// Identifier of a destination post or attachment
pub type PostId = u64;

/// Identifier of a navigation menu
pub type MenuId = u64;

/// Identifier of a navigation menu item
pub type MenuItemId = u64;

/// Kinds of destination record the migration writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    Page,
    Post,
    Attachment,
}

impl PostType {
    /// REST collection name
    pub fn rest_base(self) -> &'static str {
        match self {
            PostType::Page => "pages",
            PostType::Post => "posts",
            PostType::Attachment => "media",
        }
    }
}

impl fmt::Display for PostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PostType::Page => "page",
            PostType::Post => "post",
            PostType::Attachment => "attachment",
        };
        f.write_str(name)
    }
}

/// Stable identity of a migrated record: the legacy relative URL
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MigrationKey(String);

impl MigrationKey {
    pub fn new(relative_url: impl Into<String>) -> Self {
        Self(relative_url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MigrationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A destination post, page or attachment
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: PostId,
    pub post_type: PostType,
    pub title: String,
    pub content: String,
    pub parent: Option<PostId>,
    /// Permalink, or the file URL for attachments
    pub link: String,
    /// Set only on records carrying the migration marker
    pub key: Option<MigrationKey>,
}

/// A record to create
#[derive(Debug, Clone)]
pub struct NewPost {
    pub post_type: PostType,
    pub title: String,
    pub content: String,
    pub author: Option<u64>,
    pub parent: Option<PostId>,
    pub date: Option<NaiveDateTime>,
    pub key: MigrationKey,
}

/// Fields to change on an existing record; `None` leaves a field alone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    /// `Some(None)` clears the parent
    pub parent: Option<Option<PostId>>,
}

impl PostUpdate {
    pub fn parent(parent: Option<PostId>) -> Self {
        Self {
            parent: Some(parent),
            ..Self::default()
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }
}

/// A local file to add to the media library
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub path: PathBuf,
    pub title: String,
    pub parent: Option<PostId>,
    pub author: Option<u64>,
    pub key: MigrationKey,
}

/// A navigation menu
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Menu {
    pub id: MenuId,
    pub name: String,
}

/// An entry in a navigation menu pointing at a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub id: MenuItemId,
    pub menu: MenuId,
    pub object_id: PostId,
    pub parent: Option<MenuItemId>,
    pub title: String,
    pub order: u32,
}

/// A menu entry to create
#[derive(Debug, Clone)]
pub struct NewMenuItem {
    pub menu: MenuId,
    pub object_id: PostId,
    pub parent: Option<MenuItemId>,
    pub title: String,
    pub order: u32,
}

/// One row of the page downloads field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DownloadRow {
    pub file: PostId,
}

/// Typed view of the repeater field listing a page's downloads
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadsField {
    pub rows: Vec<DownloadRow>,
}

impl DownloadsField {
    /// Read a stored field value. Anything that is not a list reads as empty;
    /// rows hold the file either as a bare id or as an expanded attachment.
    pub fn from_value(value: Option<&Value>) -> Self {
        let rows = match value {
            Some(Value::Array(rows)) => rows
                .iter()
                .filter_map(|row| match row.get("file")? {
                    Value::Number(n) => n.as_u64(),
                    Value::Object(attachment) => attachment
                        .get("id")
                        .or_else(|| attachment.get("ID"))
                        .and_then(Value::as_u64),
                    _ => None,
                })
                .map(|file| DownloadRow { file })
                .collect(),
            _ => Vec::new(),
        };
        Self { rows }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(&self.rows).unwrap_or(Value::Array(Vec::new()))
    }

    pub fn push(&mut self, file: PostId) {
        self.rows.push(DownloadRow { file });
    }

    /// Drop every row referencing `file`
    pub fn remove(&mut self, file: PostId) {
        self.rows.retain(|row| row.file != file);
    }

    pub fn files(&self) -> Vec<PostId> {
        self.rows.iter().map(|row| row.file).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Operations the migration needs from the destination CMS.
///
/// Keyed lookups only consider records carrying the migration marker.
#[allow(async_fn_in_trait)]
pub trait Cms {
    /// The migrated record of this type with this key, if any
    async fn find_by_key(
        &self,
        post_type: PostType,
        key: &MigrationKey,
    ) -> Result<Option<Post>, CmsError>;

    /// Every migrated record of this type
    async fn list_migrated(&self, post_type: PostType) -> Result<Vec<Post>, CmsError>;

    async fn get_post(&self, post_type: PostType, id: PostId) -> Result<Option<Post>, CmsError>;

    /// Create a published record tagged with the migration marker and key
    async fn create_post(&self, post: &NewPost) -> Result<Post, CmsError>;

    async fn update_post(
        &self,
        post_type: PostType,
        id: PostId,
        update: &PostUpdate,
    ) -> Result<Post, CmsError>;

    /// Permanently delete a record
    async fn delete_post(&self, post_type: PostType, id: PostId) -> Result<(), CmsError>;

    /// Read a custom structured field
    async fn get_field(
        &self,
        post_type: PostType,
        id: PostId,
        field: &str,
    ) -> Result<Option<Value>, CmsError>;

    /// Write a custom structured field, reporting whether the CMS accepted it
    async fn save_field(
        &self,
        post_type: PostType,
        id: PostId,
        field: &str,
        value: &Value,
    ) -> Result<bool, CmsError>;

    /// Upload a local file as an attachment tagged with the migration key
    async fn upload_media(&self, upload: &MediaUpload) -> Result<Post, CmsError>;

    async fn find_menu(&self, name: &str) -> Result<Option<Menu>, CmsError>;

    async fn menu_items(&self, menu: MenuId) -> Result<Vec<MenuItem>, CmsError>;

    async fn add_menu_item(&self, item: &NewMenuItem) -> Result<MenuItem, CmsError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_downloads_field_reads_ids_and_expanded_rows() {
        let value = json!([
            {"file": 12},
            {"file": {"ID": 13, "title": "Form"}},
            {"file": {"id": 14}},
            {"file": false},
            {"other": 1}
        ]);
        let field = DownloadsField::from_value(Some(&value));
        assert_eq!(field.files(), vec![12, 13, 14]);
    }

    #[test]
    fn test_downloads_field_non_list_is_empty() {
        assert!(DownloadsField::from_value(None).is_empty());
        assert!(DownloadsField::from_value(Some(&json!(false))).is_empty());
        assert!(DownloadsField::from_value(Some(&json!(""))).is_empty());
    }

    #[test]
    fn test_downloads_field_remove_and_serialize() {
        let mut field = DownloadsField::default();
        field.push(3);
        field.push(4);
        field.push(3);
        field.remove(3);
        assert_eq!(field.to_value(), json!([{"file": 4}]));
    }

    #[test]
    fn test_post_type_names() {
        assert_eq!(PostType::Attachment.rest_base(), "media");
        assert_eq!(PostType::Page.to_string(), "page");
        assert_eq!(MigrationKey::new("853.htm").to_string(), "853.htm");
    }
}
