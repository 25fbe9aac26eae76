//! WordPress REST API adapter.
//!
//! Requires the two migration meta keys to be registered with
//! `show_in_rest`, and the downloads field to be an ACF field exposed in REST.
//! The REST API cannot filter by meta, so migrated records of each type are
//! listed once and indexed by key in memory; the index is kept current by
//! this adapter's own writes.

use crate::cms::error::CmsError;
use crate::cms::http::{Credentials, HttpClient};
use crate::cms::{
    Cms, MediaUpload, MetaKeys, Menu, MenuId, MenuItem, MigrationKey,
    NewMenuItem, NewPost, Post, PostId, PostType, PostUpdate,
};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

const PER_PAGE: usize = 100;

#[derive(Debug, Default, Deserialize)]
struct Rendered {
    #[serde(default)]
    raw: Option<String>,
    #[serde(default)]
    rendered: String,
}

impl Rendered {
    fn text(self) -> String {
        self.raw.unwrap_or(self.rendered)
    }
}

/// A post, page or attachment as returned with `context=edit`
#[derive(Debug, Deserialize)]
struct WpPost {
    id: PostId,
    #[serde(default)]
    title: Rendered,
    #[serde(default)]
    content: Rendered,
    #[serde(default)]
    parent: PostId,
    #[serde(default)]
    link: String,
    #[serde(default)]
    source_url: Option<String>,
    #[serde(default)]
    meta: Value,
    #[serde(default)]
    acf: Value,
}

impl WpPost {
    fn migration_key(&self, keys: &MetaKeys) -> Option<MigrationKey> {
        let marker = self.meta.get(&keys.marker)?;
        let marked = match marker {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_i64() == Some(1),
            Value::String(s) => s == "1",
            _ => false,
        };
        if !marked {
            return None;
        }
        self.meta
            .get(&keys.key)
            .and_then(Value::as_str)
            .map(MigrationKey::new)
    }

    fn into_post(self, post_type: PostType, keys: &MetaKeys) -> Post {
        let key = self.migration_key(keys);
        let link = match post_type {
            PostType::Attachment => self.source_url.unwrap_or(self.link),
            _ => self.link,
        };
        Post {
            id: self.id,
            post_type,
            title: self.title.text(),
            content: self.content.text(),
            parent: (self.parent != 0).then_some(self.parent),
            link,
            key,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WpMenuItem {
    id: u64,
    #[serde(default)]
    title: Rendered,
    #[serde(default)]
    object_id: PostId,
    #[serde(default)]
    parent: u64,
    #[serde(default)]
    menu_order: u32,
    #[serde(default)]
    menus: MenuId,
}

impl From<WpMenuItem> for MenuItem {
    fn from(item: WpMenuItem) -> Self {
        MenuItem {
            id: item.id,
            menu: item.menus,
            object_id: item.object_id,
            parent: (item.parent != 0).then_some(item.parent),
            title: item.title.text(),
            order: item.menu_order,
        }
    }
}

type KeyIndex = HashMap<MigrationKey, Post>;

/// Whether `page` ends a listing. WordPress rejects requests past the last
/// page, so the reported page count wins over the batch size.
fn is_last_page(page: u32, total_pages: Option<u32>, batch_len: usize) -> bool {
    match total_pages {
        Some(total) => page >= total,
        None => batch_len < PER_PAGE,
    }
}

/// [`Cms`] implementation over the WordPress REST API
pub struct WordPressCms {
    http: HttpClient,
    meta_keys: MetaKeys,
    index: Mutex<HashMap<PostType, KeyIndex>>,
}

impl WordPressCms {
    /// Connect to the site at `base_url` with an application password
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, CmsError> {
        let credentials = Credentials {
            username: username.into(),
            password: password.into(),
        };
        Ok(Self::with_client(HttpClient::new(base_url, Some(credentials))?))
    }

    pub fn with_client(http: HttpClient) -> Self {
        Self {
            http,
            meta_keys: MetaKeys::default(),
            index: Mutex::new(HashMap::new()),
        }
    }

    /// Identify migrated records by other meta keys
    pub fn with_meta_keys(mut self, meta_keys: MetaKeys) -> Self {
        self.meta_keys = meta_keys;
        self
    }

    fn lock_index(&self) -> std::sync::MutexGuard<'_, HashMap<PostType, KeyIndex>> {
        self.index.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn remember(&self, post: &Post) {
        if let Some(key) = &post.key {
            if let Some(index) = self.lock_index().get_mut(&post.post_type) {
                index.insert(key.clone(), post.clone());
            }
        }
    }

    fn forget(&self, post_type: PostType, id: PostId) {
        if let Some(index) = self.lock_index().get_mut(&post_type) {
            index.retain(|_, post| post.id != id);
        }
    }

    async fn fetch_all(&self, post_type: PostType) -> Result<Vec<Post>, CmsError> {
        let mut posts = Vec::new();
        let mut page = 1;
        loop {
            let mut query = vec![
                ("context", "edit".to_string()),
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ];
            if post_type != PostType::Attachment {
                query.push(("status", "any".to_string()));
            }
            let (batch, total_pages): (Vec<WpPost>, _) =
                self.http.get_paged(post_type.rest_base(), &query).await?;
            let done = is_last_page(page, total_pages, batch.len());
            posts.extend(batch.into_iter().map(|p| p.into_post(post_type, &self.meta_keys)));
            if done {
                break;
            }
            page += 1;
        }
        Ok(posts)
    }

    /// Load the key index for a type on first use
    async fn ensure_index(&self, post_type: PostType) -> Result<(), CmsError> {
        if self.lock_index().contains_key(&post_type) {
            return Ok(());
        }

        let migrated: KeyIndex = self
            .fetch_all(post_type)
            .await?
            .into_iter()
            .filter_map(|post| post.key.clone().map(|key| (key, post)))
            .collect();
        info!("Indexed {} migrated {} records", migrated.len(), post_type);
        self.lock_index().insert(post_type, migrated);
        Ok(())
    }

    fn item_path(post_type: PostType, id: PostId) -> String {
        format!("{}/{}", post_type.rest_base(), id)
    }

    fn migration_meta(&self, key: &MigrationKey) -> Value {
        let mut meta = Map::new();
        meta.insert(self.meta_keys.marker.clone(), json!(1));
        meta.insert(self.meta_keys.key.clone(), json!(key.as_str()));
        Value::Object(meta)
    }
}

impl Cms for WordPressCms {
    async fn find_by_key(
        &self,
        post_type: PostType,
        key: &MigrationKey,
    ) -> Result<Option<Post>, CmsError> {
        self.ensure_index(post_type).await?;
        Ok(self
            .lock_index()
            .get(&post_type)
            .and_then(|index| index.get(key).cloned()))
    }

    async fn list_migrated(&self, post_type: PostType) -> Result<Vec<Post>, CmsError> {
        self.ensure_index(post_type).await?;
        let mut posts: Vec<Post> = self
            .lock_index()
            .get(&post_type)
            .map(|index| index.values().cloned().collect())
            .unwrap_or_default();
        posts.sort_by_key(|post| post.id);
        Ok(posts)
    }

    async fn get_post(&self, post_type: PostType, id: PostId) -> Result<Option<Post>, CmsError> {
        let result: Result<WpPost, CmsError> = self
            .http
            .get(&Self::item_path(post_type, id), &[("context", "edit".to_string())])
            .await;
        match result {
            Ok(post) => Ok(Some(post.into_post(post_type, &self.meta_keys))),
            Err(CmsError::Api { status_code: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self, post), fields(key = %post.key))]
    async fn create_post(&self, post: &NewPost) -> Result<Post, CmsError> {
        let mut body = Map::new();
        body.insert("title".into(), json!(post.title));
        body.insert("content".into(), json!(post.content));
        body.insert("status".into(), json!("publish"));
        body.insert("meta".into(), self.migration_meta(&post.key));
        if let Some(author) = post.author {
            body.insert("author".into(), json!(author));
        }
        if let Some(parent) = post.parent {
            body.insert("parent".into(), json!(parent));
        }
        if let Some(date) = post.date {
            body.insert("date".into(), json!(date.format("%Y-%m-%dT%H:%M:%S").to_string()));
        }

        let created: WpPost = self.http.post(post.post_type.rest_base(), &body).await?;
        let created = created.into_post(post.post_type, &self.meta_keys);
        debug!("Created {} {}", post.post_type, created.id);
        self.remember(&created);
        Ok(created)
    }

    async fn update_post(
        &self,
        post_type: PostType,
        id: PostId,
        update: &PostUpdate,
    ) -> Result<Post, CmsError> {
        let mut body = Map::new();
        if let Some(title) = &update.title {
            body.insert("title".into(), json!(title));
        }
        if let Some(content) = &update.content {
            body.insert("content".into(), json!(content));
        }
        if let Some(parent) = update.parent {
            body.insert("parent".into(), json!(parent.unwrap_or(0)));
        }

        let updated: WpPost = self.http.post(&Self::item_path(post_type, id), &body).await?;
        let updated = updated.into_post(post_type, &self.meta_keys);
        self.remember(&updated);
        Ok(updated)
    }

    async fn delete_post(&self, post_type: PostType, id: PostId) -> Result<(), CmsError> {
        let _: Value = self
            .http
            .delete(&Self::item_path(post_type, id), &[("force", "true".to_string())])
            .await?;
        debug!("Deleted {} {}", post_type, id);
        self.forget(post_type, id);
        Ok(())
    }

    async fn get_field(
        &self,
        post_type: PostType,
        id: PostId,
        field: &str,
    ) -> Result<Option<Value>, CmsError> {
        let post: WpPost = self
            .http
            .get(&Self::item_path(post_type, id), &[("context", "edit".to_string())])
            .await?;
        Ok(post.acf.get(field).cloned())
    }

    async fn save_field(
        &self,
        post_type: PostType,
        id: PostId,
        field: &str,
        value: &Value,
    ) -> Result<bool, CmsError> {
        let body = json!({ "acf": { field: value } });
        let post: WpPost = self.http.post(&Self::item_path(post_type, id), &body).await?;
        Ok(post.acf.get(field).is_some())
    }

    #[instrument(skip(self, upload), fields(key = %upload.key))]
    async fn upload_media(&self, upload: &MediaUpload) -> Result<Post, CmsError> {
        let bytes = tokio::fs::read(&upload.path)
            .await
            .map_err(|source| CmsError::File {
                path: upload.path.display().to_string(),
                source,
            })?;
        let file_name = upload
            .path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| CmsError::Other(format!("No file name in {}", upload.path.display())))?;
        let content_type = mime_guess::from_path(&upload.path).first_or_octet_stream();

        let created: WpPost = self
            .http
            .post_file(
                PostType::Attachment.rest_base(),
                bytes,
                &file_name,
                content_type.essence_str(),
            )
            .await?;

        let mut body = Map::new();
        body.insert("title".into(), json!(upload.title));
        body.insert("meta".into(), self.migration_meta(&upload.key));
        if let Some(parent) = upload.parent {
            body.insert("post".into(), json!(parent));
        }
        if let Some(author) = upload.author {
            body.insert("author".into(), json!(author));
        }
        let attachment: WpPost = self
            .http
            .post(&Self::item_path(PostType::Attachment, created.id), &body)
            .await?;
        let attachment = attachment.into_post(PostType::Attachment, &self.meta_keys);
        debug!("Uploaded {} as attachment {}", file_name, attachment.id);
        self.remember(&attachment);
        Ok(attachment)
    }

    async fn find_menu(&self, name: &str) -> Result<Option<Menu>, CmsError> {
        let menus: Vec<Menu> = self
            .http
            .get("menus", &[("per_page", PER_PAGE.to_string())])
            .await?;
        Ok(menus.into_iter().find(|menu| menu.name == name))
    }

    async fn menu_items(&self, menu: MenuId) -> Result<Vec<MenuItem>, CmsError> {
        let mut items = Vec::new();
        let mut page = 1;
        loop {
            let (batch, total_pages): (Vec<WpMenuItem>, _) = self
                .http
                .get_paged(
                    "menu-items",
                    &[
                        ("menus", menu.to_string()),
                        ("per_page", PER_PAGE.to_string()),
                        ("page", page.to_string()),
                        ("context", "edit".to_string()),
                    ],
                )
                .await?;
            let done = is_last_page(page, total_pages, batch.len());
            items.extend(batch.into_iter().map(MenuItem::from));
            if done {
                break;
            }
            page += 1;
        }
        Ok(items)
    }

    async fn add_menu_item(&self, item: &NewMenuItem) -> Result<MenuItem, CmsError> {
        let body = json!({
            "title": item.title,
            "menus": item.menu,
            "object_id": item.object_id,
            "object": "page",
            "type": "post_type",
            "parent": item.parent.unwrap_or(0),
            "menu_order": item.order,
            "status": "publish",
        });
        let created: WpMenuItem = self.http.post("menu-items", &body).await?;
        Ok(created.into())
    }
}
