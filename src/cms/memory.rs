//! In-process [`Cms`] used for dry runs.
//!
//! Behaves like the REST adapter from the importers' point of view: keyed
//! lookups only see marked records, uploads read the local file, and every
//! mutating call is counted so a run's write volume can be reported.

use crate::cms::error::CmsError;
use crate::cms::{
    Cms, MediaUpload, Menu, MenuId, MenuItem, MigrationKey, NewMenuItem, NewPost, Post, PostId,
    PostType, PostUpdate,
};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
struct StoredPost {
    post: Post,
    fields: HashMap<String, Value>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    posts: BTreeMap<PostId, StoredPost>,
    menus: Vec<Menu>,
    menu_items: Vec<MenuItem>,
    unregistered_fields: HashSet<String>,
    writes: usize,
}

impl State {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn stored_mut(&mut self, post_type: PostType, id: PostId) -> Result<&mut StoredPost, CmsError> {
        self.posts
            .get_mut(&id)
            .filter(|stored| stored.post.post_type == post_type)
            .ok_or(CmsError::NotFound(post_type, id))
    }
}

/// In-memory destination store
#[derive(Debug)]
pub struct MemoryCms {
    base_url: String,
    state: Mutex<State>,
}

impl Default for MemoryCms {
    fn default() -> Self {
        Self::new("https://cms.invalid")
    }
}

impl MemoryCms {
    /// An empty store whose permalinks live under `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            state: Mutex::new(State::default()),
        }
    }

    /// Add a navigation menu
    pub fn with_menu(self, name: impl Into<String>) -> Self {
        {
            let mut state = self.lock();
            let id = state.allocate();
            state.menus.push(Menu {
                id,
                name: name.into(),
            });
        }
        self
    }

    /// Refuse values for `field`, as a site without that field registered does
    pub fn without_field(self, field: impl Into<String>) -> Self {
        self.lock().unregistered_fields.insert(field.into());
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of mutating calls made so far
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    /// Every stored record, in id order
    pub fn posts(&self) -> Vec<Post> {
        self.lock().posts.values().map(|stored| stored.post.clone()).collect()
    }

    /// Current value of a field, bypassing the trait
    pub fn field(&self, id: PostId, field: &str) -> Option<Value> {
        self.lock()
            .posts
            .get(&id)
            .and_then(|stored| stored.fields.get(field).cloned())
    }

    /// Items of every menu
    pub fn all_menu_items(&self) -> Vec<MenuItem> {
        self.lock().menu_items.clone()
    }

    fn link_for(&self, post_type: PostType, id: PostId, key: &MigrationKey) -> String {
        match post_type {
            PostType::Attachment => {
                let file_name = key.as_str().rsplit('/').next().unwrap_or(key.as_str());
                format!("{}/wp-content/uploads/{}", self.base_url, file_name)
            }
            _ => format!("{}/?p={}", self.base_url, id),
        }
    }
}

impl Cms for MemoryCms {
    async fn find_by_key(
        &self,
        post_type: PostType,
        key: &MigrationKey,
    ) -> Result<Option<Post>, CmsError> {
        Ok(self
            .lock()
            .posts
            .values()
            .map(|stored| &stored.post)
            .find(|post| post.post_type == post_type && post.key.as_ref() == Some(key))
            .cloned())
    }

    async fn list_migrated(&self, post_type: PostType) -> Result<Vec<Post>, CmsError> {
        Ok(self
            .lock()
            .posts
            .values()
            .map(|stored| &stored.post)
            .filter(|post| post.post_type == post_type && post.key.is_some())
            .cloned()
            .collect())
    }

    async fn get_post(&self, post_type: PostType, id: PostId) -> Result<Option<Post>, CmsError> {
        Ok(self
            .lock()
            .posts
            .get(&id)
            .filter(|stored| stored.post.post_type == post_type)
            .map(|stored| stored.post.clone()))
    }

    async fn create_post(&self, new: &NewPost) -> Result<Post, CmsError> {
        let mut state = self.lock();
        let id = state.allocate();
        let post = Post {
            id,
            post_type: new.post_type,
            title: new.title.clone(),
            content: new.content.clone(),
            parent: new.parent,
            link: self.link_for(new.post_type, id, &new.key),
            key: Some(new.key.clone()),
        };
        state.posts.insert(
            id,
            StoredPost {
                post: post.clone(),
                fields: HashMap::new(),
            },
        );
        state.writes += 1;
        Ok(post)
    }

    async fn update_post(
        &self,
        post_type: PostType,
        id: PostId,
        update: &PostUpdate,
    ) -> Result<Post, CmsError> {
        let mut state = self.lock();
        let stored = state.stored_mut(post_type, id)?;
        if let Some(title) = &update.title {
            stored.post.title = title.clone();
        }
        if let Some(content) = &update.content {
            stored.post.content = content.clone();
        }
        if let Some(parent) = update.parent {
            stored.post.parent = parent;
        }
        let post = stored.post.clone();
        state.writes += 1;
        Ok(post)
    }

    async fn delete_post(&self, post_type: PostType, id: PostId) -> Result<(), CmsError> {
        let mut state = self.lock();
        state.stored_mut(post_type, id)?;
        state.posts.remove(&id);
        state.writes += 1;
        Ok(())
    }

    async fn get_field(
        &self,
        post_type: PostType,
        id: PostId,
        field: &str,
    ) -> Result<Option<Value>, CmsError> {
        let mut state = self.lock();
        Ok(state.stored_mut(post_type, id)?.fields.get(field).cloned())
    }

    async fn save_field(
        &self,
        post_type: PostType,
        id: PostId,
        field: &str,
        value: &Value,
    ) -> Result<bool, CmsError> {
        let mut state = self.lock();
        let accepted = !state.unregistered_fields.contains(field);
        let stored = state.stored_mut(post_type, id)?;
        if accepted {
            stored.fields.insert(field.to_string(), value.clone());
        }
        state.writes += 1;
        Ok(accepted)
    }

    async fn upload_media(&self, upload: &MediaUpload) -> Result<Post, CmsError> {
        let metadata = tokio::fs::metadata(&upload.path)
            .await
            .map_err(|source| CmsError::File {
                path: upload.path.display().to_string(),
                source,
            })?;
        if !metadata.is_file() {
            return Err(CmsError::Other(format!(
                "{} is not a file",
                upload.path.display()
            )));
        }

        let mut state = self.lock();
        let id = state.allocate();
        let post = Post {
            id,
            post_type: PostType::Attachment,
            title: upload.title.clone(),
            content: String::new(),
            parent: upload.parent,
            link: self.link_for(PostType::Attachment, id, &upload.key),
            key: Some(upload.key.clone()),
        };
        state.posts.insert(
            id,
            StoredPost {
                post: post.clone(),
                fields: HashMap::new(),
            },
        );
        state.writes += 1;
        Ok(post)
    }

    async fn find_menu(&self, name: &str) -> Result<Option<Menu>, CmsError> {
        Ok(self.lock().menus.iter().find(|menu| menu.name == name).cloned())
    }

    async fn menu_items(&self, menu: MenuId) -> Result<Vec<MenuItem>, CmsError> {
        Ok(self
            .lock()
            .menu_items
            .iter()
            .filter(|item| item.menu == menu)
            .cloned()
            .collect())
    }

    async fn add_menu_item(&self, new: &NewMenuItem) -> Result<MenuItem, CmsError> {
        let mut state = self.lock();
        if !state.menus.iter().any(|menu| menu.id == new.menu) {
            return Err(CmsError::Other(format!("Menu {} does not exist", new.menu)));
        }
        let item = MenuItem {
            id: state.allocate(),
            menu: new.menu,
            object_id: new.object_id,
            parent: new.parent,
            title: new.title.clone(),
            order: new.order,
        };
        state.menu_items.push(item.clone());
        state.writes += 1;
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_page(key: &str) -> NewPost {
        NewPost {
            post_type: PostType::Page,
            title: key.to_string(),
            content: String::new(),
            author: Some(2),
            parent: None,
            date: None,
            key: MigrationKey::new(key),
        }
    }

    #[tokio::test]
    async fn test_keyed_lookup_is_per_type() {
        let cms = MemoryCms::default();
        let page = cms.create_post(&new_page("853.htm")).await.unwrap();

        let key = MigrationKey::new("853.htm");
        assert_eq!(
            cms.find_by_key(PostType::Page, &key).await.unwrap().map(|p| p.id),
            Some(page.id)
        );
        assert!(cms.find_by_key(PostType::Post, &key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_writes_are_counted_and_reads_are_not() {
        let cms = MemoryCms::default();
        let page = cms.create_post(&new_page("1.htm")).await.unwrap();
        cms.get_field(PostType::Page, page.id, "page_downloads").await.unwrap();
        cms.list_migrated(PostType::Page).await.unwrap();
        cms.update_post(PostType::Page, page.id, &PostUpdate::parent(Some(99)))
            .await
            .unwrap();
        assert_eq!(cms.write_count(), 2);
        assert_eq!(cms.posts()[0].parent, Some(99));
    }

    #[tokio::test]
    async fn test_type_mismatch_is_not_found() {
        let cms = MemoryCms::default();
        let page = cms.create_post(&new_page("1.htm")).await.unwrap();
        let result = cms.delete_post(PostType::Attachment, page.id).await;
        assert!(matches!(result, Err(CmsError::NotFound(PostType::Attachment, _))));
    }

    #[tokio::test]
    async fn test_menu_items_require_existing_menu() {
        let cms = MemoryCms::default().with_menu("Primary Navigation");
        let menu = cms.find_menu("Primary Navigation").await.unwrap().unwrap();

        let item = NewMenuItem {
            menu: menu.id,
            object_id: 5,
            parent: None,
            title: "About".to_string(),
            order: 1,
        };
        cms.add_menu_item(&item).await.unwrap();
        assert_eq!(cms.menu_items(menu.id).await.unwrap().len(), 1);

        let orphan = NewMenuItem { menu: menu.id + 100, ..item };
        assert!(cms.add_menu_item(&orphan).await.is_err());
    }
}
