//! Navigation menu importer

use crate::cms::{Cms, MenuItemId, NewMenuItem, PostId};
use crate::hierarchy::PageHierarchy;
use crate::importer::ImportError;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// Counts of menu items touched by an import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MenuImportReport {
    pub added: usize,
    pub reused: usize,
}

/// Mirrors the page hierarchy into a navigation menu
pub struct MenuImporter<'a, C: Cms> {
    cms: &'a C,
}

impl<'a, C: Cms> MenuImporter<'a, C> {
    pub fn new(cms: &'a C) -> Self {
        Self { cms }
    }

    /// Add every hierarchy participant to the menu named `menu_name`.
    ///
    /// Pages that already have an item in the menu keep it. New items are
    /// nested under the item of the page's resolved parent and ordered by
    /// their position in the hierarchy.
    #[instrument(skip(self, hierarchy))]
    pub async fn import_hierarchy(
        &self,
        hierarchy: &PageHierarchy<'_>,
        menu_name: &str,
    ) -> Result<MenuImportReport, ImportError> {
        let menu = self
            .cms
            .find_menu(menu_name)
            .await?
            .ok_or_else(|| ImportError::MenuNotFound(menu_name.to_string()))?;

        let mut items: HashMap<PostId, MenuItemId> = HashMap::new();
        for item in self.cms.menu_items(menu.id).await? {
            items.entry(item.object_id).or_insert(item.id);
        }

        let mut report = MenuImportReport::default();
        for (position, entry) in hierarchy.hierarchy_map().into_iter().enumerate() {
            let Some(destination) = entry.page.destination() else {
                continue;
            };
            if items.contains_key(&destination.id) {
                report.reused += 1;
                continue;
            }

            let parent = entry
                .parent
                .and_then(|parent| parent.destination_id())
                .and_then(|parent_id| items.get(&parent_id).copied());
            let new = NewMenuItem {
                menu: menu.id,
                object_id: destination.id,
                parent,
                title: destination.title.clone(),
                order: position as u32 + 1,
            };
            let item = self.cms.add_menu_item(&new).await?;
            debug!("Added menu item {} for {}", item.id, entry.page.relative_url);
            items.insert(destination.id, item.id);
            report.added += 1;
        }

        info!("Menu '{}': {} added, {} reused", menu.name, report.added, report.reused);
        Ok(report)
    }
}
