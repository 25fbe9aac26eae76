//! Maps the legacy navigation tree onto destination post ids.
//!
//! Only *participants* take part in the destination hierarchy: pages that
//! went through the page import (not the front page, not the news archive,
//! not excluded) and have a destination post. Everything else is skipped
//! when walking up the tree, so a page whose logical parent was never
//! imported attaches to the nearest imported ancestor instead.

use crate::cms::PostId;
use crate::crawler::ScrapedPage;
use crate::navigation::NavigationStructure;
use std::collections::HashMap;

/// A participant and its nearest participant ancestor
#[derive(Debug, Clone, Copy)]
pub struct HierarchyEntry<'a> {
    pub page: &'a ScrapedPage,
    pub parent: Option<&'a ScrapedPage>,
}

/// Read-only view resolving destination parents. Performs no writes.
#[derive(Debug)]
pub struct PageHierarchy<'a> {
    navigation: &'a NavigationStructure,
    pages: HashMap<&'a str, &'a ScrapedPage>,
}

impl<'a> PageHierarchy<'a> {
    pub fn new(navigation: &'a NavigationStructure, pages: &'a [ScrapedPage]) -> Self {
        let mut by_url = HashMap::with_capacity(pages.len());
        for page in pages {
            by_url.entry(page.url.as_str()).or_insert(page);
        }
        Self {
            navigation,
            pages: by_url,
        }
    }

    fn participant(&self, url: &str) -> Option<&'a ScrapedPage> {
        self.pages
            .get(url)
            .copied()
            .filter(|page| page.is_importable() && page.destination().is_some())
    }

    /// Nearest ancestor of `page` that is a participant
    pub fn parent_page(&self, page: &ScrapedPage) -> Option<&'a ScrapedPage> {
        self.navigation
            .ancestors(&page.url)
            .find_map(|url| self.participant(url))
    }

    /// Destination id `page` should be parented to; `None` means top level
    pub fn parent_post_id(&self, page: &ScrapedPage) -> Option<PostId> {
        self.parent_page(page).and_then(ScrapedPage::destination_id)
    }

    /// Every participant in tree pre-order, with its resolved parent
    pub fn hierarchy_map(&self) -> Vec<HierarchyEntry<'a>> {
        self.navigation
            .pre_order()
            .into_iter()
            .filter_map(|url| self.participant(url))
            .map(|page| HierarchyEntry {
                page,
                parent: self.parent_page(page),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::{Post, PostType};

    fn url(path: &str) -> String {
        format!("http://legacy.test/{}", path)
    }

    fn page(path: &str, crumbs: &[&str]) -> ScrapedPage {
        let mut p = ScrapedPage::new(url(path), path);
        p.breadcrumbs = crumbs.iter().map(|c| url(c)).collect();
        p
    }

    fn import(page: &ScrapedPage, id: PostId) {
        page.set_destination(Post {
            id,
            post_type: PostType::Page,
            title: page.title.clone(),
            content: String::new(),
            parent: None,
            link: format!("https://cms.test/?p={}", id),
            key: Some(page.key()),
        });
    }

    #[test]
    fn test_skips_unimported_parent() {
        let root = page("root.htm", &[]);
        let mut a = page("a.htm", &["root.htm"]);
        a.should_import = false;
        let b = page("b.htm", &["root.htm", "a.htm"]);
        let pages = vec![root, a, b];
        import(&pages[0], 10);
        import(&pages[2], 12);

        let nav = NavigationStructure::build(&pages);
        assert_eq!(nav.parent_of(&url("b.htm")), Some(url("a.htm").as_str()));

        let hierarchy = PageHierarchy::new(&nav, &pages);
        assert_eq!(hierarchy.parent_post_id(&pages[2]), Some(10));
        assert_eq!(hierarchy.parent_post_id(&pages[0]), None);
    }

    #[test]
    fn test_front_page_is_not_a_participant() {
        let mut home = page("index.htm", &[]);
        home.is_front_page = true;
        let about = page("about.htm", &["index.htm"]);
        let pages = vec![home, about];
        import(&pages[0], 1);
        import(&pages[1], 2);

        let nav = NavigationStructure::build(&pages);
        let hierarchy = PageHierarchy::new(&nav, &pages);
        assert_eq!(hierarchy.parent_post_id(&pages[1]), None);

        let map = hierarchy.hierarchy_map();
        assert_eq!(map.len(), 1);
        assert_eq!(map[0].page.relative_url, "about.htm");
    }

    #[test]
    fn test_hierarchy_map_is_pre_order() {
        let mut home = page("index.htm", &[]);
        home.is_front_page = true;
        let pages = vec![
            home,
            page("a.htm", &["index.htm"]),
            page("b.htm", &["index.htm"]),
            page("a1.htm", &["index.htm", "a.htm"]),
            page("draft.htm", &["index.htm", "b.htm"]),
        ];
        for (id, p) in pages.iter().enumerate().skip(1).take(3) {
            import(p, id as PostId);
        }

        let nav = NavigationStructure::build(&pages);
        let hierarchy = PageHierarchy::new(&nav, &pages);
        let map: Vec<(&str, Option<&str>)> = hierarchy
            .hierarchy_map()
            .iter()
            .map(|e| {
                (
                    e.page.relative_url.as_str(),
                    e.parent.map(|p| p.relative_url.as_str()),
                )
            })
            .collect();

        assert_eq!(
            map,
            vec![("a.htm", None), ("a1.htm", Some("a.htm")), ("b.htm", None)]
        );
    }
}
