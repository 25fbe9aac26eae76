//! # Navigation Structure Module
//!
//! Reconstructs the legacy site's page tree from what the crawl saw on each
//! page: breadcrumb trails and nested navigation menus.
//!
//! ## Key Components
//!
//! - `NavigationStructure`: the tree, keyed by absolute page URL
//!
//! ## Parent Inference
//!
//! The tree is rooted at the front page (or the first crawled page when no
//! front page was found). For every other page, in crawl order:
//! 1. the last breadcrumb that links to a crawled page other than itself
//! 2. otherwise the first menu claim placing it under another crawled page
//! 3. otherwise the root
//!
//! An assignment that would close a cycle attaches the page to the root.

use crate::crawler::ScrapedPage;
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument};

#[derive(Debug, Clone, Default)]
struct NavNode {
    parent: Option<String>,
    children: Vec<String>,
}

/// Page tree of the legacy site. Built once, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct NavigationStructure {
    root: Option<String>,
    nodes: HashMap<String, NavNode>,
}

impl NavigationStructure {
    /// Infer the tree from a crawl-ordered page list
    #[instrument(skip(pages), fields(pages = pages.len()))]
    pub fn build(pages: &[ScrapedPage]) -> Self {
        let Some(root) = pages
            .iter()
            .find(|p| p.is_front_page)
            .or_else(|| pages.first())
            .map(|p| p.url.clone())
        else {
            return Self::default();
        };

        let known: HashSet<&str> = pages.iter().map(|p| p.url.as_str()).collect();

        // First claim wins, in crawl order
        let mut claims: HashMap<&str, &str> = HashMap::new();
        for claim in pages.iter().flat_map(|p| &p.menu_claims) {
            if claim.child != claim.parent && known.contains(claim.parent.as_str()) {
                claims.entry(claim.child.as_str()).or_insert(claim.parent.as_str());
            }
        }

        let mut parents: HashMap<&str, &str> = HashMap::new();
        for page in pages.iter().filter(|p| p.url != root) {
            if parents.contains_key(page.url.as_str()) {
                continue;
            }

            let candidate = page
                .breadcrumbs
                .iter()
                .rev()
                .map(String::as_str)
                .find(|crumb| *crumb != page.url && known.contains(crumb))
                .or_else(|| claims.get(page.url.as_str()).copied())
                .unwrap_or(root.as_str());

            let parent = if closes_cycle(&parents, page.url.as_str(), candidate) {
                debug!("{} -> {} would form a cycle, attaching to root", page.url, candidate);
                root.as_str()
            } else {
                candidate
            };
            parents.insert(page.url.as_str(), parent);
        }

        let mut nodes: HashMap<String, NavNode> = HashMap::new();
        nodes.insert(root.clone(), NavNode::default());
        for page in pages.iter().filter(|p| p.url != root) {
            let Some(parent) = parents.get(page.url.as_str()) else {
                continue;
            };
            if nodes.contains_key(page.url.as_str()) {
                continue;
            }
            nodes.insert(
                page.url.clone(),
                NavNode {
                    parent: Some(parent.to_string()),
                    children: Vec::new(),
                },
            );
        }
        for page in pages {
            if let Some(parent) = parents.get(page.url.as_str()) {
                let siblings = &mut nodes.entry(parent.to_string()).or_default().children;
                if !siblings.contains(&page.url) {
                    siblings.push(page.url.clone());
                }
            }
        }

        debug!("Navigation structure has {} nodes", nodes.len());
        Self {
            root: Some(root),
            nodes,
        }
    }

    /// URL of the root page
    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    /// URL of a page's logical parent; `None` for the root and unknown pages
    pub fn parent_of(&self, url: &str) -> Option<&str> {
        self.nodes.get(url)?.parent.as_deref()
    }

    /// Child URLs of a page, in crawl order
    pub fn children_of(&self, url: &str) -> &[String] {
        self.nodes
            .get(url)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    /// Ancestors of a page, nearest first, ending at the root
    pub fn ancestors<'a>(&'a self, url: &str) -> impl Iterator<Item = &'a str> + use<'a> {
        let mut current = self.parent_of(url);
        std::iter::from_fn(move || {
            let next = current?;
            current = self.parent_of(next);
            Some(next)
        })
    }

    pub fn contains(&self, url: &str) -> bool {
        self.nodes.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every page URL, parents before children, siblings in crawl order
    pub fn pre_order(&self) -> Vec<&str> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<&str> = self.root.as_deref().into_iter().collect();
        while let Some(url) = stack.pop() {
            order.push(url);
            stack.extend(self.children_of(url).iter().rev().map(String::as_str));
        }
        order
    }
}

/// Whether making `candidate` the parent of `child` closes a loop
fn closes_cycle(parents: &HashMap<&str, &str>, child: &str, candidate: &str) -> bool {
    let mut current = Some(candidate);
    let mut steps = 0;
    while let Some(url) = current {
        if url == child || steps > parents.len() {
            return true;
        }
        current = parents.get(url).copied();
        steps += 1;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::MenuClaim;

    fn url(path: &str) -> String {
        format!("http://legacy.test/{}", path)
    }

    fn page(path: &str) -> ScrapedPage {
        ScrapedPage::new(url(path), path)
    }

    fn front() -> ScrapedPage {
        let mut p = page("index.htm");
        p.is_front_page = true;
        p
    }

    #[test]
    fn test_breadcrumbs_define_parents() {
        let mut about = page("about.htm");
        about.breadcrumbs = vec![url("index.htm")];
        let mut team = page("team.htm");
        team.breadcrumbs = vec![url("index.htm"), url("about.htm"), url("team.htm")];

        let nav = NavigationStructure::build(&[about, front(), team]);

        assert_eq!(nav.root(), Some(url("index.htm").as_str()));
        assert_eq!(nav.parent_of(&url("team.htm")), Some(url("about.htm").as_str()));
        assert_eq!(nav.parent_of(&url("about.htm")), Some(url("index.htm").as_str()));
        assert_eq!(nav.parent_of(&url("index.htm")), None);
        assert_eq!(nav.len(), 3);
    }

    #[test]
    fn test_menu_claim_used_without_breadcrumbs() {
        let mut home = front();
        home.menu_claims = vec![
            MenuClaim {
                child: url("forms.htm"),
                parent: url("services.htm"),
            },
            MenuClaim {
                child: url("forms.htm"),
                parent: url("about.htm"),
            },
        ];

        let nav = NavigationStructure::build(&[
            home,
            page("services.htm"),
            page("about.htm"),
            page("forms.htm"),
        ]);

        assert_eq!(nav.parent_of(&url("forms.htm")), Some(url("services.htm").as_str()));
        assert_eq!(nav.parent_of(&url("about.htm")), Some(url("index.htm").as_str()));
    }

    #[test]
    fn test_unknown_breadcrumbs_fall_back_to_root() {
        let mut orphan = page("orphan.htm");
        orphan.breadcrumbs = vec![url("gone.htm"), url("orphan.htm")];

        let nav = NavigationStructure::build(&[front(), orphan]);
        assert_eq!(nav.parent_of(&url("orphan.htm")), Some(url("index.htm").as_str()));
    }

    #[test]
    fn test_cycle_attaches_to_root() {
        let mut a = page("a.htm");
        a.breadcrumbs = vec![url("b.htm")];
        let mut b = page("b.htm");
        b.breadcrumbs = vec![url("a.htm")];

        let nav = NavigationStructure::build(&[front(), a, b]);

        assert_eq!(nav.parent_of(&url("a.htm")), Some(url("b.htm").as_str()));
        assert_eq!(nav.parent_of(&url("b.htm")), Some(url("index.htm").as_str()));
        assert_eq!(
            nav.ancestors(&url("a.htm")).collect::<Vec<_>>(),
            vec![url("b.htm"), url("index.htm")]
        );
    }

    #[test]
    fn test_pre_order_lists_every_page_once() {
        let mut a = page("a.htm");
        a.breadcrumbs = vec![url("index.htm")];
        let mut a1 = page("a1.htm");
        a1.breadcrumbs = vec![url("a.htm")];
        let b = page("b.htm");
        let mut a2 = page("a2.htm");
        a2.breadcrumbs = vec![url("a.htm")];

        let pages = vec![front(), a, a1, b, a2.clone(), a2];
        let nav = NavigationStructure::build(&pages);

        let order = nav.pre_order();
        let expected: Vec<String> = ["index.htm", "a.htm", "a1.htm", "a2.htm", "b.htm"]
            .iter()
            .map(|p| url(p))
            .collect();
        assert_eq!(order, expected);
        assert_eq!(nav.children_of(&url("a.htm")).len(), 2);
    }

    #[test]
    fn test_first_page_is_root_without_front_page() {
        let nav = NavigationStructure::build(&[page("a.htm"), page("b.htm")]);
        assert_eq!(nav.root(), Some(url("a.htm").as_str()));
        assert!(NavigationStructure::build(&[]).is_empty());
    }
}
