//! Site-specific corrections applied after the main import

use crate::cms::{Cms, MigrationKey, PostType, PostUpdate};
use crate::crawler::ScrapedPage;
use crate::hierarchy::PageHierarchy;
use crate::importer::ImportError;
use crate::migration::FormFixup;
use regex::{NoExpand, Regex};
use tracing::{debug, info, instrument};

/// Parent every imported page under its resolved hierarchy parent.
///
/// Only pages whose stored parent differs are written. Returns the number of
/// pages updated.
#[instrument(skip_all)]
pub async fn link_parents<C: Cms>(
    cms: &C,
    hierarchy: &PageHierarchy<'_>,
    pages: &[ScrapedPage],
) -> Result<usize, ImportError> {
    let mut updated = 0;
    for page in pages.iter().filter(|p| p.is_importable()) {
        let Some(destination) = page.destination() else {
            continue;
        };
        let parent = hierarchy.parent_post_id(page);
        if destination.parent == parent {
            continue;
        }
        cms.update_post(PostType::Page, destination.id, &PostUpdate::parent(parent))
            .await?;
        debug!("Parented {} under {:?}", page.relative_url, parent);
        updated += 1;
    }
    info!("Linked {} pages to their parents", updated);
    Ok(updated)
}

/// Apply `fixup` to the migrated page it names.
///
/// Returns false when the page is missing or the pattern does not match.
#[instrument(skip(cms))]
pub async fn replace_form<C: Cms>(cms: &C, fixup: &FormFixup) -> Result<bool, ImportError> {
    let pattern = Regex::new(&fixup.pattern)?;
    let key = MigrationKey::new(&fixup.key);
    let Some(page) = cms.find_by_key(PostType::Page, &key).await? else {
        debug!("No migrated page {}", key);
        return Ok(false);
    };
    if !pattern.is_match(&page.content) {
        return Ok(false);
    }

    let content = pattern
        .replace_all(&page.content, NoExpand(&fixup.replacement))
        .into_owned();
    cms.update_post(PostType::Page, page.id, &PostUpdate::content(content))
        .await?;
    info!("Replaced form on {}", key);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cms::{MemoryCms, NewPost};
    use crate::importer::{ImportConfig, PageImporter};
    use crate::navigation::NavigationStructure;

    fn new_page(key: &str, content: &str) -> NewPost {
        NewPost {
            post_type: PostType::Page,
            title: key.to_string(),
            content: content.to_string(),
            author: Some(2),
            parent: None,
            date: None,
            key: MigrationKey::new(key),
        }
    }

    #[tokio::test]
    async fn test_form_is_replaced_once() {
        let cms = MemoryCms::default();
        cms.create_post(&new_page(
            "853.htm",
            "<p>Find someone</p><FORM id=\"finder\" action=\"/x\">\n<input name=\"q\">\n</form><p>End</p>",
        ))
        .await
        .unwrap();
        let fixup = FormFixup::default();

        assert!(replace_form(&cms, &fixup).await.unwrap());
        let page = cms
            .find_by_key(PostType::Page, &MigrationKey::new("853.htm"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(page.content, "<p>Find someone</p>[people_finder_form]<p>End</p>");

        assert!(!replace_form(&cms, &fixup).await.unwrap());
        assert_eq!(cms.write_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_page_is_not_an_error() {
        let cms = MemoryCms::default();
        assert!(!replace_form(&cms, &FormFixup::default()).await.unwrap());
    }

    #[tokio::test]
    async fn test_parents_written_only_on_change() {
        let cms = MemoryCms::default();
        let mut home = ScrapedPage::new("http://legacy.test/index.htm", "index.htm");
        home.is_front_page = true;
        let mut about = ScrapedPage::new("http://legacy.test/about.htm", "about.htm");
        about.breadcrumbs = vec![home.url.clone()];
        let mut team = ScrapedPage::new("http://legacy.test/team.htm", "team.htm");
        team.breadcrumbs = vec![home.url.clone(), about.url.clone()];
        let pages = vec![home, about, team];

        let config = ImportConfig::default();
        let importer = PageImporter::new(&cms, &config);
        for page in &pages {
            importer.import(page).await.unwrap();
        }
        let writes = cms.write_count();

        let nav = NavigationStructure::build(&pages);
        let hierarchy = PageHierarchy::new(&nav, &pages);
        assert_eq!(link_parents(&cms, &hierarchy, &pages).await.unwrap(), 1);
        assert_eq!(cms.write_count(), writes + 1);

        let team = cms.get_post(PostType::Page, pages[2].destination_id().unwrap()).await.unwrap().unwrap();
        assert_eq!(team.parent, pages[1].destination_id());
    }
}
