//! Content extraction functionality for the crawler module

use crate::crawler::config::{CrawlerConfig, PageSelectors};
use crate::crawler::error::CrawlError;
use crate::crawler::{Download, MenuClaim, NewsStory, ScrapedPage};
use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

const DATE_FORMATS: &[&str] = &["%d %B %Y", "%d %b %Y", "%d/%m/%Y", "%Y-%m-%d", "%B %d, %Y"];

/// Selectors compiled once per page
struct Compiled {
    content: Selector,
    breadcrumbs: Selector,
    menu: Selector,
    news_archive_marker: Selector,
    news_item: Selector,
    news_title: Selector,
    news_date: Selector,
    news_body: Selector,
    link: Selector,
    title: Selector,
    heading: Selector,
}

fn parse_selector(selector: &str) -> Result<Selector, CrawlError> {
    Selector::parse(selector)
        .map_err(|e| CrawlError::HtmlParse(format!("Failed to parse selector '{}': {}", selector, e)))
}

impl Compiled {
    fn new(selectors: &PageSelectors) -> Result<Self, CrawlError> {
        Ok(Self {
            content: parse_selector(&selectors.content)?,
            breadcrumbs: parse_selector(&selectors.breadcrumbs)?,
            menu: parse_selector(&selectors.menu)?,
            news_archive_marker: parse_selector(&selectors.news_archive_marker)?,
            news_item: parse_selector(&selectors.news_item)?,
            news_title: parse_selector(&selectors.news_title)?,
            news_date: parse_selector(&selectors.news_date)?,
            news_body: parse_selector(&selectors.news_body)?,
            link: parse_selector("a[href]")?,
            title: parse_selector("title")?,
            heading: parse_selector("h1")?,
        })
    }
}

/// Path of `url` relative to the crawl root, or `None` when it lies outside it.
///
/// The result is percent-decoded so it names the file in the local mirror.
pub fn relative_url(root: &Url, url: &Url) -> Option<String> {
    let mut url = url.clone();
    url.set_fragment(None);
    url.as_str()
        .strip_prefix(root.as_str())
        .map(decode_path)
}

/// Percent-decode a URL path, keeping it as is when it is not valid UTF-8
fn decode_path(path: &str) -> String {
    urlencoding::decode(path)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

/// Resolve an `href` against the page it appears on
fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("mailto:")
        || href.starts_with("javascript:")
        || href.starts_with("tel:")
    {
        return None;
    }

    let mut url = base.join(href).ok()?;
    url.set_fragment(None);
    Some(url)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = collapse_whitespace(text);
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&text, format).ok())
}

/// Extract a [`ScrapedPage`] from fetched HTML.
///
/// Returns `Ok(None)` for URLs outside the crawl root and for download links,
/// which are imported from the local mirror rather than as pages.
pub fn extract_page(
    url: &Url,
    html: &str,
    root: &Url,
    config: &CrawlerConfig,
) -> Result<Option<ScrapedPage>, CrawlError> {
    let relative = match relative_url(root, url) {
        Some(relative) => relative,
        None => {
            debug!("Skipping {} outside crawl root", url);
            return Ok(None);
        }
    };
    if config.is_download_path(&relative) {
        return Ok(None);
    }

    let selectors = Compiled::new(&config.selectors)?;
    let document = Html::parse_document(html);

    let mut page = ScrapedPage::new(url.as_str(), relative.clone());
    page.html = html.to_string();

    let content = document.select(&selectors.content).next();
    page.content = content.map(|c| c.inner_html()).unwrap_or_default();

    page.title = document
        .select(&selectors.title)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
        .or_else(|| {
            document
                .select(&selectors.heading)
                .next()
                .map(element_text)
                .filter(|t| !t.is_empty())
        })
        .unwrap_or_else(|| relative.clone());

    for link in document.select(&selectors.link) {
        if let Some(target) = link.value().attr("href").and_then(|h| resolve_href(url, h)) {
            let target = target.to_string();
            if !page.links.contains(&target) {
                page.links.push(target);
            }
        }
    }

    if let Some(content) = content {
        page.downloads = extract_downloads(content, url, root, config, &selectors.link);
    }

    page.breadcrumbs = document
        .select(&selectors.breadcrumbs)
        .filter_map(|a| a.value().attr("href").and_then(|h| resolve_href(url, h)))
        .map(|u| u.to_string())
        .collect();

    page.menu_claims = extract_menu_claims(&document, url, &selectors);

    page.is_front_page = config.front_page_paths.contains(&relative);
    page.is_news_archive = !page.is_front_page
        && (config.news_archive_paths.contains(&relative)
            || document.select(&selectors.news_archive_marker).next().is_some());
    page.should_import = content.is_some() && !config.excluded_paths.contains(&relative);

    if page.is_front_page || page.is_news_archive {
        page.news = extract_news(&document, url, root, config, &selectors);
    }

    debug!(
        "Extracted {} ({} links, {} downloads, {} stories)",
        relative,
        page.links.len(),
        page.downloads.len(),
        page.news.len()
    );
    Ok(Some(page))
}

fn extract_downloads(
    content: ElementRef<'_>,
    base: &Url,
    root: &Url,
    config: &CrawlerConfig,
    link: &Selector,
) -> Vec<Download> {
    let mut downloads: Vec<Download> = Vec::new();

    for anchor in content.select(link) {
        let Some(target) = anchor.value().attr("href").and_then(|h| resolve_href(base, h)) else {
            continue;
        };
        let Some(relative) = relative_url(root, &target) else {
            continue;
        };
        if !config.is_download_path(&relative)
            || downloads.iter().any(|d| d.relative_url == relative)
        {
            continue;
        }

        let mut title = element_text(anchor);
        if title.is_empty() {
            title = relative.rsplit('/').next().unwrap_or(&relative).to_string();
        }
        downloads.push(Download {
            relative_url: relative,
            title,
        });
    }

    downloads
}

/// Find `(child, parent)` pairs from links nested inside another menu item
fn extract_menu_claims(document: &Html, base: &Url, selectors: &Compiled) -> Vec<MenuClaim> {
    let mut claims: Vec<MenuClaim> = Vec::new();

    for menu in document.select(&selectors.menu) {
        for anchor in menu.select(&selectors.link) {
            let Some(child) = anchor.value().attr("href").and_then(|h| resolve_href(base, h)) else {
                continue;
            };

            let mut items = anchor
                .ancestors()
                .filter_map(ElementRef::wrap)
                .filter(|e| e.value().name() == "li");
            let (Some(_own), Some(enclosing)) = (items.next(), items.next()) else {
                continue;
            };

            let parent = enclosing
                .select(&selectors.link)
                .next()
                .and_then(|a| a.value().attr("href"))
                .and_then(|h| resolve_href(base, h));
            if let Some(parent) = parent {
                if parent != child {
                    let claim = MenuClaim {
                        child: child.to_string(),
                        parent: parent.to_string(),
                    };
                    if !claims.contains(&claim) {
                        claims.push(claim);
                    }
                }
            }
        }
    }

    claims
}

fn extract_news(
    document: &Html,
    base: &Url,
    root: &Url,
    config: &CrawlerConfig,
    selectors: &Compiled,
) -> Vec<NewsStory> {
    let mut stories = Vec::new();

    for item in document.select(&selectors.news_item) {
        let Some(heading) = item.select(&selectors.news_title).next() else {
            continue;
        };
        let title = element_text(heading);
        if title.is_empty() {
            continue;
        }

        let date = item
            .select(&selectors.news_date)
            .next()
            .and_then(|d| parse_date(&d.text().collect::<String>()));

        let bodies: Vec<String> = item
            .select(&selectors.news_body)
            .map(|b| b.inner_html().trim().to_string())
            .collect();
        let content = if bodies.is_empty() {
            item.inner_html().trim().to_string()
        } else {
            bodies.join("\n")
        };

        let relative_url = heading
            .select(&selectors.link)
            .next()
            .or_else(|| item.select(&selectors.link).next())
            .and_then(|a| a.value().attr("href"))
            .and_then(|h| resolve_href(base, h))
            .and_then(|u| relative_url(root, &u))
            .filter(|r| !r.is_empty() && !config.is_download_path(r));

        stories.push(NewsStory {
            title,
            date,
            content,
            relative_url,
        });
    }

    stories
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = "http://legacy.test/jac/";

    fn config() -> CrawlerConfig {
        CrawlerConfig::builder()
            .root_url(ROOT)
            .news_archive_paths(vec!["news.htm".to_string()])
            .excluded_paths(vec!["old.htm".to_string()])
            .build()
    }

    fn extract(relative: &str, html: &str) -> Option<ScrapedPage> {
        let root = Url::parse(ROOT).unwrap();
        let url = root.join(relative).unwrap();
        extract_page(&url, html, &root, &config()).unwrap()
    }

    const SECTION_PAGE: &str = r##"
        <html><head><title> Human
            Resources </title></head>
        <body>
          <ul id="navigation">
            <li><a href="10.htm">About</a>
              <ul>
                <li><a href="853.htm">People Finder</a></li>
                <li><a href="854.htm#top">Contacts</a></li>
              </ul>
            </li>
            <li><a href="news.htm">News</a></li>
          </ul>
          <div class="breadcrumb"><a href="index.htm">Home</a> &gt; <a href="10.htm">About</a></div>
          <div id="content">
            <p>Policies:</p>
            <a href="docs/leave.pdf"> Leave  policy </a>
            <a href="/jac/docs/leave.pdf">Leave policy again</a>
            <a href="docs/Form.DOC"></a>
            <a href="mailto:hr@legacy.test">Email</a>
            <a href="http://elsewhere.test/file.pdf">External</a>
          </div>
        </body></html>
    "##;

    #[test]
    fn test_relative_url() {
        let root = Url::parse(ROOT).unwrap();
        let inside = Url::parse("http://legacy.test/jac/docs/a.pdf#page=2").unwrap();
        let outside = Url::parse("http://legacy.test/other/a.htm").unwrap();

        assert_eq!(relative_url(&root, &inside).as_deref(), Some("docs/a.pdf"));
        assert_eq!(relative_url(&root, &root).as_deref(), Some(""));
        assert_eq!(relative_url(&root, &outside), None);

        let spaced = root.join("docs/Leave Form.pdf").unwrap();
        assert_eq!(spaced.as_str(), "http://legacy.test/jac/docs/Leave%20Form.pdf");
        assert_eq!(relative_url(&root, &spaced).as_deref(), Some("docs/Leave Form.pdf"));
    }

    #[test]
    fn test_decode_path() {
        assert_eq!(decode_path("docs/Annual%20Report%202015.pdf"), "docs/Annual Report 2015.pdf");
        assert_eq!(decode_path("plain.htm"), "plain.htm");
        assert_eq!(decode_path("bad%FF.htm"), "bad%FF.htm");
    }

    #[test]
    fn test_download_with_space_in_name() {
        let html = r#"<html><body><div id="content">
            <a href="docs/Leave Form.pdf">Leave form</a>
            <a href="docs/Leave%20Form.pdf">Same form, encoded</a>
        </div></body></html>"#;
        let page = extract("12.htm", html).unwrap();
        assert_eq!(
            page.downloads,
            vec![Download {
                relative_url: "docs/Leave Form.pdf".to_string(),
                title: "Leave form".to_string(),
            }]
        );
    }

    #[test]
    fn test_extracts_title_and_content() {
        let page = extract("12.htm", SECTION_PAGE).unwrap();
        assert_eq!(page.title, "Human Resources");
        assert_eq!(page.relative_url, "12.htm");
        assert!(page.content.contains("Policies:"));
        assert!(page.should_import);
        assert!(!page.is_front_page);
        assert!(!page.is_news_archive);
    }

    #[test]
    fn test_extracts_unique_downloads_inside_root() {
        let page = extract("12.htm", SECTION_PAGE).unwrap();
        assert_eq!(
            page.downloads,
            vec![
                Download {
                    relative_url: "docs/leave.pdf".to_string(),
                    title: "Leave policy".to_string(),
                },
                Download {
                    relative_url: "docs/Form.DOC".to_string(),
                    title: "Form.DOC".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_extracts_breadcrumbs_and_menu_claims() {
        let page = extract("12.htm", SECTION_PAGE).unwrap();
        assert_eq!(
            page.breadcrumbs,
            vec![
                "http://legacy.test/jac/index.htm".to_string(),
                "http://legacy.test/jac/10.htm".to_string(),
            ]
        );
        assert_eq!(
            page.menu_claims,
            vec![
                MenuClaim {
                    child: "http://legacy.test/jac/853.htm".to_string(),
                    parent: "http://legacy.test/jac/10.htm".to_string(),
                },
                MenuClaim {
                    child: "http://legacy.test/jac/854.htm".to_string(),
                    parent: "http://legacy.test/jac/10.htm".to_string(),
                },
            ]
        );
        assert!(!page.links.iter().any(|l| l.starts_with("mailto:")));
    }

    #[test]
    fn test_classification() {
        let front = extract("index.htm", "<html><body><div id='content'></div></body></html>").unwrap();
        assert!(front.is_front_page);
        assert!(!front.is_importable());

        let archive = extract("news.htm", "<html><body><div id='content'></div></body></html>").unwrap();
        assert!(archive.is_news_archive);

        let marked = extract(
            "99.htm",
            "<html><body><div id='news-archive'></div><div id='content'></div></body></html>",
        )
        .unwrap();
        assert!(marked.is_news_archive);

        let excluded = extract("old.htm", "<html><body><div id='content'></div></body></html>").unwrap();
        assert!(!excluded.should_import);

        let no_content = extract("13.htm", "<html><body><p>bare</p></body></html>").unwrap();
        assert!(!no_content.should_import);
    }

    #[test]
    fn test_download_urls_and_external_urls_are_not_pages() {
        assert!(extract("docs/leave.pdf", "%PDF").is_none());

        let root = Url::parse(ROOT).unwrap();
        let url = Url::parse("http://elsewhere.test/a.htm").unwrap();
        assert!(extract_page(&url, "<html></html>", &root, &config()).unwrap().is_none());
    }

    #[test]
    fn test_extracts_news_stories() {
        let html = r#"
            <html><body><div id="content">
              <div class="news-item">
                <h3><a href="news/101.htm">New office opens</a></h3>
                <span class="date">12 March 2015</span>
                <div class="summary"><p>The Leeds office is open.</p></div>
              </div>
              <div class="news-item">
                <h3>Staff survey</h3>
                <span class="date">soon</span>
                <p>Please respond.</p>
              </div>
              <div class="news-item"><p>No headline</p></div>
            </div></body></html>
        "#;
        let page = extract("news.htm", html).unwrap();

        assert_eq!(page.news.len(), 2);
        assert_eq!(page.news[0].title, "New office opens");
        assert_eq!(page.news[0].date, NaiveDate::from_ymd_opt(2015, 3, 12));
        assert_eq!(page.news[0].content, "<p>The Leeds office is open.</p>");
        assert_eq!(page.news[0].relative_url.as_deref(), Some("news/101.htm"));

        assert_eq!(page.news[1].title, "Staff survey");
        assert_eq!(page.news[1].date, None);
        assert!(page.news[1].content.contains("Please respond."));
        assert_eq!(page.news[1].relative_url, None);
    }

    #[test]
    fn test_invalid_selector_is_an_error() {
        let mut config = config();
        config.selectors.content = "[[".to_string();
        let root = Url::parse(ROOT).unwrap();
        let url = root.join("12.htm").unwrap();
        assert!(matches!(
            extract_page(&url, "<html></html>", &root, &config),
            Err(CrawlError::HtmlParse(_))
        ));
    }
}
