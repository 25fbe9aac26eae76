//! On-disk response cache for crawled pages.
//!
//! One XML file per URL, written once and never overwritten, plus a manifest
//! per crawl root recording crawl order. File names end in a digest of the
//! full URL, so URLs that flatten to the same readable stem stay apart. A repeated run replays the manifest
//! instead of crawling again. There is no eviction.

use chrono::{DateTime, Utc};
use quick_xml::{de::from_str, se::to_string};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{io, path::Path, path::PathBuf};
use tokio::fs;
use url::Url;

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Base path for storage
    pub base_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from(".site-migrate/cache"),
        }
    }
}

/// XML representation of cached pages
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename = "pages")]
pub struct Pages {
    #[serde(rename = "page")]
    pub pages: Vec<PageEntry>,
}

/// A cached response body
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PageEntry {
    /// URL the body was fetched from
    pub url: String,

    /// When the body was first cached
    pub fetched_at: DateTime<Utc>,

    /// Raw HTML
    pub html: String,
}

impl PageEntry {
    /// A freshly fetched body
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            fetched_at: Utc::now(),
            html: html.into(),
        }
    }
}

/// Crawl order for one crawl root
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename = "manifest")]
pub struct Manifest {
    /// Crawl root URL
    pub root: String,

    /// Page URLs in crawl order
    #[serde(rename = "url", default)]
    pub urls: Vec<String>,
}

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("XML serialization error: {0}")]
    SerializeError(#[from] quick_xml::errors::serialize::SeError),

    #[error("XML deserialization error: {0}")]
    DeserializeError(#[from] quick_xml::errors::serialize::DeError),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid URL for storage: {0}")]
    InvalidUrl(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

type Result<T> = std::result::Result<T, StorageError>;

/// Hex digits of the URL digest kept in file names
const DIGEST_LEN: usize = 16;

/// Longest readable part of a file name
const MAX_STEM_LEN: usize = 80;

/// Write-once response cache keyed by URL
#[derive(Debug, Clone)]
pub struct Storage {
    config: StorageConfig,
}

impl Default for Storage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage {
    /// Create a new storage with default configuration
    pub fn new() -> Self {
        Self {
            config: StorageConfig::default(),
        }
    }

    /// Create a new storage with custom configuration
    pub fn with_config(config: StorageConfig) -> Self {
        Self { config }
    }

    fn extract_domain(&self, url: &Url) -> Result<String> {
        url.host_str()
            .map(|host| host.to_string())
            .ok_or_else(|| StorageError::InvalidUrl(url.to_string()))
    }

    /// File stem for a URL: its flattened path and query, then a digest of
    /// the whole URL
    fn file_stem(url: &Url) -> String {
        let mut url = url.clone();
        url.set_fragment(None);

        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }

        let safe = path
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '/' || c == '.' { c } else { '_' })
            .collect::<String>();
        let trimmed = safe.trim_matches('/').replace('/', "_");
        let readable: String = if trimmed.is_empty() {
            "index".to_string()
        } else {
            trimmed.chars().take(MAX_STEM_LEN).collect()
        };

        let digest = format!("{:x}", Sha256::digest(url.as_str().as_bytes()));
        format!("{}-{}", readable, &digest[..DIGEST_LEN])
    }

    /// Gets the storage path for a given URL
    fn get_storage_path(&self, url: &str) -> Result<PathBuf> {
        let parsed = Url::parse(url)?;
        let domain = self.extract_domain(&parsed)?;
        Ok(self
            .config
            .base_path
            .join(domain)
            .join("pages")
            .join(format!("{}.xml", Self::file_stem(&parsed))))
    }

    fn get_manifest_path(&self, root: &str) -> Result<PathBuf> {
        let parsed = Url::parse(root)?;
        let domain = self.extract_domain(&parsed)?;
        Ok(self
            .config
            .base_path
            .join(domain)
            .join(format!("manifest_{}.xml", Self::file_stem(&parsed))))
    }

    async fn ensure_directories(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Store a body unless one is already cached for its URL.
    ///
    /// Returns the entry that is cached afterwards, which is the earlier one
    /// when the URL was already present.
    pub async fn store_once(&self, entry: PageEntry) -> Result<PageEntry> {
        let storage_path = self.get_storage_path(&entry.url)?;
        if fs::try_exists(&storage_path).await? {
            return self.load(&entry.url).await;
        }
        self.ensure_directories(&storage_path).await?;

        let pages = Pages {
            pages: vec![entry.clone()],
        };
        let xml = to_string(&pages)?;
        fs::write(
            storage_path,
            format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", xml),
        )
        .await?;
        Ok(entry)
    }

    /// Loads a cached body
    pub async fn load(&self, url: &str) -> Result<PageEntry> {
        let storage_path = self.get_storage_path(url)?;
        if !fs::try_exists(&storage_path).await? {
            return Err(StorageError::NotFound(url.to_string()));
        }
        let xml_content = fs::read_to_string(storage_path).await?;
        let pages: Pages = from_str(&xml_content)?;

        let entry = pages.pages.into_iter().next().ok_or_else(|| {
            StorageError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                "XML file contains no pages",
            ))
        })?;
        if entry.url != url {
            return Err(StorageError::NotFound(url.to_string()));
        }
        Ok(entry)
    }

    /// Record the crawl order for a root
    pub async fn store_manifest(&self, manifest: &Manifest) -> Result<()> {
        let path = self.get_manifest_path(&manifest.root)?;
        self.ensure_directories(&path).await?;
        let xml = to_string(manifest)?;
        fs::write(path, format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", xml)).await?;
        Ok(())
    }

    /// The recorded crawl order for a root, if a crawl of it completed before
    pub async fn load_manifest(&self, root: &str) -> Result<Option<Manifest>> {
        let path = self.get_manifest_path(root)?;
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }
        let xml = fs::read_to_string(path).await?;
        Ok(Some(from_str(&xml)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(dir: &tempfile::TempDir) -> Storage {
        Storage::with_config(StorageConfig {
            base_path: dir.path().to_path_buf(),
        })
    }

    fn file_name(storage: &Storage, url: &str) -> String {
        storage
            .get_storage_path(url)
            .unwrap()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn test_get_storage_path() {
        let storage = Storage::new();
        let path = storage.get_storage_path("http://legacy.test/jac/853.htm").unwrap();
        assert_eq!(path.parent().unwrap(), Path::new(".site-migrate/cache/legacy.test/pages"));

        let name = file_name(&storage, "http://legacy.test/jac/853.htm");
        assert!(name.starts_with("jac_853.htm-"));
        assert!(name.ends_with(".xml"));
        assert_eq!(name.len(), "jac_853.htm-".len() + DIGEST_LEN + ".xml".len());

        assert!(file_name(&storage, "http://legacy.test/").starts_with("index-"));
        assert!(file_name(&storage, "http://legacy.test/jac/find.asp?q=a b").starts_with("jac_find.asp_q_a_20b-"));
        assert_eq!(
            file_name(&storage, "http://legacy.test/jac/853.htm#top"),
            file_name(&storage, "http://legacy.test/jac/853.htm")
        );
    }

    #[test]
    fn test_similar_urls_get_distinct_files() {
        let storage = Storage::new();
        let names = [
            file_name(&storage, "http://legacy.test/jac/a/b.htm"),
            file_name(&storage, "http://legacy.test/jac/a_b.htm"),
            file_name(&storage, "http://legacy.test/jac/a?b"),
            file_name(&storage, "http://legacy.test/jac/a_b"),
        ];
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[tokio::test]
    async fn test_store_once_keeps_urls_with_same_stem_apart() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir);

        storage
            .store_once(PageEntry::new("http://legacy.test/jac/a_b.htm", "<p>A_B</p>"))
            .await
            .unwrap();
        let nested = storage
            .store_once(PageEntry::new("http://legacy.test/jac/a/b.htm", "<p>A/B</p>"))
            .await
            .unwrap();

        assert_eq!(nested.url, "http://legacy.test/jac/a/b.htm");
        assert_eq!(nested.html, "<p>A/B</p>");
        assert_eq!(
            storage.load("http://legacy.test/jac/a_b.htm").await.unwrap().html,
            "<p>A_B</p>"
        );
    }

    #[test]
    fn test_invalid_url() {
        let storage = Storage::new();
        match storage.get_storage_path("not-a-url") {
            Err(StorageError::UrlParse(_)) => (),
            other => panic!("Expected UrlParse error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_store_once_keeps_first_body() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir);
        let url = "http://legacy.test/jac/853.htm";

        assert!(matches!(storage.load(url).await, Err(StorageError::NotFound(_))));
        let first = storage
            .store_once(PageEntry::new(url, "<p>first &amp; only</p>"))
            .await
            .unwrap();
        let second = storage
            .store_once(PageEntry::new(url, "<p>second</p>"))
            .await
            .unwrap();

        assert_eq!(second.html, "<p>first &amp; only</p>");
        assert_eq!(second.fetched_at, first.fetched_at);
        assert_eq!(storage.load(url).await.unwrap().html, "<p>first &amp; only</p>");
    }

    #[tokio::test]
    async fn test_load_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = storage(&dir).load("http://legacy.test/jac/1.htm").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir);
        let root = "http://legacy.test/jac/";

        assert_eq!(storage.load_manifest(root).await.unwrap(), None);

        let manifest = Manifest {
            root: root.to_string(),
            urls: vec![
                "http://legacy.test/jac/".to_string(),
                "http://legacy.test/jac/10.htm".to_string(),
            ],
        };
        storage.store_manifest(&manifest).await.unwrap();
        assert_eq!(storage.load_manifest(root).await.unwrap(), Some(manifest));
    }
}
