//! Integration with spider library for web crawling

use spider::tokio;
use spider::tokio::sync::broadcast::{self, error::RecvError};
use spider::website::Website;
use tracing::{debug, info, info_span, instrument, warn};

use crate::crawler::error::CrawlError;
use crate::crawler::storage::{Manifest, PageEntry, Storage};
use crate::crawler::{CrawlCollection, CrawlerConfig};

/// Pages buffered between the crawler and the collecting task
const CHANNEL_CAPACITY: usize = 512;

/// Crawl the legacy site, or replay a previous crawl from the cache.
///
/// Every fetched body is written to the cache once; a crawl root whose
/// manifest is already cached is rebuilt from disk without any network
/// access.
#[instrument(skip(storage))]
pub async fn crawl_site(
    config: &CrawlerConfig,
    storage: &Storage,
) -> Result<CrawlCollection, CrawlError> {
    let documents = match storage.load_manifest(&config.root_url).await? {
        Some(manifest) => {
            info!(
                "Replaying {} cached pages for {}",
                manifest.urls.len(),
                config.root_url
            );
            let mut documents = Vec::with_capacity(manifest.urls.len());
            for url in manifest.urls {
                let entry = storage.load(&url).await?;
                documents.push((entry.url, entry.html));
            }
            documents
        }
        None => {
            let (documents, missed) = fetch_with_spider(config, storage).await?;
            if missed == 0 {
                storage
                    .store_manifest(&Manifest {
                        root: config.root_url.clone(),
                        urls: documents.iter().map(|(url, _)| url.clone()).collect(),
                    })
                    .await?;
            } else {
                warn!(
                    "Missed {} pages while crawling {}; not recording the crawl as complete",
                    missed, config.root_url
                );
            }
            documents
        }
    };

    let collection = CrawlCollection::from_html(config, documents)?;
    info!("Collected {} pages", collection.len());
    Ok(collection)
}

/// Receive until the sender closes. Returns the received values and how many
/// were dropped because the receiver fell behind.
async fn drain<T: Clone>(mut rx: broadcast::Receiver<T>) -> (Vec<T>, u64) {
    let mut received = Vec::new();
    let mut missed = 0;
    loop {
        match rx.recv().await {
            Ok(value) => received.push(value),
            Err(RecvError::Lagged(skipped)) => {
                warn!("Crawl receiver fell behind, {} pages dropped", skipped);
                missed += skipped;
            }
            Err(RecvError::Closed) => break,
        }
    }
    (received, missed)
}

/// Crawl with spider, caching every body. Also returns the number of pages
/// the crawl produced but that could not be received.
async fn fetch_with_spider(
    config: &CrawlerConfig,
    storage: &Storage,
) -> Result<(Vec<(String, String)>, u64), CrawlError> {
    info!("Starting crawl for {}", config.root_url);
    debug!("Crawler config: {:?}", config);

    let mut website = Website::new(&config.root_url);
    website
        .configuration
        .with_respect_robots_txt(config.respect_robots_txt)
        .with_user_agent(Some(&config.user_agent))
        .with_delay(config.rate_limit_ms)
        .with_limit(config.max_pages);

    let rx = website
        .subscribe(CHANNEL_CAPACITY)
        .ok_or_else(|| CrawlError::Other("Failed to subscribe to website".to_string()))?;
    let handle = tokio::spawn(drain(rx));

    website.crawl().await;
    info!("Crawl finished");
    website.unsubscribe();
    let (fetched, missed) = handle
        .await
        .map_err(|e| CrawlError::Other(format!("Task join error: {}", e)))?;

    let mut documents: Vec<(String, String)> = Vec::with_capacity(fetched.len());
    for page in fetched {
        let _page_span = info_span!("receive_page", url = %page.get_url());
        debug!("Received page: {}", page.get_url());
        let url = page.get_url().to_string();
        let html = page.get_html();
        if documents.iter().any(|(seen, _)| *seen == url) {
            continue;
        }
        if html.is_empty() {
            warn!("Empty response body for {}", url);
            continue;
        }
        let entry = storage.store_once(PageEntry::new(url, html)).await?;
        documents.push((entry.url, entry.html));
    }

    info!("Fetched {} pages", documents.len());
    Ok((documents, missed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_drain_keeps_receiving_after_lag() {
        let (tx, rx) = broadcast::channel(2);
        for page in 1..=5 {
            tx.send(page).unwrap();
        }
        let collector = tokio::spawn(drain(rx));
        drop(tx);

        let (received, missed) = collector.await.unwrap();
        assert_eq!(received, vec![4, 5]);
        assert_eq!(missed, 3);
    }

    #[tokio::test]
    async fn test_drain_without_lag() {
        let (tx, rx) = broadcast::channel(8);
        let collector = tokio::spawn(drain(rx));
        for page in ["index.htm", "10.htm"] {
            tx.send(page.to_string()).unwrap();
        }
        drop(tx);

        let (received, missed) = collector.await.unwrap();
        assert_eq!(received, vec!["index.htm".to_string(), "10.htm".to_string()]);
        assert_eq!(missed, 0);
    }
}
