//! The end-to-end scrape run
//!
//! Discovery first (sitemap tree, then the category-page crawl if the
//! sitemap yielded nothing), then one fetch-extract-store cycle per listing
//! URL. Per-listing failures are logged and counted but never abort the
//! run; only setup errors (storage, browser launch) propagate.

use crate::config::ScrapeConfig;
use crate::discover::{
    discover_from_categories, discover_from_sitemap, DiscoveredSet, ListingUrlMatcher,
};
use crate::extract::{extract_listing, parse_trailing_ad_id};
use crate::fetch::{manual_auth, PageFetcher};
use crate::storage::Store;

/// Tally of one pipeline run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Listing URLs produced by discovery
    pub discovered: usize,
    /// Records written to the store
    pub stored: usize,
    /// Listings skipped because they were already stored (resume mode)
    pub skipped_existing: usize,
    /// Fetches that produced no usable page
    pub fetch_failures: usize,
    /// Records the store refused to persist
    pub store_failures: usize,
    /// Extracted pages discarded for lacking any ad id
    pub discarded: usize,
}

/// Runs discovery and scraping for the given configuration
///
/// The fetcher must already carry a loaded robots gate. The browser engine,
/// if configured, is left running; the caller tears it down.
pub async fn run<S: Store>(
    config: &ScrapeConfig,
    fetcher: &mut PageFetcher,
    store: &S,
) -> crate::Result<RunReport> {
    if config.manual_auth {
        pause_for_manual_auth(config, fetcher).await?;
    }

    let urls = discover(config, fetcher).await;
    let mut report = RunReport {
        discovered: urls.len(),
        ..Default::default()
    };
    tracing::info!("Discovery complete: {} listing URLs", urls.len());

    for url in &urls {
        if config.resume {
            if let Some(ad_id) = parse_trailing_ad_id(url) {
                match store.exists(ad_id) {
                    Ok(true) => {
                        tracing::debug!("Already stored, skipping: {}", url);
                        report.skipped_existing += 1;
                        continue;
                    }
                    Ok(false) => {}
                    Err(e) => tracing::warn!("Store lookup failed for {}: {}", url, e),
                }
            }
        }

        let Some(html) = fetcher.fetch_html(url).await else {
            report.fetch_failures += 1;
            continue;
        };

        let mut record = extract_listing(&html, url, &config.base_url);
        if config.store_html {
            record.raw_html = Some(html);
        }

        if record.ad_id.is_none() {
            tracing::warn!("No ad id resolvable, discarding: {}", url);
            report.discarded += 1;
            continue;
        }

        match store.upsert(&record) {
            Ok(()) => {
                report.stored += 1;
                tracing::info!(
                    "Stored listing {} ({}/{})",
                    record.ad_id.unwrap_or_default(),
                    report.stored,
                    urls.len()
                );
            }
            Err(e) => {
                tracing::error!("Failed to store {}: {}", url, e);
                report.store_failures += 1;
            }
        }
    }

    tracing::info!(
        "Run finished: {} stored, {} skipped, {} fetch failures, {} store failures, {} discarded",
        report.stored,
        report.skipped_existing,
        report.fetch_failures,
        report.store_failures,
        report.discarded
    );
    Ok(report)
}

/// Collects listing URLs, preferring the sitemap route
async fn discover(config: &ScrapeConfig, fetcher: &mut PageFetcher) -> Vec<String> {
    let mut discovered = DiscoveredSet::new();

    if config.use_sitemap {
        discover_from_sitemap(fetcher, config, &mut discovered).await;
    }
    if discovered.is_empty() {
        tracing::info!("Falling back to category-page discovery");
        let matcher = ListingUrlMatcher::new(&config.categories);
        discover_from_categories(fetcher, config, &matcher, &mut discovered).await;
    }

    let mut urls = discovered.into_urls();
    urls.truncate(config.max_listings);
    urls
}

/// Opens a visible browser page and blocks until the operator confirms
async fn pause_for_manual_auth(
    config: &ScrapeConfig,
    fetcher: &mut PageFetcher,
) -> crate::Result<()> {
    let Some(browser) = &mut fetcher.browser else {
        tracing::warn!("Manual auth requested but no browser is configured");
        return Ok(());
    };
    let auth_url = config
        .auth_url
        .clone()
        .or_else(|| config.categories.first().map(|c| config.category_url(c)))
        .unwrap_or_else(|| config.base_url.clone());

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    manual_auth(
        browser,
        &auth_url,
        &mut input,
        config.save_storage_state.as_deref(),
    )
    .await
}
