//! Category-page discovery fallback
//!
//! When the sitemap route yields nothing, each configured category landing
//! page is crawled breadth-first: anchors that look like listing detail
//! URLs are collected, and anchors that look like pagination are enqueued
//! as further crawl pages. The crawl never leaves the site host, respects
//! the robots gate for every page it visits, and is bounded per category by
//! the page budget.

use crate::config::ScrapeConfig;
use crate::discover::DiscoveredSet;
use crate::fetch::PageFetcher;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::{HashSet, VecDeque};
use url::Url;

/// Markers that identify a pagination link
const PAGINATION_MARKERS: &[&str] = &["page", "oldal", "lap"];

/// Recognizes listing-detail URLs for a configured category set
///
/// Two path shapes occur in the wild: a trailing `-<digits>` slug segment
/// and a bare `/<digits>` path segment, both rooted under a category path.
pub struct ListingUrlMatcher {
    patterns: Vec<Regex>,
}

impl ListingUrlMatcher {
    pub fn new(categories: &[String]) -> Self {
        let mut patterns = Vec::with_capacity(categories.len() * 2);
        for category in categories {
            let cat = regex::escape(category.trim_matches('/'));
            let slug = format!(r"/{}/.+-(\d+)(?:/|$|\.html$)", cat);
            let segment = format!(r"/{}/.+/(\d+)(?:/|$)", cat);
            for pattern in [slug, segment] {
                if let Ok(re) = Regex::new(&pattern) {
                    patterns.push(re);
                }
            }
        }
        Self { patterns }
    }

    pub fn is_listing_url(&self, url: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(url))
    }
}

fn is_pagination_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    PAGINATION_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn same_host(url: &Url, base_host: &str) -> bool {
    url.host_str()
        .map(|host| host.trim_start_matches("www.") == base_host)
        .unwrap_or(false)
}

/// Crawls each category's listing pages and feeds detail URLs into
/// `discovered`
pub async fn discover_from_categories(
    fetcher: &mut PageFetcher,
    config: &ScrapeConfig,
    matcher: &ListingUrlMatcher,
    discovered: &mut DiscoveredSet,
) {
    let base_host = match Url::parse(&config.base_url) {
        Ok(base) => match base.host_str() {
            Some(host) => host.trim_start_matches("www.").to_string(),
            None => return,
        },
        Err(err) => {
            tracing::error!("Invalid base URL {}: {}", config.base_url, err);
            return;
        }
    };
    let anchor_sel = match Selector::parse("a[href]") {
        Ok(sel) => sel,
        Err(_) => return,
    };

    for category in &config.categories {
        if discovered.len() >= config.max_listings {
            break;
        }

        let mut queue: VecDeque<String> = VecDeque::new();
        let mut visited: HashSet<String> = HashSet::new();
        queue.push_back(config.category_url(category));

        while let Some(page_url) = queue.pop_front() {
            if visited.len() >= config.max_pages || discovered.len() >= config.max_listings {
                break;
            }
            if !visited.insert(page_url.clone()) {
                continue;
            }

            let Some(body) = fetcher.fetch_html(&page_url).await else {
                tracing::warn!("Listing page fetch failed: {}", page_url);
                continue;
            };
            let Ok(page) = Url::parse(&page_url) else {
                continue;
            };

            let document = Html::parse_document(&body);
            for anchor in document.select(&anchor_sel) {
                let Some(href) = anchor.value().attr("href") else {
                    continue;
                };
                let Ok(resolved) = page.join(href.trim()) else {
                    continue;
                };
                if !same_host(&resolved, &base_host) {
                    continue;
                }
                let mut resolved = resolved;
                resolved.set_fragment(None);
                let resolved = resolved.to_string();

                if matcher.is_listing_url(&resolved) {
                    if discovered.push(&resolved) && discovered.len() >= config.max_listings {
                        break;
                    }
                } else if is_pagination_url(&resolved)
                    && !visited.contains(&resolved)
                    && fetcher.robots.allowed(&resolved)
                {
                    queue.push_back(resolved);
                }
            }
        }

        tracing::info!(
            "Category {}: {} pages crawled, {} listing URLs so far",
            category,
            visited.len(),
            discovered.len()
        );
    }
}
