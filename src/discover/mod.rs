//! Listing URL discovery
//!
//! Two strategies share one de-duplicating accumulator: the sitemap tree
//! walk (preferred, one fetch per sitemap file) and the category-page BFS
//! fallback. Both report listing URLs in discovery order, capped at the
//! configured listing budget.

mod listing;
mod sitemap;

pub use listing::{discover_from_categories, ListingUrlMatcher};
pub use sitemap::discover_from_sitemap;

use crate::extract::parse_trailing_ad_id;
use std::collections::HashSet;

/// Order-preserving accumulator of discovered listing URLs
///
/// A URL is rejected when the exact URL was already seen, or when its
/// trailing ad id matches an already-accepted URL. The store is keyed by
/// ad id with a full-replace upsert, so a second URL spelling of the same
/// ad can never produce a second row; fetching it would only re-write the
/// first one. URLs without a trailing id de-duplicate by URL alone.
#[derive(Debug, Default)]
pub struct DiscoveredSet {
    urls: Vec<String>,
    seen_urls: HashSet<String>,
    seen_ad_ids: HashSet<i64>,
}

impl DiscoveredSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts a URL unless it duplicates an earlier one by URL or ad id
    pub fn push(&mut self, url: &str) -> bool {
        if self.seen_urls.contains(url) {
            return false;
        }
        if let Some(ad_id) = parse_trailing_ad_id(url) {
            if !self.seen_ad_ids.insert(ad_id) {
                return false;
            }
        }
        self.seen_urls.insert(url.to_string());
        self.urls.push(url.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn into_urls(self) -> Vec<String> {
        self.urls
    }
}
