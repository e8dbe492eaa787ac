//! Sitemap-tree discovery
//!
//! Walks the sitemap graph breadth-first starting from the site's sitemap
//! index document.
//! Index documents enqueue their child sitemaps; urlset documents yield leaf
//! URLs, retained when their path contains a configured category segment.
//! The filter is deliberately loose: some listing URLs carry no trailing id
//! and are only identifiable by the ad code embedded in the page, so leaves
//! are not required to look listing-shaped here. Sitemap fetches bypass the
//! robots gate per crawler convention; listing budget and cycle protection
//! bound the walk.

use crate::config::ScrapeConfig;
use crate::discover::DiscoveredSet;
use crate::fetch::PageFetcher;
use quick_xml::events::Event as XmlEvent;
use quick_xml::Reader;
use std::collections::{HashSet, VecDeque};
use url::Url;

/// How a sitemap document presents itself in its opening markup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SitemapKind {
    Index,
    UrlSet,
    Other,
}

/// Classifies a document by its first few hundred characters. Cheap guard
/// against HTML challenge pages served in place of XML.
fn sitemap_kind(content: &str) -> SitemapKind {
    let head: String = content.chars().take(300).collect::<String>().to_lowercase();
    if head.contains("<sitemapindex") {
        SitemapKind::Index
    } else if head.contains("<urlset") {
        SitemapKind::UrlSet
    } else {
        SitemapKind::Other
    }
}

/// Collects every `<loc>` value, resolved against the document URL
fn parse_loc_urls(xml: &str, document_url: &str) -> Vec<String> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut in_loc = false;
    let mut locs: Vec<String> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(XmlEvent::Start(e)) => {
                if e.name().as_ref().ends_with(b"loc") {
                    in_loc = true;
                }
            }
            Ok(XmlEvent::End(e)) => {
                if e.name().as_ref().ends_with(b"loc") {
                    in_loc = false;
                }
            }
            Ok(XmlEvent::Text(t)) => {
                if in_loc {
                    if let Ok(text) = t.unescape() {
                        let trimmed = text.trim();
                        if !trimmed.is_empty() {
                            locs.push(trimmed.to_string());
                        }
                    }
                }
            }
            Ok(XmlEvent::Eof) => break,
            Err(err) => {
                tracing::warn!("Sitemap parse error in {}: {}", document_url, err);
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    let base = Url::parse(document_url).ok();
    locs.into_iter()
        .filter_map(|loc| {
            if let Ok(absolute) = Url::parse(&loc) {
                Some(absolute.to_string())
            } else if let Some(base) = &base {
                base.join(&loc).map(|u| u.to_string()).ok()
            } else {
                None
            }
        })
        .collect()
}

/// True when the URL's path contains any `/<category>/` segment
fn in_configured_category(url: &str, categories: &[String]) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let path = parsed.path();
    categories
        .iter()
        .any(|category| path.contains(&format!("/{}/", category.trim_matches('/'))))
}

/// Walks the sitemap tree and feeds listing URLs into `discovered`
///
/// Stops as soon as the listing budget is reached. A root document that is
/// itself a urlset (no index layer) is handled like any other leaf sitemap.
pub async fn discover_from_sitemap(
    fetcher: &mut PageFetcher,
    config: &ScrapeConfig,
    discovered: &mut DiscoveredSet,
) {
    let root = format!(
        "{}/sitemap/sitemap_index.xml",
        config.base_url.trim_end_matches('/')
    );
    let mut queue: VecDeque<String> = VecDeque::new();
    let mut visited: HashSet<String> = HashSet::new();
    queue.push_back(root);

    while let Some(sitemap_url) = queue.pop_front() {
        if discovered.len() >= config.max_listings {
            break;
        }
        if !visited.insert(sitemap_url.clone()) {
            continue;
        }

        let prefer_browser = config.sitemap_via_browser || config.browser_only;
        let Some(body) = fetcher.fetch_document(&sitemap_url, prefer_browser).await else {
            tracing::warn!("Sitemap fetch failed: {}", sitemap_url);
            continue;
        };

        match sitemap_kind(&body) {
            SitemapKind::Index => {
                let children = parse_loc_urls(&body, &sitemap_url);
                tracing::debug!("Sitemap index {} ({} children)", sitemap_url, children.len());
                for child in children {
                    if !visited.contains(&child) {
                        queue.push_back(child);
                    }
                }
            }
            SitemapKind::UrlSet => {
                let mut accepted = 0usize;
                for leaf in parse_loc_urls(&body, &sitemap_url) {
                    if discovered.len() >= config.max_listings {
                        break;
                    }
                    if in_configured_category(&leaf, &config.categories) && discovered.push(&leaf) {
                        accepted += 1;
                    }
                }
                tracing::debug!("Sitemap {} yielded {} listing URLs", sitemap_url, accepted);
            }
            SitemapKind::Other => {
                tracing::warn!("Not a sitemap document: {}", sitemap_url);
            }
        }
    }

    tracing::info!("Sitemap discovery found {} listing URLs", discovered.len());
}
