//! Fetching layer: rate-limited HTTP, browser fallback, and the unified
//! orchestrator that composes them with the robots gate
//!
//! The fallback order is fixed: robots denial is absolute, the plain HTTP
//! client goes first because it is cheap, and the browser engine is tried
//! once only after the plain fetch demonstrably got blocked.

mod browser;
mod client;

pub use browser::{manual_auth, BrowserClient, BrowserResult, StoredCookie};
pub use client::{FetchResult, HttpClient};

use crate::robots::RobotsGate;
use std::sync::Arc;

/// Unified fetch orchestrator
///
/// Presents one `fetch_html(url) -> Option<String>` contract to discovery
/// and the pipeline driver, hiding the robots gate, rate-limited client,
/// and optional browser fallback behind a deterministic order of attempts.
pub struct PageFetcher {
    pub client: HttpClient,
    pub robots: Arc<RobotsGate>,
    pub browser: Option<BrowserClient>,
    /// Retry a blocked plain fetch once through the browser
    pub browser_fallback: bool,
    /// Route every fetch through the browser, never the plain client
    pub browser_only: bool,
}

impl PageFetcher {
    pub fn new(
        client: HttpClient,
        robots: Arc<RobotsGate>,
        browser: Option<BrowserClient>,
        browser_fallback: bool,
        browser_only: bool,
    ) -> Self {
        Self {
            client,
            robots,
            browser,
            browser_fallback,
            browser_only,
        }
    }

    /// Fetches a page body, applying the full fallback order
    ///
    /// Returns None when robots denies the URL (absolute, no network call),
    /// when no browser is configured in browser-only mode, or when every
    /// eligible attempt failed.
    pub async fn fetch_html(&mut self, url: &str) -> Option<String> {
        if !self.robots.allowed(url) {
            tracing::info!("Robots blocked: {}", url);
            return None;
        }

        if self.browser_only {
            return match &mut self.browser {
                Some(browser) => browser.fetch(url).await.body,
                None => None,
            };
        }

        let result = self.client.fetch(url, false, true).await;
        if result.skipped {
            // Robots denial never falls back to the browser.
            return None;
        }
        if result.body.is_none() && result.blocked && self.browser_fallback {
            if let Some(browser) = &mut self.browser {
                return browser.fetch(url).await.body;
            }
        }
        result.body
    }

    /// Fetches a non-HTML infrastructure document such as a sitemap
    ///
    /// Bypasses the robots gate per convention for these files. When
    /// `prefer_browser` is set, a failed plain fetch is retried through the
    /// browser regardless of the block classification.
    pub async fn fetch_document(&mut self, url: &str, prefer_browser: bool) -> Option<String> {
        let result = self.client.fetch(url, true, false).await;
        if result.body.is_none() && prefer_browser {
            if let Some(browser) = &mut self.browser {
                return browser.fetch(url).await.body;
            }
        }
        result.body
    }

    /// Tears down the browser engine if one was started
    pub async fn close(&mut self) {
        if let Some(browser) = &mut self.browser {
            browser.close().await;
        }
    }
}
