//! Browser-engine fallback fetcher
//!
//! Drives a Chromium instance over CDP for pages the plain HTTP client
//! cannot get past (anti-bot challenges). The engine is started lazily on
//! first use and reused across fetches; each fetch runs in a fresh page that
//! is closed on every exit path. A persisted cookie "storage state" lets a
//! later run resume an already-authenticated session, and a manual mode
//! opens a visible page so an operator can solve a challenge by hand.

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetTimezoneOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ACCEPT_LANGUAGE: &str = "hu-HU,hu;q=0.9,en-US;q=0.8,en;q=0.7";
const TIMEZONE_ID: &str = "Europe/Budapest";
const BROWSER_LOCALE_ARG: &str = "--lang=hu-HU";

/// Result of a browser fetch; `body` is absent on any navigation failure.
#[derive(Debug)]
pub struct BrowserResult {
    pub url: String,
    pub body: Option<String>,
}

/// One cookie of a persisted browsing session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
}

struct BrowserHandle {
    browser: Browser,
    handler_task: tokio::task::JoinHandle<()>,
    storage_loaded: bool,
}

/// Lazily started Chromium client
///
/// Owns the engine handle for the whole run; `close()` tears it down and is
/// safe to call more than once.
pub struct BrowserClient {
    timeout: Duration,
    headless: bool,
    user_agent: Option<String>,
    storage_state_path: Option<PathBuf>,
    handle: Option<BrowserHandle>,
}

impl BrowserClient {
    pub fn new(
        timeout: Duration,
        headless: bool,
        user_agent: Option<String>,
        storage_state_path: Option<PathBuf>,
    ) -> Self {
        Self {
            timeout,
            headless,
            user_agent,
            storage_state_path,
            handle: None,
        }
    }

    /// Launches the engine if it is not already running
    async fn start(&mut self) -> crate::Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }

        let mut builder = BrowserConfig::builder().arg(BROWSER_LOCALE_ARG);
        if !self.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(crate::ScrapeError::Browser)?;

        let (browser, mut handler) = Browser::launch(config).await?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        tracing::info!("Browser engine started (headless: {})", self.headless);
        self.handle = Some(BrowserHandle {
            browser,
            handler_task,
            storage_loaded: false,
        });
        Ok(())
    }

    /// Opens a new page with the site locale, timezone, and session applied
    async fn open_configured_page(&mut self) -> crate::Result<Page> {
        self.start().await?;
        let user_agent = self.user_agent.clone();
        let storage_state = self.storage_state_path.clone();
        let handle = match self.handle.as_mut() {
            Some(handle) => handle,
            None => return Err(crate::ScrapeError::Browser("engine not running".to_string())),
        };

        let page = handle.browser.new_page("about:blank").await?;

        if let Some(ua) = &user_agent {
            use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
            let params = SetUserAgentOverrideParams::builder()
                .user_agent(ua.clone())
                .accept_language(ACCEPT_LANGUAGE)
                .build()
                .map_err(crate::ScrapeError::Browser)?;
            page.set_user_agent(params).await?;
        }
        page.execute(SetTimezoneOverrideParams::new(TIMEZONE_ID))
            .await?;

        if !handle.storage_loaded {
            handle.storage_loaded = true;
            if let Some(path) = &storage_state {
                match load_storage_state(path) {
                    Ok(cookies) if !cookies.is_empty() => {
                        let count = cookies.len();
                        page.set_cookies(cookies).await?;
                        tracing::info!("Restored {} session cookies from {}", count, path.display());
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("Failed to load storage state {}: {}", path.display(), e);
                    }
                }
            }
        }

        Ok(page)
    }

    /// Renders a URL and returns the final document
    ///
    /// Navigation waits for the load to settle up to the configured timeout.
    /// The page is closed on every exit path; failures never propagate past
    /// this boundary.
    pub async fn fetch(&mut self, url: &str) -> BrowserResult {
        let page = match self.open_configured_page().await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("Browser page open failed: {} ({})", url, e);
                return BrowserResult {
                    url: url.to_string(),
                    body: None,
                };
            }
        };

        let outcome = tokio::time::timeout(self.timeout, async {
            page.goto(url).await?;
            page.wait_for_navigation().await?;
            page.content().await
        })
        .await;

        let body = match outcome {
            Ok(Ok(html)) => Some(html),
            Ok(Err(e)) => {
                tracing::warn!("Browser fetch failed: {} ({})", url, e);
                None
            }
            Err(_) => {
                tracing::warn!("Browser fetch timed out: {}", url);
                None
            }
        };

        if let Err(e) = page.close().await {
            tracing::debug!("Page close failed for {}: {}", url, e);
        }

        BrowserResult {
            url: url.to_string(),
            body,
        }
    }

    /// Opens a page at a URL and hands it to the caller (manual auth)
    ///
    /// A navigation failure is logged but the page is still returned so the
    /// operator can drive it by hand.
    pub async fn open_page(&mut self, url: &str) -> crate::Result<Page> {
        let page = self.open_configured_page().await?;
        if let Err(e) = page.goto(url).await {
            tracing::warn!("Initial navigation failed: {} ({})", url, e);
        }
        Ok(page)
    }

    /// Persists the session cookies visible to the given page
    pub async fn save_storage_state(&self, page: &Page, path: &Path) -> crate::Result<()> {
        let cookies = page.get_cookies().await?;
        let stored: Vec<StoredCookie> = cookies
            .into_iter()
            .map(|c| StoredCookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
                secure: c.secure,
                http_only: c.http_only,
            })
            .collect();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&stored)?)?;
        Ok(())
    }

    /// Shuts the engine down; safe to call multiple times
    pub async fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            let mut browser = handle.browser;
            if let Err(e) = browser.close().await {
                tracing::debug!("Browser close failed: {}", e);
            }
            let _ = browser.wait().await;
            handle.handler_task.abort();
            tracing::info!("Browser engine stopped");
        }
    }
}

/// Reads a storage-state file into cookie parameters
fn load_storage_state(path: &Path) -> crate::Result<Vec<CookieParam>> {
    let raw = std::fs::read_to_string(path)?;
    let stored: Vec<StoredCookie> = serde_json::from_str(&raw)?;
    let mut params = Vec::with_capacity(stored.len());
    for cookie in stored {
        let param = CookieParam::builder()
            .name(cookie.name)
            .value(cookie.value)
            .domain(cookie.domain)
            .path(cookie.path)
            .secure(cookie.secure)
            .http_only(cookie.http_only)
            .build()
            .map_err(crate::ScrapeError::Browser)?;
        params.push(param);
    }
    Ok(params)
}

/// Blocks on one line of operator input while a visible page is open, then
/// persists the resulting session for reuse by later runs.
///
/// The input source is injectable so the pause can be driven in tests.
pub async fn manual_auth(
    browser: &mut BrowserClient,
    url: &str,
    input: &mut dyn BufRead,
    save_path: Option<&Path>,
) -> crate::Result<()> {
    tracing::info!("Opening browser for manual auth: {}", url);
    let page = browser.open_page(url).await?;

    println!("Solve the browser challenge in the opened window, then press Enter here to continue...");
    let mut line = String::new();
    let _ = input.read_line(&mut line);

    if let Some(path) = save_path {
        browser.save_storage_state(&page, path).await?;
        tracing::info!("Saved storage state: {}", path.display());
    }
    let _ = page.close().await;
    Ok(())
}
