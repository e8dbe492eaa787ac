//! Run configuration for the scraper
//!
//! All knobs are surfaced through the CLI in `main.rs`; this struct is the
//! resolved form the pipeline consumes.

use std::path::PathBuf;
use std::time::Duration;

/// Default browser-like user agent sent with every plain HTTP request.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/122.0.0.0 Safari/537.36";

/// Category path segments recognized on the site. Used both to seed the
/// category crawl and to filter sitemap leaf URLs.
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "szemelyauto",
    "teherauto",
    "motor",
    "lakoauto",
    "autobusz",
    "mikrobusz",
    "kamion",
    "potkocsi",
];

/// Resolved scraper configuration
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Base site URL, e.g. "https://www.hasznaltauto.hu"
    pub base_url: String,

    /// Category path segments to crawl and filter by
    pub categories: Vec<String>,

    /// Max listing pages fetched per category during the BFS crawl
    pub max_pages: usize,

    /// Global cap on detail listings scraped in one run
    pub max_listings: usize,

    /// Minimum delay between requests (seconds)
    pub delay_seconds: f64,

    /// Random jitter added on top of the delay (seconds)
    pub jitter_seconds: f64,

    /// Per-request timeout (seconds)
    pub timeout_seconds: f64,

    /// SQLite output path
    pub out_path: PathBuf,

    /// User agent for HTTP requests and robots matching
    pub user_agent: String,

    /// Enable the browser fallback for blocked fetches
    pub use_browser: bool,

    /// Route every fetch through the browser (implies `use_browser`)
    pub browser_only: bool,

    /// Prefer the browser for sitemap fetches
    pub sitemap_via_browser: bool,

    /// Run the browser with a visible window
    pub headful: bool,

    /// Storage state JSON to restore before the first browser navigation
    pub storage_state: Option<PathBuf>,

    /// Where to persist storage state after manual auth
    pub save_storage_state: Option<PathBuf>,

    /// Pause for manual challenge solving before scraping
    pub manual_auth: bool,

    /// URL opened for manual auth (defaults to the first category page)
    pub auth_url: Option<String>,

    /// Keep raw HTML in the record store
    pub store_html: bool,

    /// Discover listing URLs through the sitemap tree
    pub use_sitemap: bool,

    /// Skip listings already present in the store
    pub resume: bool,
}

impl ScrapeConfig {
    /// The request timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds)
    }

    /// Joins the base URL and a category segment into a landing-page URL.
    pub fn category_url(&self, category: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            category.trim_matches('/')
        )
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.hasznaltauto.hu".to_string(),
            categories: vec!["szemelyauto".to_string()],
            max_pages: 1,
            max_listings: 500,
            delay_seconds: 1.0,
            jitter_seconds: 0.5,
            timeout_seconds: 20.0,
            out_path: PathBuf::from("data/hasznaltauto.sqlite"),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            use_browser: false,
            browser_only: false,
            sitemap_via_browser: false,
            headful: false,
            storage_state: None,
            save_storage_state: None,
            manual_auth: false,
            auth_url: None,
            store_html: false,
            use_sitemap: true,
            resume: true,
        }
    }
}
