//! Command-line entry point for the hasznaltauto.hu scraper

use clap::Parser;
use hasznaltauto_scraper::config::{ScrapeConfig, DEFAULT_CATEGORIES, DEFAULT_USER_AGENT};
use hasznaltauto_scraper::fetch::{BrowserClient, HttpClient, PageFetcher};
use hasznaltauto_scraper::pipeline;
use hasznaltauto_scraper::robots::RobotsGate;
use hasznaltauto_scraper::storage::{SqliteStore, Store};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// A polite scraper for hasznaltauto.hu vehicle listings
///
/// Discovers listing URLs through the sitemap tree (or a category-page
/// crawl), fetches each detail page with rate limiting and robots.txt
/// compliance, extracts a normalized record, and stores it in SQLite.
#[derive(Parser, Debug)]
#[command(name = "hasznaltauto-scraper")]
#[command(version = "1.0.0")]
#[command(about = "A polite hasznaltauto.hu listing scraper", long_about = None)]
struct Cli {
    /// Base site URL
    #[arg(long, default_value = "https://www.hasznaltauto.hu")]
    base_url: String,

    /// Vehicle categories to scrape (repeatable); defaults to szemelyauto
    #[arg(long = "category", value_name = "CATEGORY")]
    categories: Vec<String>,

    /// Scrape every known vehicle category
    #[arg(long, conflicts_with = "categories")]
    all_categories: bool,

    /// Max listing pages crawled per category
    #[arg(long, default_value_t = 1)]
    max_pages: usize,

    /// Max detail listings scraped in one run
    #[arg(long, default_value_t = 500)]
    max_listings: usize,

    /// Minimum delay between requests in seconds
    #[arg(long, default_value_t = 1.0)]
    delay: f64,

    /// Random extra delay added on top, in seconds
    #[arg(long, default_value_t = 0.5)]
    jitter: f64,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 20.0)]
    timeout: f64,

    /// SQLite output path
    #[arg(long, default_value = "data/hasznaltauto.sqlite")]
    out: PathBuf,

    /// User agent for HTTP requests and robots matching
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Enable the browser fallback for blocked fetches
    #[arg(long)]
    browser: bool,

    /// Route every fetch through the browser
    #[arg(long)]
    browser_only: bool,

    /// Fetch sitemaps through the browser
    #[arg(long)]
    sitemap_via_browser: bool,

    /// Run the browser with a visible window
    #[arg(long)]
    headful: bool,

    /// Storage state JSON restored before the first browser navigation
    #[arg(long, value_name = "FILE")]
    storage_state: Option<PathBuf>,

    /// Persist storage state to this file after manual auth
    #[arg(long, value_name = "FILE")]
    save_storage_state: Option<PathBuf>,

    /// Pause in a visible browser for manual challenge solving
    #[arg(long)]
    manual_auth: bool,

    /// URL opened for manual auth (defaults to the first category page)
    #[arg(long, value_name = "URL")]
    auth_url: Option<String>,

    /// Keep raw page HTML in the store
    #[arg(long)]
    store_html: bool,

    /// Skip sitemap discovery and go straight to the category crawl
    #[arg(long)]
    no_sitemap: bool,

    /// Re-scrape listings already present in the store
    #[arg(long)]
    no_resume: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn into_config(self) -> ScrapeConfig {
        let categories = if self.all_categories {
            DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect()
        } else if self.categories.is_empty() {
            vec!["szemelyauto".to_string()]
        } else {
            self.categories
        };

        // Manual auth without an explicit path still persists the session.
        let save_storage_state = self.save_storage_state.or_else(|| {
            self.manual_auth
                .then(|| PathBuf::from("data/storage_state.json"))
        });

        ScrapeConfig {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            categories,
            max_pages: self.max_pages,
            max_listings: self.max_listings,
            delay_seconds: self.delay,
            jitter_seconds: self.jitter,
            timeout_seconds: self.timeout,
            out_path: self.out,
            user_agent: self.user_agent,
            use_browser: self.browser || self.browser_only || self.manual_auth,
            browser_only: self.browser_only,
            sitemap_via_browser: self.sitemap_via_browser,
            headful: self.headful || self.manual_auth,
            storage_state: self.storage_state,
            save_storage_state,
            manual_auth: self.manual_auth,
            auth_url: self.auth_url,
            store_html: self.store_html,
            use_sitemap: !self.no_sitemap,
            resume: !self.no_resume,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let config = cli.into_config();
    tracing::info!(
        "Scraping {} (categories: {})",
        config.base_url,
        config.categories.join(", ")
    );

    if let Some(parent) = config.out_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let store = SqliteStore::open(&config.out_path)?;

    let mut client = HttpClient::new(
        &config.user_agent,
        config.delay_seconds,
        config.jitter_seconds,
        config.timeout(),
    )?;

    let robots = Arc::new(RobotsGate::new(&config.base_url, &config.user_agent));
    robots.load(&mut client).await;
    client.set_robots(Arc::clone(&robots));

    let browser = if config.use_browser {
        Some(BrowserClient::new(
            config.timeout(),
            !config.headful,
            Some(config.user_agent.clone()),
            config.storage_state.clone(),
        ))
    } else {
        None
    };

    let mut fetcher = PageFetcher::new(
        client,
        robots,
        browser,
        config.use_browser,
        config.browser_only,
    );

    let outcome = pipeline::run(&config, &mut fetcher, &store).await;

    // The browser engine must come down even when the run failed.
    fetcher.close().await;

    match outcome {
        Ok(report) => {
            tracing::info!(
                "Done: {} discovered, {} stored ({} total in {})",
                report.discovered,
                report.stored,
                store.count()?,
                config.out_path.display()
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Scrape run failed: {}", e);
            Err(e.into())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("hasznaltauto_scraper=info,warn"),
            1 => EnvFilter::new("hasznaltauto_scraper=debug,info"),
            2 => EnvFilter::new("hasznaltauto_scraper=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}
