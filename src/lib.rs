//! A polite, robots-aware scraper for hasznaltauto.hu vehicle listings.
//!
//! This crate implements the full scrape pipeline: rate-limited fetching with
//! a browser-engine fallback for anti-bot challenge pages, sitemap and
//! category-page discovery of listing URLs, a tolerant detail extractor, and
//! incremental SQLite persistence keyed by ad id.

pub mod config;
pub mod discover;
pub mod extract;
pub mod fetch;
pub mod pipeline;
pub mod robots;
pub mod storage;

use thiserror::Error;

/// Main error type for scraper operations
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("browser protocol error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for scraper operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

// Re-export commonly used types
pub use config::ScrapeConfig;
pub use extract::{extract_listing, ListingRecord};
pub use fetch::{FetchResult, HttpClient, PageFetcher};
pub use pipeline::RunReport;
pub use robots::RobotsGate;
pub use storage::{SqliteStore, Store};
