//! Rate-limited HTTP fetcher
//!
//! Issues one request at a time with an enforced minimum spacing plus random
//! jitter, sends a fixed browser-like header set, and classifies responses as
//! successful, blocked (anti-bot challenge or transport failure), or skipped
//! (denied by robots before any network activity).

use crate::robots::RobotsGate;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, PRAGMA};
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Body phrases that mark a response as an anti-bot challenge page,
/// matched case-insensitively. "ellenor" is the stem of the Hungarian
/// verification wording so it matches its inflected forms too.
const BLOCKED_PHRASES: &[&str] = &[
    "ellenor",
    "nem vagy robot",
    "verification",
    "access denied",
    "too many requests",
];

/// Result of a single fetch
///
/// At most one of `blocked`/`skipped` is set; `body` is present only on an
/// unblocked, non-skipped success.
#[derive(Debug)]
pub struct FetchResult {
    /// The requested URL
    pub url: String,
    /// HTTP status code (0 when no response was received)
    pub status: u16,
    /// Decoded response body, absent on block/skip/failure
    pub body: Option<String>,
    /// Response classified as an anti-bot challenge or transport failure
    pub blocked: bool,
    /// Request denied by robots.txt before any network call
    pub skipped: bool,
    /// Content-Type header of the response, empty when unavailable
    pub content_type: String,
}

impl FetchResult {
    fn skipped(url: &str) -> Self {
        Self {
            url: url.to_string(),
            status: 0,
            body: None,
            blocked: false,
            skipped: true,
            content_type: String::new(),
        }
    }

    fn transport_failure(url: &str) -> Self {
        Self {
            url: url.to_string(),
            status: 0,
            body: None,
            blocked: true,
            skipped: false,
            content_type: String::new(),
        }
    }
}

/// Rate-limited HTTP client
///
/// Owns the shared last-request timestamp that serializes all network
/// activity in the pipeline: every fetch waits out the remaining delay
/// (plus jitter) measured from the end of the previous request.
pub struct HttpClient {
    client: Client,
    delay_seconds: f64,
    jitter_seconds: f64,
    last_request_at: Option<Instant>,
    robots: Option<Arc<RobotsGate>>,
}

impl HttpClient {
    /// Builds a client with the given user agent, pacing, and timeout
    pub fn new(
        user_agent: &str,
        delay_seconds: f64,
        jitter_seconds: f64,
        timeout: Duration,
    ) -> crate::Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            delay_seconds,
            jitter_seconds,
            last_request_at: None,
            robots: None,
        })
    }

    /// Attaches the robots gate consulted on every non-exempt fetch
    pub fn set_robots(&mut self, robots: Arc<RobotsGate>) {
        self.robots = Some(robots);
    }

    /// Fixed browser-like headers sent with every request. The user agent is
    /// set on the client itself.
    fn headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("hu-HU,hu;q=0.9,en-US;q=0.8,en;q=0.7"),
        );
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        headers
    }

    /// Waits out the minimum inter-request delay plus jitter
    ///
    /// Measured from the end of the previous request; the timestamp is
    /// updated after sleeping so the next call measures from here.
    async fn throttle(&mut self) {
        if let Some(last) = self.last_request_at {
            let min_gap = Duration::from_secs_f64(self.delay_seconds);
            let elapsed = last.elapsed();
            if elapsed < min_gap {
                tokio::time::sleep(min_gap - elapsed).await;
            }
        }
        if self.jitter_seconds > 0.0 {
            let jitter = rand::thread_rng().gen_range(0.0..self.jitter_seconds);
            tokio::time::sleep(Duration::from_secs_f64(jitter)).await;
        }
        self.last_request_at = Some(Instant::now());
    }

    /// Checks the decoded body against the fixed challenge phrase list
    fn is_challenge_body(text: &str) -> bool {
        let lower = text.to_lowercase();
        BLOCKED_PHRASES.iter().any(|phrase| lower.contains(phrase))
    }

    /// Fetches a single URL
    ///
    /// Robots denial short-circuits before the delay is consumed. Transport
    /// failures and challenge responses come back as blocked with no body;
    /// an unexpected content type is logged but does not block the result.
    pub async fn fetch(&mut self, url: &str, ignore_robots: bool, expect_html: bool) -> FetchResult {
        if !ignore_robots {
            if let Some(robots) = &self.robots {
                if !robots.allowed(url) {
                    tracing::warn!("Robots blocked: {}", url);
                    return FetchResult::skipped(url);
                }
            }
        }

        self.throttle().await;

        let response = match self.client.get(url).headers(Self::headers()).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!("Request failed: {} ({})", url, e);
                return FetchResult::transport_failure(url);
            }
        };

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Failed to read response body: {} ({})", url, e);
                return FetchResult::transport_failure(url);
            }
        };

        let blocked = status == 403 || status == 429 || Self::is_challenge_body(&text);
        if blocked {
            tracing::warn!("Blocked response {} for {}", status, url);
            return FetchResult {
                url: url.to_string(),
                status,
                body: None,
                blocked: true,
                skipped: false,
                content_type,
            };
        }

        if expect_html
            && !content_type.contains("text/html")
            && !content_type.contains("application/xhtml+xml")
        {
            tracing::info!("Unexpected content type {} for {}", content_type, url);
        }

        FetchResult {
            url: url.to_string(),
            status,
            body: Some(text),
            blocked: false,
            skipped: false,
            content_type,
        }
    }
}
