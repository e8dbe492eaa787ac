//! Robots.txt policy gate
//!
//! The site's robots directives are fetched once at startup and cached for
//! the whole run. Every higher-level fetch consults the gate before touching
//! the network; discovery components additionally consult it before enqueuing
//! follow-on URLs.

use crate::fetch::HttpClient;
use robotstxt::DefaultMatcher;
use std::sync::Mutex;

/// Parsed robots.txt content
///
/// Thin wrapper around the robotstxt crate. An empty content string behaves
/// as allow-all, which is also the degraded mode when robots.txt cannot be
/// fetched.
#[derive(Debug, Clone, Default)]
pub struct ParsedRobots {
    content: String,
}

impl ParsedRobots {
    /// Creates a ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
        }
    }

    /// Creates a permissive ParsedRobots that allows everything
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Checks whether a URL is allowed for the given user agent
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.content.is_empty() {
            return true;
        }
        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }
}

#[derive(Debug, Default)]
struct GateState {
    loaded: bool,
    robots: Option<ParsedRobots>,
}

/// Robots policy gate for a single site
///
/// `allowed()` returns true until `load()` has completed; after that it
/// delegates to standard robots-directive matching. A failed robots.txt
/// fetch degrades to allow-all rather than deny-all: availability is
/// preferred over caution for this infrastructure file.
#[derive(Debug)]
pub struct RobotsGate {
    base_url: String,
    user_agent: String,
    state: Mutex<GateState>,
}

impl RobotsGate {
    /// Creates an unloaded gate for the given site and user agent
    pub fn new(base_url: &str, user_agent: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            user_agent: user_agent.to_string(),
            state: Mutex::new(GateState::default()),
        }
    }

    /// Fetches and caches the site's robots.txt via the given client
    ///
    /// The robots.txt request itself bypasses the gate (`ignore_robots`).
    /// On any fetch failure the gate is still marked loaded with no policy,
    /// i.e. it fails open.
    pub async fn load(&self, client: &mut HttpClient) {
        let robots_url = format!("{}/robots.txt", self.base_url);
        let result = client.fetch(&robots_url, true, false).await;

        let mut state = self.state.lock().unwrap();
        state.loaded = true;
        match result.body {
            Some(content) => {
                state.robots = Some(ParsedRobots::from_content(&content));
                tracing::info!("Loaded robots.txt ({})", robots_url);
            }
            None => {
                tracing::warn!("Could not load robots.txt ({})", robots_url);
                state.robots = None;
            }
        }
    }

    /// Checks whether a URL may be fetched
    pub fn allowed(&self, url: &str) -> bool {
        let state = self.state.lock().unwrap();
        if !state.loaded {
            return true;
        }
        match &state.robots {
            Some(robots) => robots.is_allowed(url, &self.user_agent),
            None => true,
        }
    }
}
