//! Robots.txt parser implementation
//!
//! Path rules are evaluated with the robotstxt crate; `Crawl-delay`, which
//! that crate ignores, is read with a small group-aware scan.

use robotstxt::DefaultMatcher;
use std::time::Duration;

/// Upper bound applied to a robots.txt `Crawl-delay`
pub const MAX_CRAWL_DELAY: Duration = Duration::from_secs(60);

/// Parsed robots.txt data for one origin
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt content (empty string means allow all)
    content: String,
    /// Set when robots.txt was missing or unreachable
    allow_all: bool,
}

impl ParsedRobots {
    /// Creates a new ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
        }
    }

    /// Creates a permissive ParsedRobots that allows everything
    ///
    /// Used when robots.txt is missing, unreachable, or returns an error status.
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
        }
    }

    /// True if this policy was created without any rules
    pub fn is_allow_all(&self) -> bool {
        self.allow_all || self.content.trim().is_empty()
    }

    /// Checks if a URL is allowed for the given user agent product token
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL (or path) to check
    /// * `agent_token` - Product token such as `GovHarvest`, not the full header
    pub fn is_allowed(&self, url: &str, agent_token: &str) -> bool {
        if self.is_allow_all() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, agent_token, url)
    }

    /// Gets the `Crawl-delay` that applies to the given product token
    ///
    /// A group naming the agent wins over the `*` group. Non-numeric and
    /// negative values are ignored; anything above [`MAX_CRAWL_DELAY`] is
    /// clamped to it.
    pub fn crawl_delay(&self, agent_token: &str) -> Option<Duration> {
        if self.is_allow_all() {
            return None;
        }

        let agent = agent_token.to_lowercase();
        let mut group: Vec<String> = Vec::new();
        let mut reading_agents = false;
        let mut for_agent: Option<f64> = None;
        let mut for_wildcard: Option<f64> = None;

        for line in self.content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    // Consecutive User-agent lines share one group
                    if !reading_agents {
                        group.clear();
                        reading_agents = true;
                    }
                    group.push(value.to_lowercase());
                }
                "crawl-delay" => {
                    reading_agents = false;
                    let Ok(delay) = value.parse::<f64>() else {
                        continue;
                    };
                    if !delay.is_finite() || delay < 0.0 {
                        continue;
                    }
                    if group.iter().any(|ua| ua != "*" && agent.starts_with(ua.as_str())) {
                        for_agent.get_or_insert(delay);
                    } else if group.iter().any(|ua| ua == "*") {
                        for_wildcard.get_or_insert(delay);
                    }
                }
                _ => reading_agents = false,
            }
        }

        let seconds = for_agent.or(for_wildcard)?;
        match Duration::try_from_secs_f64(seconds) {
            Ok(delay) if delay <= MAX_CRAWL_DELAY => Some(delay),
            _ => {
                tracing::warn!(
                    "Crawl-delay of {}s exceeds the {}s maximum, clamping",
                    seconds,
                    MAX_CRAWL_DELAY.as_secs()
                );
                Some(MAX_CRAWL_DELAY)
            }
        }
    }
}
