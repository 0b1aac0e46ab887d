//! Robots.txt caching implementation
//!
//! Policies are cached per origin (`scheme://host[:port]`) and refreshed after
//! 24 hours. Each origin has its own async lock, so a slow robots.txt fetch for
//! one host never blocks checks against another.

use crate::robots::{fetch_robots, ParsedRobots};
use crate::url::origin_of;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

/// Cached robots.txt data for an origin
#[derive(Debug, Clone)]
pub struct CachedRobots {
    /// The parsed robots.txt content
    pub content: ParsedRobots,

    /// When the robots.txt was fetched
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    /// Creates a new CachedRobots stamped with the current time
    pub fn new(content: ParsedRobots) -> Self {
        Self {
            content,
            fetched_at: Utc::now(),
        }
    }

    /// Checks if the cached robots.txt is older than 24 hours
    pub fn is_stale(&self) -> bool {
        self.age() > Duration::hours(24)
    }

    /// Returns the age of the cached robots.txt
    pub fn age(&self) -> Duration {
        Utc::now() - self.fetched_at
    }
}

type Slot = Arc<Mutex<Option<Arc<CachedRobots>>>>;

/// Lazily filled, per-origin robots.txt policy cache
///
/// Owned by one crawl run and shared by its fetch tasks.
pub struct RobotsCache {
    client: reqwest::Client,
    agent_token: String,
    entries: DashMap<String, Slot>,
}

impl RobotsCache {
    /// Creates an empty cache
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client used to fetch robots.txt (carries the User-Agent header)
    /// * `agent_token` - Product token matched against `User-agent` groups
    pub fn new(client: reqwest::Client, agent_token: impl Into<String>) -> Self {
        Self {
            client,
            agent_token: agent_token.into(),
            entries: DashMap::new(),
        }
    }

    /// Returns the policy for the URL's origin, fetching robots.txt on first use
    ///
    /// Returns `None` only for URLs without an origin (no host).
    pub async fn policy(&self, url: &Url) -> Option<Arc<CachedRobots>> {
        let origin = origin_of(url)?;

        // Clone the slot out so the map shard is not held across the await
        let slot = self.entries.entry(origin.clone()).or_default().clone();
        let mut guard = slot.lock().await;

        if let Some(cached) = guard.as_ref() {
            if !cached.is_stale() {
                return Some(Arc::clone(cached));
            }
            debug!("robots.txt for {} is stale, refreshing", origin);
        }

        let parsed = fetch_robots(&self.client, &origin).await;
        let cached = Arc::new(CachedRobots::new(parsed));
        *guard = Some(Arc::clone(&cached));
        Some(cached)
    }

    /// Checks whether the configured agent may fetch the URL
    pub async fn is_allowed(&self, url: &Url) -> bool {
        match self.policy(url).await {
            Some(cached) => cached.content.is_allowed(url.as_str(), &self.agent_token),
            None => true,
        }
    }

    /// Returns the `Crawl-delay` declared for the URL's origin, if any
    pub async fn crawl_delay(&self, url: &Url) -> Option<std::time::Duration> {
        self.policy(url)
            .await
            .and_then(|cached| cached.content.crawl_delay(&self.agent_token))
    }

    /// Seeds the cache with a known policy for an origin
    pub fn insert(&self, origin: &str, robots: ParsedRobots) {
        self.entries.insert(
            origin.to_string(),
            Arc::new(Mutex::new(Some(Arc::new(CachedRobots::new(robots))))),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_new_cache_not_stale() {
        let cache = CachedRobots::new(ParsedRobots::allow_all());
        assert!(!cache.is_stale());
    }

    #[test]
    fn test_cache_is_stale_after_a_day() {
        let mut cache = CachedRobots::new(ParsedRobots::allow_all());
        cache.fetched_at = Utc::now() - Duration::hours(25);
        assert!(cache.is_stale());

        cache.fetched_at = Utc::now() - Duration::hours(23);
        assert!(!cache.is_stale());
    }

    #[tokio::test]
    async fn test_robots_fetched_once_per_origin() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("User-agent: *\nDisallow: /private\nCrawl-delay: 2"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let cache = RobotsCache::new(reqwest::Client::new(), "GovHarvest");
        let open = Url::parse(&format!("{}/public", server.uri())).unwrap();
        let closed = Url::parse(&format!("{}/private/x.csv", server.uri())).unwrap();

        assert!(cache.is_allowed(&open).await);
        assert!(!cache.is_allowed(&closed).await);
        assert_eq!(
            cache.crawl_delay(&open).await,
            Some(std::time::Duration::from_secs(2))
        );
    }

    #[tokio::test]
    async fn test_missing_robots_allows_all() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let cache = RobotsCache::new(reqwest::Client::new(), "GovHarvest");
        let url = Url::parse(&format!("{}/anything", server.uri())).unwrap();
        assert!(cache.is_allowed(&url).await);
    }

    #[tokio::test]
    async fn test_server_error_allows_all() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let cache = RobotsCache::new(reqwest::Client::new(), "GovHarvest");
        let url = Url::parse(&format!("{}/anything", server.uri())).unwrap();
        assert!(cache.is_allowed(&url).await);
        assert_eq!(cache.crawl_delay(&url).await, None);
    }

    #[tokio::test]
    async fn test_inserted_policy_is_used() {
        let cache = RobotsCache::new(reqwest::Client::new(), "GovHarvest");
        cache.insert(
            "https://data.gov.au",
            ParsedRobots::from_content("User-agent: *\nDisallow: /"),
        );

        let url = Url::parse("https://data.gov.au/dataset").unwrap();
        assert!(!cache.is_allowed(&url).await);
    }
}
