//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching robots.txt files.
//! A robots.txt that cannot be fetched degrades to an allow-all policy.

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsCache};
pub use parser::{ParsedRobots, MAX_CRAWL_DELAY};

use tracing::debug;

/// Fetches and parses robots.txt for an origin
///
/// Never fails: network errors and non-2xx statuses yield an allow-all policy.
///
/// # Arguments
///
/// * `client` - HTTP client (carries the User-Agent header and timeout)
/// * `origin` - `scheme://host[:port]` without a trailing slash
pub async fn fetch_robots(client: &reqwest::Client, origin: &str) -> ParsedRobots {
    let robots_url = format!("{}/robots.txt", origin.trim_end_matches('/'));

    let response = match client.get(&robots_url).send().await {
        Ok(response) => response,
        Err(e) => {
            debug!("robots.txt unavailable at {}: {}", robots_url, e);
            return ParsedRobots::allow_all();
        }
    };

    if !response.status().is_success() {
        debug!(
            "robots.txt at {} returned {}, allowing all",
            robots_url,
            response.status()
        );
        return ParsedRobots::allow_all();
    }

    match response.text().await {
        Ok(body) => {
            debug!("Fetched robots.txt for {} ({} bytes)", origin, body.len());
            ParsedRobots::from_content(&body)
        }
        Err(e) => {
            debug!("Failed to read robots.txt body from {}: {}", robots_url, e);
            ParsedRobots::allow_all()
        }
    }
}
