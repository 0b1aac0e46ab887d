//! URL handling module for Gov-Harvest
//!
//! This module provides URL normalization, host extraction, wildcard matching,
//! and the scope filter that decides which hosts a crawl may traverse.

mod domain;
mod matcher;
mod normalize;

use crate::config::ScopeConfig;
use url::Url;

// Re-export main functions
pub use domain::{extract_domain, host_key, origin_of};
pub use matcher::{matches_suffix, matches_wildcard};
pub use normalize::{normalize_url, try_normalize_url};

/// Decides whether a URL's host belongs to the crawl scope
///
/// The allowed set is either the explicit `allowed-domains` list or, when that
/// is empty, the hosts of the seed URLs. An optional public suffix restricts
/// every host, allowed or not, to that suffix or its subdomains.
#[derive(Debug, Clone)]
pub struct ScopeFilter {
    allowed: Vec<String>,
    same_domain_only: bool,
    public_suffix: Option<String>,
}

impl ScopeFilter {
    /// Builds a scope filter from the scope configuration
    ///
    /// # Arguments
    ///
    /// * `config` - Scope section of the configuration
    /// * `seeds` - Normalized seed URLs; their hosts form the implicit allow-list
    pub fn new(config: &ScopeConfig, seeds: &[Url]) -> Self {
        let allowed = if config.allowed_domains.is_empty() {
            let mut hosts: Vec<String> = seeds.iter().filter_map(host_key).collect();
            hosts.sort();
            hosts.dedup();
            hosts
        } else {
            config
                .allowed_domains
                .iter()
                .map(|d| d.trim().to_lowercase())
                .filter(|d| !d.is_empty())
                .collect()
        };

        Self {
            allowed,
            same_domain_only: config.same_domain_only,
            public_suffix: config
                .public_suffix
                .as_ref()
                .map(|s| s.trim().trim_start_matches('.').to_lowercase())
                .filter(|s| !s.is_empty()),
        }
    }

    /// Returns true iff the URL may be traversed as a page
    pub fn is_in_scope(&self, url: &Url) -> bool {
        if url.scheme() != "http" && url.scheme() != "https" {
            return false;
        }

        let Some(host) = host_key(url) else {
            return false;
        };

        if self.same_domain_only && !self.allowed.iter().any(|p| matches_wildcard(p, &host)) {
            return false;
        }

        match &self.public_suffix {
            Some(suffix) => matches_suffix(suffix, &host),
            None => true,
        }
    }

    /// The effective allow-list
    pub fn allowed_domains(&self) -> &[String] {
        &self.allowed
    }
}
