//! Crawl frontier and visited set
//!
//! This module handles:
//! - FIFO queue of URLs waiting to be fetched, with their depth and origin page
//! - Depth limiting at enqueue time
//! - Bounding queue growth relative to the page cap
//! - The visited set that guarantees each URL is dispatched at most once
//!
//! The frontier is owned by the coordinator loop alone. Fetch tasks never touch
//! it; they hand discovered links back to the loop, so check-and-insert on the
//! visited set needs no lock.

use crate::output::PageRecord;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use url::Url;

/// Queue growth stops once visited + queued reaches this multiple of `max-pages`
pub const FRONTIER_GROWTH_FACTOR: usize = 4;

/// A URL waiting to be fetched
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    /// Normalized URL, the dedup key
    pub url: Url,

    /// Link distance from the nearest seed
    pub depth: u32,

    /// The page this link was found on; `None` for seeds
    pub origin: Option<Arc<PageRecord>>,
}

impl FrontierEntry {
    pub fn seed(url: Url) -> Self {
        Self {
            url,
            depth: 0,
            origin: None,
        }
    }

    /// URL of the page this entry was discovered from
    pub fn origin_url(&self) -> Option<&str> {
        self.origin.as_ref().map(|page| page.url.as_str())
    }
}

/// Why a URL was not added to the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueRejection {
    /// Already queued or already visited
    Duplicate,
    /// The referring page is at `max-depth`
    TooDeep,
    /// The frontier reached its growth bound
    Full,
}

/// Pending URLs plus the set of URLs already dispatched
#[derive(Debug)]
pub struct Frontier {
    queue: VecDeque<FrontierEntry>,
    enqueued: HashSet<String>,
    visited: HashSet<String>,
    max_depth: u32,
    capacity: usize,
}

impl Frontier {
    /// Creates an empty frontier
    ///
    /// # Arguments
    ///
    /// * `max_depth` - Deepest level a page may be enqueued at
    /// * `max_pages` - Page cap of the run; bounds queue growth
    pub fn new(max_depth: u32, max_pages: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            enqueued: HashSet::new(),
            visited: HashSet::new(),
            max_depth,
            capacity: max_pages.saturating_mul(FRONTIER_GROWTH_FACTOR),
        }
    }

    /// Queues seeds at depth 0; duplicates are dropped, the growth bound does not apply
    pub fn seed<I: IntoIterator<Item = Url>>(&mut self, seeds: I) -> usize {
        let mut added = 0;
        for url in seeds {
            if self.enqueued.insert(url.to_string()) {
                self.queue.push_back(FrontierEntry::seed(url));
                added += 1;
            }
        }
        added
    }

    /// Queues a link found on a page at `origin.depth`
    ///
    /// The link lands at `origin.depth + 1` and is rejected when the origin is
    /// already at `max-depth`, when the URL was seen before, or when the
    /// frontier is full.
    pub fn push_discovered(
        &mut self,
        url: Url,
        origin: &Arc<PageRecord>,
    ) -> Result<(), EnqueueRejection> {
        if origin.depth >= self.max_depth {
            return Err(EnqueueRejection::TooDeep);
        }

        let key = url.to_string();
        if self.enqueued.contains(&key) || self.visited.contains(&key) {
            return Err(EnqueueRejection::Duplicate);
        }

        if self.visited.len() + self.queue.len() >= self.capacity {
            return Err(EnqueueRejection::Full);
        }

        self.enqueued.insert(key);
        self.queue.push_back(FrontierEntry {
            url,
            depth: origin.depth + 1,
            origin: Some(Arc::clone(origin)),
        });
        Ok(())
    }

    /// Takes the oldest entry
    pub fn pop(&mut self) -> Option<FrontierEntry> {
        self.queue.pop_front()
    }

    /// Records a URL as dispatched; returns false if it already was
    pub fn mark_visited(&mut self, url: &Url) -> bool {
        self.visited.insert(url.to_string())
    }
}
