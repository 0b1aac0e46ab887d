use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Per-host "next allowed request time" gate
///
/// Each host has its own async mutex holding the next instant a request may
/// start. The read-wait-write sequence runs under that mutex, so concurrent
/// callers for one host queue up behind each other while callers for other
/// hosts proceed independently.
#[derive(Debug, Default)]
pub struct PolitenessThrottle {
    hosts: DashMap<String, Arc<Mutex<Option<Instant>>>>,
}

impl PolitenessThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until the host may be contacted, then books the next slot
    ///
    /// # Arguments
    ///
    /// * `host` - Throttle key, `host` or `host:port`
    /// * `delay` - Minimum spacing between two requests to this host
    ///
    /// # Returns
    ///
    /// The instant at which this caller was granted its turn.
    pub async fn await_turn(&self, host: &str, delay: Duration) -> Instant {
        let slot = self.hosts.entry(host.to_string()).or_default().clone();
        let mut next_allowed = slot.lock().await;

        if let Some(at) = *next_allowed {
            tokio::time::sleep_until(at).await;
        }

        let granted = Instant::now();
        *next_allowed = Some(granted + delay);
        granted
    }
}

/// Effective per-host delay: the configured delay or the robots `Crawl-delay`, whichever is longer
pub fn effective_delay(configured: Duration, crawl_delay: Option<Duration>) -> Duration {
    match crawl_delay {
        Some(robots) => configured.max(robots),
        None => configured,
    }
}
