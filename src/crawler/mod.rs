//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with probe-then-fetch for candidate data files
//! - Optional headless-browser rendering
//! - Link discovery and data-file classification
//! - The breadth-first frontier
//! - Overall crawl coordination

mod browser;
mod coordinator;
mod fetcher;
mod parser;
mod scheduler;

pub use browser::{
    BrowserSession, BrowserTab, LifecycleWatch, RenderingFetcher, NAVIGATION_TIMEOUT,
    NETWORK_IDLE_TIMEOUT,
};
#[cfg(feature = "chromium")]
pub use browser::{ChromiumSession, ChromiumTab};
pub use coordinator::{harvest, Coordinator};
pub use fetcher::{
    build_http_client, is_html_content_type, mime_type, FetchResult, HttpFetcher, PageFetcher,
    MAX_REDIRECTS,
};
pub use parser::{
    discover_links, ext_for_mime, guess_ext_from_url, DiscoveredLinks, ResourceClassifier,
    ResourceLink, DATA_FILE_EXTS,
};
pub use scheduler::{EnqueueRejection, Frontier, FrontierEntry, FRONTIER_GROWTH_FACTOR};

use crate::config::Config;
use crate::Result;
use std::sync::Arc;

/// Builds the page fetcher the configuration asks for
///
/// Plain HTTP unless `render-js` is set. Rendering needs the `chromium`
/// feature; without it a rendering run fails here, before any request.
///
/// # Returns
///
/// * `Ok(fetcher)` - Ready to hand to [`Coordinator::with_fetcher`]
/// * `Err(HarvestError)` - HTTP client or browser startup failed
pub async fn build_fetcher(config: &Config) -> Result<Arc<dyn PageFetcher>> {
    let http = HttpFetcher::new(build_http_client(config)?);

    if !config.crawler.render_js {
        return Ok(Arc::new(http));
    }

    #[cfg(feature = "chromium")]
    {
        let session = ChromiumSession::launch(&config.user_agent.header_value()).await?;
        tracing::info!("Rendering pages with headless Chromium");
        Ok(Arc::new(RenderingFetcher::new(session, http)))
    }

    #[cfg(not(feature = "chromium"))]
    {
        drop(http);
        Err(crate::HarvestError::Browser(
            "render-js requires a build with the `chromium` feature".to_string(),
        ))
    }
}
