//! Headless-browser page fetching
//!
//! [`RenderingFetcher`] renders each page in a fresh browser tab so script-built
//! content is visible to the extractor. Probes of candidate data files still go
//! over plain HTTP; a browser adds nothing for them.
//!
//! The browser itself sits behind [`BrowserSession`]. A `chromiumoxide`
//! implementation is available with the `chromium` feature.

use super::fetcher::{FetchResult, HttpFetcher, PageFetcher};
use crate::HarvestError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// How long navigation may take before the render fails
pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(25);

/// How long to wait for the network to settle after navigation
pub const NETWORK_IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Tracks page lifecycle events for one navigation
///
/// The network counts as idle on the first `networkIdle` that follows the
/// navigation's `init`; a late `networkIdle` from the previous document is ignored.
#[derive(Debug, Default)]
pub struct LifecycleWatch {
    navigating: bool,
}

impl LifecycleWatch {
    /// Feeds one main-frame lifecycle event name; returns true once the network is idle
    pub fn observe(&mut self, name: &str) -> bool {
        match name {
            "init" => {
                self.navigating = true;
                false
            }
            "networkIdle" => self.navigating,
            _ => false,
        }
    }
}

/// A running headless browser that can open tabs
#[async_trait]
pub trait BrowserSession: Send + Sync {
    type Tab: BrowserTab;

    /// Opens a blank tab
    async fn new_tab(&self) -> Result<Self::Tab, HarvestError>;
}

/// One browser tab
#[async_trait]
pub trait BrowserTab: Send + Sync {
    async fn goto(&self, url: &str) -> Result<(), HarvestError>;

    async fn wait_for_network_idle(&self) -> Result<(), HarvestError>;

    /// Rendered document HTML
    async fn content(&self) -> Result<String, HarvestError>;

    /// URL after client- and server-side redirects
    async fn current_url(&self) -> Result<Option<String>, HarvestError>;

    async fn close(&self) -> Result<(), HarvestError>;
}

/// Fetcher that renders pages through a [`BrowserSession`]
pub struct RenderingFetcher<S: BrowserSession> {
    session: S,
    http: HttpFetcher,
    navigation_timeout: Duration,
    idle_timeout: Duration,
}

impl<S: BrowserSession> RenderingFetcher<S> {
    pub fn new(session: S, http: HttpFetcher) -> Self {
        Self {
            session,
            http,
            navigation_timeout: NAVIGATION_TIMEOUT,
            idle_timeout: NETWORK_IDLE_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, navigation: Duration, idle: Duration) -> Self {
        self.navigation_timeout = navigation;
        self.idle_timeout = idle;
        self
    }

    async fn render(&self, tab: &S::Tab, url: &Url) -> Result<FetchResult, HarvestError> {
        tokio::time::timeout(self.navigation_timeout, tab.goto(url.as_str()))
            .await
            .map_err(|_| HarvestError::Browser(format!("navigation to {} timed out", url)))??;

        // An unsettled network still leaves a usable document
        match tokio::time::timeout(self.idle_timeout, tab.wait_for_network_idle()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Network idle wait failed for {}: {}", url, e),
            Err(_) => debug!("Network did not settle for {}", url),
        }

        let body = tab.content().await?;
        let final_url = tab
            .current_url()
            .await?
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| url.to_string());

        // The browser does not expose the response headers
        Ok(FetchResult::Page {
            final_url,
            status: 200,
            content_type: "text/html".to_string(),
            body,
        })
    }
}

#[async_trait]
impl<S: BrowserSession> PageFetcher for RenderingFetcher<S> {
    async fn fetch(&self, url: &Url) -> FetchResult {
        let tab = match self.session.new_tab().await {
            Ok(tab) => tab,
            Err(e) => {
                return FetchResult::NetworkError {
                    error: e.to_string(),
                }
            }
        };

        let result = self.render(&tab, url).await;

        if let Err(e) = tab.close().await {
            debug!("Failed to close tab for {}: {}", url, e);
        }

        result.unwrap_or_else(|e| FetchResult::NetworkError {
            error: e.to_string(),
        })
    }

    async fn probe(&self, url: &Url) -> FetchResult {
        self.http.probe(url).await
    }
}

#[cfg(feature = "chromium")]
pub use chromium::{ChromiumSession, ChromiumTab};

#[cfg(feature = "chromium")]
mod chromium {
    use super::{BrowserSession, BrowserTab, LifecycleWatch};
    use crate::HarvestError;
    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser, BrowserConfig};
    use chromiumoxide::cdp::browser_protocol::page::EventLifecycleEvent;
    use chromiumoxide::listeners::EventStream;
    use chromiumoxide::Page;
    use futures::StreamExt;
    use tokio::sync::Mutex;
    use tokio::task::JoinHandle;
    use tracing::{error, info};

    fn browser_error(e: impl std::fmt::Display) -> HarvestError {
        HarvestError::Browser(e.to_string())
    }

    /// Headless Chromium driven over the DevTools protocol
    pub struct ChromiumSession {
        browser: Browser,
        handler: JoinHandle<()>,
    }

    impl ChromiumSession {
        /// Launches a headless browser sending `user_agent`
        pub async fn launch(user_agent: &str) -> Result<Self, HarvestError> {
            let config = BrowserConfig::builder()
                .arg(format!("--user-agent={}", user_agent))
                .arg("--no-first-run")
                .arg("--no-default-browser-check")
                .build()
                .map_err(browser_error)?;

            let (browser, mut handler) = Browser::launch(config).await.map_err(browser_error)?;

            let handler = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if let Err(e) = event {
                        error!("Browser handler error: {:?}", e);
                    }
                }
                info!("Browser event handler task completed");
            });

            Ok(Self { browser, handler })
        }
    }

    impl Drop for ChromiumSession {
        fn drop(&mut self) {
            self.handler.abort();
        }
    }

    #[async_trait]
    impl BrowserSession for ChromiumSession {
        type Tab = ChromiumTab;

        async fn new_tab(&self) -> Result<ChromiumTab, HarvestError> {
            let page = self
                .browser
                .new_page("about:blank")
                .await
                .map_err(browser_error)?;
            Ok(ChromiumTab {
                page,
                lifecycle: Mutex::new(None),
            })
        }
    }

    pub struct ChromiumTab {
        page: Page,
        /// Lifecycle events of the latest navigation, subscribed before it starts
        lifecycle: Mutex<Option<EventStream<EventLifecycleEvent>>>,
    }

    #[async_trait]
    impl BrowserTab for ChromiumTab {
        async fn goto(&self, url: &str) -> Result<(), HarvestError> {
            let events = self
                .page
                .event_listener::<EventLifecycleEvent>()
                .await
                .map_err(browser_error)?;
            *self.lifecycle.lock().await = Some(events);

            self.page.goto(url).await.map_err(browser_error)?;
            Ok(())
        }

        /// Waits for the main frame's `networkIdle` lifecycle event
        ///
        /// Unbounded; the caller applies the idle timeout.
        async fn wait_for_network_idle(&self) -> Result<(), HarvestError> {
            let main_frame = self.page.mainframe().await.map_err(browser_error)?;
            let mut guard = self.lifecycle.lock().await;
            let events = guard
                .as_mut()
                .ok_or_else(|| browser_error("no navigation to wait on"))?;

            let mut watch = LifecycleWatch::default();
            while let Some(event) = events.next().await {
                if main_frame.as_ref().is_some_and(|id| *id != event.frame_id) {
                    continue;
                }
                if watch.observe(&event.name) {
                    return Ok(());
                }
            }
            Err(browser_error("lifecycle event stream closed"))
        }

        async fn content(&self) -> Result<String, HarvestError> {
            self.page.content().await.map_err(browser_error)
        }

        async fn current_url(&self) -> Result<Option<String>, HarvestError> {
            self.page.url().await.map_err(browser_error)
        }

        async fn close(&self) -> Result<(), HarvestError> {
            self.page.clone().close().await.map_err(browser_error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::crawler::fetcher::build_http_client;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeSession {
        closed: Arc<AtomicUsize>,
        fail_goto: bool,
        never_idle: bool,
    }

    struct FakeTab {
        closed: Arc<AtomicUsize>,
        fail_goto: bool,
        never_idle: bool,
        url: std::sync::Mutex<Option<String>>,
    }

    #[async_trait]
    impl BrowserSession for FakeSession {
        type Tab = FakeTab;

        async fn new_tab(&self) -> Result<FakeTab, HarvestError> {
            Ok(FakeTab {
                closed: Arc::clone(&self.closed),
                fail_goto: self.fail_goto,
                never_idle: self.never_idle,
                url: std::sync::Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl BrowserTab for FakeTab {
        async fn goto(&self, url: &str) -> Result<(), HarvestError> {
            if self.fail_goto {
                return Err(HarvestError::Browser("net::ERR_NAME_NOT_RESOLVED".into()));
            }
            *self.url.lock().unwrap() = Some(format!("{}#rendered", url));
            Ok(())
        }

        async fn wait_for_network_idle(&self) -> Result<(), HarvestError> {
            if self.never_idle {
                std::future::pending::<()>().await;
            }
            Err(HarvestError::Browser("still busy".into()))
        }

        async fn content(&self) -> Result<String, HarvestError> {
            Ok("<html><body><p>Rendered by script</p></body></html>".to_string())
        }

        async fn current_url(&self) -> Result<Option<String>, HarvestError> {
            Ok(self.url.lock().unwrap().clone())
        }

        async fn close(&self) -> Result<(), HarvestError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn http() -> HttpFetcher {
        HttpFetcher::new(build_http_client(&Config::default()).unwrap())
    }

    #[tokio::test]
    async fn test_render_returns_page_and_closes_tab() {
        let session = FakeSession::default();
        let closed = Arc::clone(&session.closed);
        let fetcher = RenderingFetcher::new(session, http());

        let url = Url::parse("https://data.gov.au/dashboard").unwrap();
        match fetcher.fetch(&url).await {
            FetchResult::Page {
                final_url,
                status,
                content_type,
                body,
            } => {
                assert_eq!(final_url, "https://data.gov.au/dashboard#rendered");
                assert_eq!(status, 200);
                assert_eq!(content_type, "text/html");
                assert!(body.contains("Rendered by script"));
            }
            other => panic!("expected page, got {:?}", other),
        }
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_navigation_failure_is_network_error() {
        let session = FakeSession {
            fail_goto: true,
            ..Default::default()
        };
        let closed = Arc::clone(&session.closed);
        let fetcher = RenderingFetcher::new(session, http());

        let url = Url::parse("https://nowhere.gov.au/").unwrap();
        let result = fetcher.fetch(&url).await;
        assert!(matches!(result, FetchResult::NetworkError { .. }));
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_idle_wait_is_bounded() {
        let session = FakeSession {
            never_idle: true,
            ..Default::default()
        };
        let fetcher = RenderingFetcher::new(session, http())
            .with_timeouts(Duration::from_secs(5), Duration::from_millis(50));

        let url = Url::parse("https://data.gov.au/busy").unwrap();
        let start = std::time::Instant::now();
        let result = fetcher.fetch(&url).await;

        assert!(matches!(result, FetchResult::Page { .. }));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_lifecycle_idle_after_navigation_start() {
        let mut watch = LifecycleWatch::default();
        // Leftover from the blank document before the navigation began
        assert!(!watch.observe("networkIdle"));
        assert!(!watch.observe("init"));
        assert!(!watch.observe("DOMContentLoaded"));
        assert!(!watch.observe("load"));
        assert!(watch.observe("networkIdle"));
    }
}
