//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with the configured user agent and timeout
//! - Direct GET fetches for page traversal
//! - HEAD probes with GET fallback for candidate data files
//! - Content-type classification and error classification
//!
//! Fetch failures never propagate as errors: every outcome, good or bad, is a
//! [`FetchResult`] the coordinator can log and move past.

use crate::config::Config;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{redirect::Policy, Client, Response};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Redirect hops followed before a request fails
pub const MAX_REDIRECTS: usize = 10;

/// MIME types treated as HTML
pub const HTML_MIME_TYPES: &[&str] = &["text/html", "application/xhtml+xml"];

/// Result of a fetch or probe
#[derive(Debug, Clone)]
pub enum FetchResult {
    /// HTML page with its body
    Page {
        /// Final URL after redirects
        final_url: String,
        /// HTTP status code
        status: u16,
        /// Raw Content-Type header value, empty if absent
        content_type: String,
        /// Page body
        body: String,
    },

    /// Response headers only: a probe result, or a non-HTML response to a fetch
    Metadata {
        /// Final URL after redirects
        final_url: String,
        /// HTTP status code
        status: u16,
        /// MIME type without parameters, lowercased
        content_type: Option<String>,
        /// Declared body length
        content_length: Option<u64>,
    },

    /// Terminal status of 400 or above
    HttpError {
        /// Final URL after redirects
        final_url: String,
        /// The HTTP status code
        status: u16,
    },

    /// Connection refused, timeout, TLS failure, redirect loop and the like
    NetworkError {
        /// Error description
        error: String,
    },
}

impl FetchResult {
    /// Short description for log lines
    pub fn describe(&self) -> String {
        match self {
            Self::Page { status, .. } => format!("HTTP {} html", status),
            Self::Metadata {
                status,
                content_type,
                ..
            } => format!(
                "HTTP {} {}",
                status,
                content_type.as_deref().unwrap_or("no content-type")
            ),
            Self::HttpError { status, .. } => format!("HTTP {}", status),
            Self::NetworkError { error } => error.clone(),
        }
    }
}

/// Source of page content
///
/// `fetch` always retrieves the body of HTML responses. `probe` only needs
/// status and headers; implementations may answer it more cheaply.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Retrieves a page for traversal
    async fn fetch(&self, url: &Url) -> FetchResult;

    /// Retrieves status and headers of a candidate resource
    async fn probe(&self, url: &Url) -> FetchResult {
        match self.fetch(url).await {
            FetchResult::Page {
                final_url,
                status,
                content_type,
                body,
            } => FetchResult::Metadata {
                final_url,
                status,
                content_type: mime_type(Some(&content_type)),
                content_length: Some(body.len() as u64),
            },
            other => other,
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The run configuration (user agent and request timeout)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &Config) -> Result<Client, reqwest::Error> {
    let timeout = Duration::from_secs(config.crawler.request_timeout_secs);

    Client::builder()
        .user_agent(config.user_agent.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Plain-HTTP fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// GET that stops after the headers
    async fn get_headers(&self, url: &Url) -> FetchResult {
        match self.client.get(url.as_str()).send().await {
            Ok(response) => metadata_result(&response),
            Err(e) => network_error(e),
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    /// Direct fetch: a single GET, body read only for HTML
    async fn fetch(&self, url: &Url) -> FetchResult {
        let response = match self.client.get(url.as_str()).send().await {
            Ok(response) => response,
            Err(e) => return network_error(e),
        };

        let status = response.status().as_u16();
        let final_url = response.url().to_string();

        if status >= 400 {
            return FetchResult::HttpError { final_url, status };
        }

        let raw_type = header_str(response.headers(), CONTENT_TYPE.as_str());
        if !is_html_content_type(raw_type.as_deref()) {
            return metadata_result(&response);
        }

        match response.text().await {
            Ok(body) => FetchResult::Page {
                final_url,
                status,
                content_type: raw_type.unwrap_or_default(),
                body,
            },
            Err(e) => network_error(e),
        }
    }

    /// Probe-then-fetch: HEAD first, GET when HEAD fails, errors, or omits the type
    async fn probe(&self, url: &Url) -> FetchResult {
        match self.client.head(url.as_str()).send().await {
            Ok(response) => {
                let has_type =
                    mime_type(header_str(response.headers(), CONTENT_TYPE.as_str()).as_deref())
                        .is_some();
                if response.status().as_u16() < 400 && has_type {
                    return metadata_result(&response);
                }
                debug!(
                    "HEAD {} not usable (HTTP {}), falling back to GET",
                    url,
                    response.status().as_u16()
                );
            }
            Err(e) => debug!("HEAD {} failed ({}), falling back to GET", url, e),
        }

        self.get_headers(url).await
    }
}

/// Returns the lowercased MIME type without parameters, or `None` if empty
pub fn mime_type(header: Option<&str>) -> Option<String> {
    header
        .and_then(|value| value.split(';').next())
        .map(|mime| mime.trim().to_ascii_lowercase())
        .filter(|mime| !mime.is_empty())
}

/// HTML is `text/html`, `application/xhtml+xml`, or a missing Content-Type
pub fn is_html_content_type(header: Option<&str>) -> bool {
    match mime_type(header) {
        Some(mime) => HTML_MIME_TYPES.contains(&mime.as_str()),
        None => true,
    }
}

fn metadata_result(response: &Response) -> FetchResult {
    let status = response.status().as_u16();
    let final_url = response.url().to_string();

    if status >= 400 {
        return FetchResult::HttpError { final_url, status };
    }

    let headers = response.headers();
    FetchResult::Metadata {
        final_url,
        status,
        content_type: mime_type(header_str(headers, CONTENT_TYPE.as_str()).as_deref()),
        content_length: header_str(headers, CONTENT_LENGTH.as_str())
            .and_then(|v| v.trim().parse::<u64>().ok()),
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn network_error(e: reqwest::Error) -> FetchResult {
    let error = if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        "Connection refused".to_string()
    } else if e.is_redirect() {
        format!("Redirect error: {}", e)
    } else {
        e.to_string()
    };
    FetchResult::NetworkError { error }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(build_http_client(&Config::default()).unwrap())
    }

    fn url(server: &MockServer, p: &str) -> Url {
        Url::parse(&format!("{}{}", server.uri(), p)).unwrap()
    }

    #[test]
    fn test_mime_type() {
        assert_eq!(
            mime_type(Some("Text/HTML; charset=UTF-8")),
            Some("text/html".to_string())
        );
        assert_eq!(mime_type(Some("  ")), None);
        assert_eq!(mime_type(None), None);
    }

    #[test]
    fn test_html_classification() {
        assert!(is_html_content_type(Some("text/html; charset=utf-8")));
        assert!(is_html_content_type(Some("application/xhtml+xml")));
        assert!(is_html_content_type(None));
        assert!(is_html_content_type(Some("")));
        assert!(!is_html_content_type(Some("text/csv")));
        assert!(!is_html_content_type(Some("application/json")));
    }

    #[tokio::test]
    async fn test_fetch_html_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/index"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .set_body_bytes("<html><title>Hi</title></html>"),
            )
            .mount(&server)
            .await;

        match fetcher().fetch(&url(&server, "/index")).await {
            FetchResult::Page {
                status,
                content_type,
                body,
                ..
            } => {
                assert_eq!(status, 200);
                assert_eq!(content_type, "text/html; charset=utf-8");
                assert!(body.contains("<title>Hi</title>"));
            }
            other => panic!("expected page, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_non_html_returns_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/json")
                    .set_body_bytes("{}"),
            )
            .mount(&server)
            .await;

        match fetcher().fetch(&url(&server, "/data.json")).await {
            FetchResult::Metadata { content_type, .. } => {
                assert_eq!(content_type.as_deref(), Some("application/json"));
            }
            other => panic!("expected metadata, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = fetcher().fetch(&url(&server, "/missing")).await;
        assert!(matches!(result, FetchResult::HttpError { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_fetch_network_error() {
        // Nothing listens on port 9 on a test host
        let target = Url::parse("http://127.0.0.1:9/").unwrap();
        let result = fetcher().fetch(&target).await;
        assert!(matches!(result, FetchResult::NetworkError { .. }));
    }

    #[tokio::test]
    async fn test_probe_uses_head() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/report.csv"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/csv")
                    .insert_header("content-length", "1234"),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/report.csv"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        match fetcher().probe(&url(&server, "/report.csv")).await {
            FetchResult::Metadata {
                content_type,
                content_length,
                ..
            } => {
                assert_eq!(content_type.as_deref(), Some("text/csv"));
                assert_eq!(content_length, Some(1234));
            }
            other => panic!("expected metadata, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_probe_falls_back_to_get_when_head_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/table.xlsx"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/table.xlsx"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(
                        "content-type",
                        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                    )
                    .set_body_bytes(vec![0u8; 16]),
            )
            .expect(1)
            .mount(&server)
            .await;

        let result = fetcher().probe(&url(&server, "/table.xlsx")).await;
        match result {
            FetchResult::Metadata { content_type, .. } => assert_eq!(
                content_type.as_deref(),
                Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")
            ),
            other => panic!("expected metadata, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_probe_falls_back_when_head_has_no_type() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/file.pdf"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/file.pdf"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let result = fetcher().probe(&url(&server, "/file.pdf")).await;
        assert!(matches!(result, FetchResult::HttpError { status: 404, .. }));
    }
}
