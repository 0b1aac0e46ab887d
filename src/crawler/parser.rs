//! Link discovery and resource classification
//!
//! This module handles parsing HTML content to extract:
//! - Page links to follow (from `<a>` tags and canonical links)
//! - Resource links: data files recognized by extension, with their anchor text

use crate::config::ResourceConfig;
use crate::extract::joined_text;
use crate::url::try_normalize_url;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Data-file extensions collected by default
pub const DATA_FILE_EXTS: &[&str] = &[".csv", ".xls", ".xlsx"];

pub const PDF_EXT: &str = ".pdf";
pub const ARCHIVE_EXT: &str = ".zip";

/// MIME types that identify a data file whose URL has no usable extension
pub const DATA_MIME_HINTS: &[(&str, &str)] = &[
    ("text/csv", ".csv"),
    ("application/vnd.ms-excel", ".xls"),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ".xlsx",
    ),
    ("application/pdf", ".pdf"),
    ("application/zip", ".zip"),
];

/// Which extensions count as data files for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceClassifier {
    /// Longest first, so `.xlsx` is tried before `.xls`
    extensions: Vec<&'static str>,
}

impl ResourceClassifier {
    pub fn new(config: &ResourceConfig) -> Self {
        let mut extensions = DATA_FILE_EXTS.to_vec();
        if config.include_pdf {
            extensions.push(PDF_EXT);
        }
        if config.allow_archives {
            extensions.push(ARCHIVE_EXT);
        }
        extensions.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        Self { extensions }
    }

    /// Returns the data-file extension of a URL, if it has an enabled one
    pub fn classify(&self, url: &Url) -> Option<&'static str> {
        guess_ext_from_url(url, &self.extensions)
    }

    /// Extension implied by a MIME type, if that extension is enabled
    pub fn ext_for_mime(&self, mime: &str) -> Option<&'static str> {
        ext_for_mime(mime).filter(|ext| self.extensions.contains(ext))
    }

    pub fn extensions(&self) -> &[&'static str] {
        &self.extensions
    }
}

/// Matches the lowercased path against each extension
///
/// A path qualifies when it ends with the extension (`/data/file.csv`) or with
/// the bare extension as a final segment (`/document/xlsx`). Trailing slashes
/// are ignored.
pub fn guess_ext_from_url(url: &Url, extensions: &[&'static str]) -> Option<&'static str> {
    let path = url.path().to_lowercase();
    let path = path.trim_end_matches('/');

    extensions.iter().copied().find(|ext| {
        let bare = ext.trim_start_matches('.');
        path.ends_with(ext) || path.ends_with(&format!("/{}", bare))
    })
}

/// Extension for a known data-file MIME type
pub fn ext_for_mime(mime: &str) -> Option<&'static str> {
    DATA_MIME_HINTS
        .iter()
        .find(|(hint, _)| hint.eq_ignore_ascii_case(mime.trim()))
        .map(|(_, ext)| *ext)
}

/// A data-file link found on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLink {
    pub url: Url,
    pub ext: &'static str,
    pub anchor_text: String,
}

/// Links discovered on one page
#[derive(Debug, Clone, Default)]
pub struct DiscoveredLinks {
    /// Candidate pages, normalized, in document order, without duplicates
    pub pages: Vec<Url>,

    /// Data files, one per anchor in document order
    pub resources: Vec<ResourceLink>,
}

/// Extracts all links from a parsed page
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document, `download` links included
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs and fragment-only links
/// - Anything that is not HTTP(S) after resolution
///
/// Links whose path carries an enabled data-file extension become resource
/// links and are never followed as pages.
///
/// # Arguments
///
/// * `document` - The parsed page
/// * `base_url` - The page's final URL, for resolving relative links
/// * `classifier` - Enabled data-file extensions
pub fn discover_links(
    document: &Html,
    base_url: &Url,
    classifier: &ResourceClassifier,
) -> DiscoveredLinks {
    let mut links = DiscoveredLinks::default();
    let mut seen_pages = HashSet::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            let Some(url) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_link(href, base_url))
            else {
                continue;
            };

            match classifier.classify(&url) {
                Some(ext) => links.resources.push(ResourceLink {
                    url,
                    ext,
                    anchor_text: joined_text(element),
                }),
                None => {
                    if seen_pages.insert(url.to_string()) {
                        links.pages.push(url);
                    }
                }
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in document.select(&canonical_selector) {
            let Some(url) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_link(href, base_url))
            else {
                continue;
            };
            if classifier.classify(&url).is_none() && seen_pages.insert(url.to_string()) {
                links.pages.push(url);
            }
        }
    }

    links
}

/// Resolves and normalizes a link href
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    try_normalize_url(href, Some(base_url)).ok()
}
