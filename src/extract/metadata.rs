//! Title, description and tag extraction

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Description fallback length when no meta description exists
pub const DESCRIPTION_FALLBACK_CHARS: usize = 500;

/// Global cap on tags per page
pub const MAX_TAGS: usize = 8;

/// Meta keywords contribute at most this many tags
const MAX_KEYWORD_TAGS: usize = 5;

/// Lower-priority sources are consulted only while the page has fewer tags than this
const SECONDARY_SOURCE_THRESHOLD: usize = 6;

const MIN_TAG_CHARS: usize = 2;
const MAX_TAG_CHARS: usize = 50;

/// Returns the text of the first non-empty `<title>`, whitespace-collapsed and entity-decoded
pub fn extract_title(document: &Html) -> String {
    let Ok(selector) = Selector::parse("title") else {
        return String::new();
    };

    document
        .select(&selector)
        .map(|el| clean_text(&el.text().collect::<String>()))
        .find(|title| !title.is_empty())
        .unwrap_or_default()
}

/// Returns the page description
///
/// Sources in order: meta `description`, `og:description`, `twitter:description`,
/// then the first paragraph truncated to [`DESCRIPTION_FALLBACK_CHARS`].
pub fn extract_description(document: &Html) -> String {
    for key in ["description", "og:description", "twitter:description"] {
        if let Some(content) = meta_contents(document, key).into_iter().next() {
            return content;
        }
    }

    let Ok(selector) = Selector::parse("p") else {
        return String::new();
    };

    document
        .select(&selector)
        .next()
        .map(|p| {
            clean_text(&joined_text(p))
                .chars()
                .take(DESCRIPTION_FALLBACK_CHARS)
                .collect()
        })
        .unwrap_or_default()
}

/// Ordered, case-insensitively deduplicated tag list with length bounds
#[derive(Debug, Default, Clone)]
pub struct TagSet {
    tags: Vec<String>,
}

impl TagSet {
    /// Adds candidates until the set holds `cap` tags
    fn add_all<I, S>(&mut self, candidates: I, cap: usize)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for candidate in candidates {
            let tag = clean_text(candidate.as_ref());
            let len = tag.chars().count();
            if len < MIN_TAG_CHARS || len > MAX_TAG_CHARS || self.tags.len() >= cap {
                continue;
            }
            let lower = tag.to_lowercase();
            if self.tags.iter().any(|t| t.to_lowercase() == lower) {
                continue;
            }
            self.tags.push(tag);
        }
    }

    fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.tags
    }
}

/// Collects tags from meta keywords, Dublin Core subjects, `article:tag` and JSON-LD keywords
pub fn extract_tags(document: &Html) -> Vec<String> {
    let mut tags = TagSet::default();

    if let Some(keywords) = meta_contents(document, "keywords").into_iter().next() {
        tags.add_all(split_keywords(&keywords), MAX_KEYWORD_TAGS);
    }

    for key in ["dcterms.subject", "dc.subject"] {
        for subject in meta_contents(document, key) {
            if tags.len() < MAX_TAGS {
                tags.add_all([subject], MAX_TAGS);
            }
        }
    }

    if tags.len() < SECONDARY_SOURCE_THRESHOLD {
        for tag in meta_contents(document, "article:tag") {
            if tags.len() < MAX_TAGS {
                tags.add_all([tag], MAX_TAGS);
            }
        }
    }

    if tags.len() < SECONDARY_SOURCE_THRESHOLD {
        for keywords in json_ld_keywords(document) {
            if tags.len() >= MAX_TAGS {
                break;
            }
            tags.add_all(keywords, MAX_TAGS);
        }
    }

    tags.into_vec()
}

/// Keyword lists from every JSON-LD block, one list per object carrying `keywords`
///
/// Blocks that fail to parse are skipped.
fn json_ld_keywords(document: &Html) -> Vec<Vec<String>> {
    let Ok(selector) = Selector::parse("script[type='application/ld+json']") else {
        return Vec::new();
    };

    let mut lists = Vec::new();
    for script in document.select(&selector) {
        let raw = script.text().collect::<String>();
        let value: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                debug!("Skipping malformed JSON-LD block: {}", e);
                continue;
            }
        };

        let items = match value {
            serde_json::Value::Array(items) => items,
            other => vec![other],
        };

        for item in items {
            let Some(keywords) = item.as_object().and_then(|obj| obj.get("keywords")) else {
                continue;
            };
            match keywords {
                serde_json::Value::String(s) => lists.push(split_keywords(s)),
                serde_json::Value::Array(values) => lists.push(
                    values
                        .iter()
                        .filter_map(|v| match v {
                            serde_json::Value::String(s) => Some(s.trim().to_string()),
                            serde_json::Value::Number(n) => Some(n.to_string()),
                            _ => None,
                        })
                        .filter(|s| !s.is_empty())
                        .collect(),
                ),
                _ => {}
            }
        }
    }
    lists
}

/// All non-empty `content` values of `<meta>` tags whose `name` or `property` equals `key`
///
/// Comparison is ASCII case-insensitive; values are trimmed and entity-decoded.
pub(crate) fn meta_contents(document: &Html, key: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse("meta[content]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter(|meta| {
            let el = meta.value();
            [el.attr("name"), el.attr("property")]
                .into_iter()
                .flatten()
                .any(|n| n.trim().eq_ignore_ascii_case(key))
        })
        .filter_map(|meta| meta.value().attr("content"))
        .map(clean_text)
        .filter(|c| !c.is_empty())
        .collect()
}

fn split_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Text nodes of an element, each trimmed, joined with single spaces
pub(crate) fn joined_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decodes entities left in the text and collapses whitespace runs to one space
pub(crate) fn clean_text(raw: &str) -> String {
    let decoded = html_escape::decode_html_entities(raw);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}
