//! Page extraction module
//!
//! Turns a parsed HTML document into the fields the output records need:
//! title, description, tags, visible text, and a best-guess collection date.
//! Every extractor is infallible; a malformed source is skipped and the
//! others still contribute.

mod dates;
mod metadata;
mod text;

pub use dates::{extract_collected_date, latest_date, CollectedDate};
pub use metadata::{extract_description, extract_tags, extract_title, MAX_TAGS};
pub(crate) use metadata::joined_text;
pub use text::visible_text;

use scraper::Html;

/// Everything extracted from one HTML page
#[derive(Debug, Clone, Default)]
pub struct ExtractedPage {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub text: String,
    pub collected_date: Option<CollectedDate>,
}

/// Runs every extractor over a parsed document
pub fn extract_page(document: &Html) -> ExtractedPage {
    let title = extract_title(document);
    let description = extract_description(document);
    let tags = extract_tags(document);
    let text = visible_text(document);
    let collected_date = extract_collected_date(document, &title, &description);

    ExtractedPage {
        title,
        description,
        tags,
        text,
        collected_date,
    }
}
