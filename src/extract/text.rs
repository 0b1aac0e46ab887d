//! Visible text extraction
//!
//! Content-bearing elements are visited in document order. Anything inside
//! scripts, styles, templates, or page chrome (header, footer, nav, aside) is
//! ignored, and an element nested inside another content element contributes
//! only through its outermost content ancestor so text is not repeated.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

/// Elements whose text is never part of the page content
const EXCLUDED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "header", "footer", "nav", "aside",
];

/// Elements whose text forms the page content
const CONTENT_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "li", "dt", "dd", "th", "td",
];

static HORIZONTAL_WS: OnceLock<Option<Regex>> = OnceLock::new();
static BLANK_LINES: OnceLock<Option<Regex>> = OnceLock::new();

/// Extracts the cleaned visible text of a page
///
/// Blocks are joined with newlines, runs of spaces and tabs collapse to a
/// single space, entities are decoded, and three or more consecutive newlines
/// collapse to a blank line.
pub fn visible_text(document: &Html) -> String {
    let Ok(selector) = Selector::parse(&CONTENT_TAGS.join(", ")) else {
        return String::new();
    };

    let blocks: Vec<String> = document
        .select(&selector)
        .filter(|el| !has_ancestor_in(*el, EXCLUDED_TAGS) && !has_ancestor_in(*el, CONTENT_TAGS))
        .map(block_text)
        .filter(|t| !t.is_empty())
        .collect();

    let text = blocks.join("\n");

    let text = match regex(&HORIZONTAL_WS, r"[ \t]+") {
        Some(re) => re.replace_all(&text, " ").into_owned(),
        None => text,
    };
    let text = html_escape::decode_html_entities(&text).into_owned();
    let text = match regex(&BLANK_LINES, r"\n{3,}") {
        Some(re) => re.replace_all(&text, "\n\n").into_owned(),
        None => text,
    };

    text.trim().to_string()
}

/// Text of one content block, skipping excluded descendants
fn block_text(element: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    collect_text(element, &mut parts);
    parts.join(" ")
}

fn collect_text<'a>(element: ElementRef<'a>, parts: &mut Vec<&'a str>) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed);
            }
        } else if let Some(child_el) = ElementRef::wrap(child) {
            if !EXCLUDED_TAGS.contains(&child_el.value().name()) {
                collect_text(child_el, parts);
            }
        }
    }
}

fn has_ancestor_in(element: ElementRef<'_>, names: &[&str]) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| names.contains(&a.value().name()))
}

fn regex(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}
