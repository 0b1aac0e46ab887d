//! Collected-date heuristics
//!
//! Statistical pages rarely carry a machine-readable "data as at" field, so
//! candidate dates are scraped from the title, description, date-like meta
//! tags, `<time>` elements, and any text near words such as "published" or
//! "year ending". The most recent plausible candidate wins.

use chrono::{Datelike, NaiveDate, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::OnceLock;

use super::metadata::meta_contents;

/// Earliest year accepted as a collection date
pub const MIN_YEAR: i32 = 1990;

const DATE_META_NAMES: &[&str] = &[
    "date",
    "publication-date",
    "created",
    "modified",
    "dc.date",
    "dcterms.created",
    "dcterms.modified",
];

const MONTHS: &str =
    "January|February|March|April|May|June|July|August|September|October|November|December";

/// A date with year, optional month and optional day precision
///
/// Ordering treats a missing month or day as earlier than any present one,
/// so `2023` < `2023-01` < `2023-01-01` < `2024`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectedDate {
    year: i32,
    month: Option<u32>,
    day: Option<u32>,
}

impl CollectedDate {
    pub fn year_only(year: i32) -> Self {
        Self {
            year,
            month: None,
            day: None,
        }
    }

    /// Year and month, rejected if the month is out of range
    pub fn year_month(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self {
            year,
            month: Some(month),
            day: None,
        })
    }

    /// Full calendar date, rejected if it does not exist
    pub fn ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(|_| Self {
            year,
            month: Some(month),
            day: Some(day),
        })
    }
}

impl fmt::Display for CollectedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.month, self.day) {
            (Some(m), Some(d)) => write!(f, "{:04}-{:02}-{:02}", self.year, m, d),
            (Some(m), None) => write!(f, "{:04}-{:02}", self.year, m),
            _ => write!(f, "{:04}", self.year),
        }
    }
}

impl Serialize for CollectedDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct DatePatterns {
    iso: Regex,
    day_first: Regex,
    day_month_name: Regex,
    month_name: Regex,
    bare_year: Regex,
    keywords: Regex,
}

static PATTERNS: OnceLock<Option<DatePatterns>> = OnceLock::new();

fn patterns() -> Option<&'static DatePatterns> {
    PATTERNS
        .get_or_init(|| {
            Some(DatePatterns {
                iso: Regex::new(r"\b(\d{4})([-/])(\d{1,2})([-/])(\d{1,2})\b").ok()?,
                day_first: Regex::new(r"\b(\d{1,2})([-/])(\d{1,2})([-/])(\d{4})\b").ok()?,
                day_month_name: Regex::new(&format!(r"(?i)\b(\d{{1,2}})\s+({})\s+(\d{{4}})\b", MONTHS))
                    .ok()?,
                month_name: Regex::new(&format!(r"(?i)\b({})\s+(\d{{4}})\b", MONTHS)).ok()?,
                bare_year: Regex::new(r"\b(\d{4})\b").ok()?,
                keywords: Regex::new(
                    r"(?i)(published|updated|created|collected|as at|data from|year ending)",
                )
                .ok()?,
            })
        })
        .as_ref()
}

/// Finds the most recent plausible collection date on a page
///
/// # Arguments
///
/// * `document` - Parsed page
/// * `title` - Already-extracted page title
/// * `description` - Already-extracted page description
pub fn extract_collected_date(
    document: &Html,
    title: &str,
    description: &str,
) -> Option<CollectedDate> {
    let current_year = Utc::now().year();
    let sources = date_sources(document, title, description);
    latest_date(sources.iter().map(String::as_str), current_year)
}

/// Returns the latest date in `[MIN_YEAR, current_year + 1]` found in any source text
pub fn latest_date<'a, I>(sources: I, current_year: i32) -> Option<CollectedDate>
where
    I: IntoIterator<Item = &'a str>,
{
    let p = patterns()?;
    let window = MIN_YEAR..=current_year + 1;

    sources
        .into_iter()
        .flat_map(|text| candidates(p, text))
        .filter(|d| window.contains(&d.year))
        .max()
}

/// Every date candidate the patterns recognise in one text
fn candidates(p: &DatePatterns, text: &str) -> Vec<CollectedDate> {
    let mut found = Vec::new();
    let num = |s: &str| s.parse::<u32>().ok();

    for caps in p.iso.captures_iter(text) {
        // Mixed separators such as 2021-03/04 are not dates
        if caps[2] != caps[4] {
            continue;
        }
        if let (Ok(y), Some(m), Some(d)) = (caps[1].parse::<i32>(), num(&caps[3]), num(&caps[5])) {
            found.extend(CollectedDate::ymd(y, m, d));
        }
    }

    for caps in p.day_first.captures_iter(text) {
        if caps[2] != caps[4] {
            continue;
        }
        if let (Some(d), Some(m), Ok(y)) = (num(&caps[1]), num(&caps[3]), caps[5].parse::<i32>()) {
            found.extend(CollectedDate::ymd(y, m, d));
        }
    }

    for caps in p.day_month_name.captures_iter(text) {
        if let (Some(d), Some(m), Ok(y)) = (num(&caps[1]), month_number(&caps[2]), caps[3].parse::<i32>()) {
            found.extend(CollectedDate::ymd(y, m, d));
        }
    }

    for caps in p.month_name.captures_iter(text) {
        if let (Some(m), Ok(y)) = (month_number(&caps[1]), caps[2].parse::<i32>()) {
            found.extend(CollectedDate::year_month(y, m));
        }
    }

    for caps in p.bare_year.captures_iter(text) {
        if let Ok(y) = caps[1].parse::<i32>() {
            found.push(CollectedDate::year_only(y));
        }
    }

    found
}

fn month_number(name: &str) -> Option<u32> {
    MONTHS
        .split('|')
        .position(|m| m.eq_ignore_ascii_case(name))
        .map(|i| i as u32 + 1)
}

/// Texts that may mention when the data was collected
fn date_sources(document: &Html, title: &str, description: &str) -> Vec<String> {
    let mut sources = vec![title.to_string(), description.to_string()];

    for name in DATE_META_NAMES {
        if let Some(content) = meta_contents(document, name).into_iter().next() {
            sources.push(content);
        }
    }

    if let Ok(selector) = Selector::parse("time") {
        for time in document.select(&selector) {
            if let Some(datetime) = time.value().attr("datetime") {
                sources.push(datetime.to_string());
            }
            sources.push(time.text().collect());
        }
    }

    if let Some(p) = patterns() {
        for node in document.root_element().descendants() {
            let Some(text) = node.value().as_text() else {
                continue;
            };
            if !p.keywords.is_match(text) {
                continue;
            }
            let Some(parent) = node.parent().and_then(ElementRef::wrap) else {
                continue;
            };
            if matches!(parent.value().name(), "script" | "style") {
                continue;
            }
            sources.push(parent.text().collect());
        }
    }

    sources
}

#[cfg(test)]
mod tests {
    use super::*;

    fn latest(texts: &[&str]) -> Option<String> {
        latest_date(texts.iter().copied(), 2025).map(|d| d.to_string())
    }

    #[test]
    fn test_iso_and_day_first() {
        assert_eq!(latest(&["Released 2023-06-30"]), Some("2023-06-30".into()));
        assert_eq!(latest(&["Released 2023/6/3"]), Some("2023-06-03".into()));
        assert_eq!(latest(&["As at 31/12/2022"]), Some("2022-12-31".into()));
    }

    #[test]
    fn test_month_names() {
        assert_eq!(latest(&["June 2024 release"]), Some("2024-06".into()));
        assert_eq!(latest(&["15 march 2021"]), Some("2021-03-15".into()));
    }

    #[test]
    fn test_invalid_calendar_dates_fall_back_to_year() {
        assert_eq!(latest(&["2023-02-30"]), Some("2023".into()));
        assert_eq!(latest(&["31/02/2021"]), Some("2021".into()));
    }

    #[test]
    fn test_year_window() {
        assert_eq!(latest(&["Founded 1901, revised 1989"]), None);
        assert_eq!(latest(&["Projection to 2050"]), None);
        assert_eq!(latest(&["Forecast 2026"]), Some("2026".into()));
    }

    #[test]
    fn test_most_recent_wins() {
        assert_eq!(
            latest(&["Data from 2019-07-01", "Updated March 2021", "2020"]),
            Some("2021-03".into())
        );
        assert_eq!(latest(&["2021", "2021-01-01"]), Some("2021-01-01".into()));
        assert_eq!(latest(&["2022", "2021-12-31"]), Some("2022".into()));
    }

    #[test]
    fn test_no_dates() {
        assert_eq!(latest(&["", "no numbers here"]), None);
    }

    #[test]
    fn test_page_sources() {
        let html = r#"<html><head>
                <title>Regional Population</title>
                <meta name="dcterms.modified" content="2022-08-15">
                <script>var built = "2024-01-01";</script>
            </head><body>
                <p>Some text <time datetime="2021-05-04">4 May 2021</time></p>
                <div><span>Year ending June 2023</span></div>
            </body></html>"#;
        let document = Html::parse_document(html);
        let date = extract_collected_date(&document, "Regional Population", "");
        assert_eq!(date.map(|d| d.to_string()), Some("2023-06".into()));
    }

    #[test]
    fn test_ordering() {
        let y = CollectedDate::year_only(2023);
        let ym = CollectedDate::year_month(2023, 1).unwrap();
        let ymd = CollectedDate::ymd(2023, 1, 1).unwrap();
        assert!(y < ym && ym < ymd && ymd < CollectedDate::year_only(2024));
        assert!(CollectedDate::year_month(2023, 13).is_none());
    }
}
