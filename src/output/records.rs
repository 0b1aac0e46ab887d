//! Record types emitted by a crawl run
//!
//! A run in resource-catalog mode emits one [`FileHit`] per qualifying data-file
//! link. A run in rag-chunks mode emits [`ChunkRow`]s, built from a
//! [`PageRecord`] and the [`ChunkRecord`]s of its text.

use crate::chunker::chunk_text;
use crate::extract::CollectedDate;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

/// Column order of catalog CSV output
pub const FILE_HIT_COLUMNS: &[&str] = &[
    "file_url",
    "file_ext",
    "page_url",
    "page_title",
    "page_description",
    "page_tags",
    "anchor_text",
    "content_type",
    "content_length",
    "discovered_at",
    "data_collected_date",
];

/// Column order of chunk CSV output
pub const CHUNK_ROW_COLUMNS: &[&str] = &[
    "url",
    "final_url",
    "status",
    "content_type",
    "source_type",
    "title",
    "description",
    "chunk_index",
    "chunk_count",
    "chunk_text",
    "depth",
];

/// Separator used when tags are flattened into one CSV cell
pub const TAG_SEPARATOR: &str = "; ";

/// One fetched HTML page
#[derive(Debug, Clone, Serialize)]
pub struct PageRecord {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub collected_date: Option<CollectedDate>,
    pub depth: u32,
}

impl PageRecord {
    /// Splits page text into chunk records with contiguous indices
    pub fn chunks(&self, text: &str, max_chars: usize, overlap: usize) -> Vec<ChunkRecord> {
        let pieces = chunk_text(text, max_chars, overlap);
        let chunk_count = pieces.len();

        pieces
            .into_iter()
            .enumerate()
            .map(|(chunk_index, text)| ChunkRecord {
                source_url: self.url.clone(),
                chunk_index,
                chunk_count,
                text,
            })
            .collect()
    }
}

/// One chunk of a page's visible text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkRecord {
    pub source_url: String,
    pub chunk_index: usize,
    pub chunk_count: usize,
    pub text: String,
}

/// A data file linked from a crawled page, with the page as context
#[derive(Debug, Clone, Serialize)]
pub struct FileHit {
    pub file_url: String,
    pub file_ext: String,
    pub page_url: String,
    pub page_title: String,
    pub page_description: String,
    #[serde(rename = "page_tags")]
    pub tags: Vec<String>,
    pub anchor_text: String,
    pub content_type: String,
    pub content_length: Option<u64>,
    #[serde(serialize_with = "serialize_timestamp")]
    pub discovered_at: DateTime<Utc>,
    #[serde(rename = "data_collected_date")]
    pub collected_date: Option<CollectedDate>,
}

impl FileHit {
    /// Builds a hit for `file_url`, taking page context from the linking page
    ///
    /// A file reached directly as a seed has no linking page; its context
    /// columns stay empty.
    pub fn from_page(
        page: Option<&PageRecord>,
        file_url: String,
        file_ext: &str,
        anchor_text: String,
        content_type: &str,
        content_length: Option<u64>,
        discovered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            file_url,
            file_ext: file_ext.to_string(),
            page_url: page.map(|p| p.url.clone()).unwrap_or_default(),
            page_title: page.map(|p| p.title.clone()).unwrap_or_default(),
            page_description: page.map(|p| p.description.clone()).unwrap_or_default(),
            tags: page.map(|p| p.tags.clone()).unwrap_or_default(),
            anchor_text,
            content_type: content_type.to_string(),
            content_length,
            discovered_at,
            collected_date: page.and_then(|p| p.collected_date),
        }
    }

    fn csv_fields(&self) -> Vec<String> {
        vec![
            self.file_url.clone(),
            self.file_ext.clone(),
            self.page_url.clone(),
            self.page_title.clone(),
            self.page_description.clone(),
            self.tags.join(TAG_SEPARATOR),
            self.anchor_text.clone(),
            self.content_type.clone(),
            optional(self.content_length),
            format_timestamp(&self.discovered_at),
            optional(self.collected_date),
        ]
    }
}

/// Where a chunk row came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    /// A fetched HTML page
    Html,
    /// A data-file link recorded without download
    Binary,
    /// A frontier URL that answered with a non-HTML body
    NonHtml,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Html => "html",
            SourceType::Binary => "binary",
            SourceType::NonHtml => "non-html",
        }
    }
}

/// One row of rag-chunks output
///
/// Rows for resources and non-HTML responses leave status and chunk
/// fields empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkRow {
    pub url: String,
    pub final_url: String,
    pub status: Option<u16>,
    pub content_type: String,
    pub source_type: SourceType,
    pub title: String,
    pub description: String,
    pub chunk_index: Option<usize>,
    pub chunk_count: Option<usize>,
    pub chunk_text: String,
    pub depth: u32,
}

impl ChunkRow {
    /// Row carrying one chunk of an HTML page
    pub fn from_chunk(page: &PageRecord, chunk: &ChunkRecord) -> Self {
        Self {
            chunk_index: Some(chunk.chunk_index),
            chunk_count: Some(chunk.chunk_count),
            chunk_text: chunk.text.clone(),
            ..Self::html(page)
        }
    }

    /// The single row written for an HTML page with no extractable text
    pub fn empty_page(page: &PageRecord) -> Self {
        Self {
            chunk_index: Some(0),
            chunk_count: Some(0),
            ..Self::html(page)
        }
    }

    /// Row for a data-file link, recorded without fetching it
    pub fn binary(url: &str, depth: u32) -> Self {
        Self {
            url: url.to_string(),
            final_url: url.to_string(),
            status: None,
            content_type: "binary".to_string(),
            source_type: SourceType::Binary,
            title: String::new(),
            description: String::new(),
            chunk_index: None,
            chunk_count: None,
            chunk_text: String::new(),
            depth,
        }
    }

    /// Row for a frontier URL that answered with something other than HTML
    pub fn non_html(url: &str, final_url: &str, status: u16, content_type: &str, depth: u32) -> Self {
        Self {
            url: url.to_string(),
            final_url: final_url.to_string(),
            status: Some(status),
            content_type: content_type.to_string(),
            source_type: SourceType::NonHtml,
            title: String::new(),
            description: String::new(),
            chunk_index: None,
            chunk_count: None,
            chunk_text: String::new(),
            depth,
        }
    }

    fn html(page: &PageRecord) -> Self {
        Self {
            url: page.url.clone(),
            final_url: page.final_url.clone(),
            status: Some(page.status),
            content_type: page.content_type.clone(),
            source_type: SourceType::Html,
            title: page.title.clone(),
            description: page.description.clone(),
            chunk_index: None,
            chunk_count: None,
            chunk_text: String::new(),
            depth: page.depth,
        }
    }

    fn csv_fields(&self) -> Vec<String> {
        vec![
            self.url.clone(),
            self.final_url.clone(),
            optional(self.status),
            self.content_type.clone(),
            self.source_type.as_str().to_string(),
            self.title.clone(),
            self.description.clone(),
            optional(self.chunk_index),
            optional(self.chunk_count),
            self.chunk_text.clone(),
            self.depth.to_string(),
        ]
    }
}

/// Any record a sink can receive
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CrawlRecord {
    File(FileHit),
    Chunk(ChunkRow),
}

impl CrawlRecord {
    /// Field values in CSV column order
    pub fn csv_fields(&self) -> Vec<String> {
        match self {
            CrawlRecord::File(hit) => hit.csv_fields(),
            CrawlRecord::Chunk(row) => row.csv_fields(),
        }
    }

    pub fn as_file(&self) -> Option<&FileHit> {
        match self {
            CrawlRecord::File(hit) => Some(hit),
            CrawlRecord::Chunk(_) => None,
        }
    }

    pub fn as_chunk(&self) -> Option<&ChunkRow> {
        match self {
            CrawlRecord::Chunk(row) => Some(row),
            CrawlRecord::File(_) => None,
        }
    }
}

impl From<FileHit> for CrawlRecord {
    fn from(hit: FileHit) -> Self {
        CrawlRecord::File(hit)
    }
}

impl From<ChunkRow> for CrawlRecord {
    fn from(row: ChunkRow) -> Self {
        CrawlRecord::Chunk(row)
    }
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_timestamp(ts))
}
