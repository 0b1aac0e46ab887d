//! Output module for crawl records and run summaries
//!
//! This module handles:
//! - The record shapes of both emission modes
//! - Writing records as JSONL and CSV
//! - Summarizing a finished run

mod records;
mod sinks;
pub mod stats;
mod traits;

pub use records::{
    ChunkRecord, ChunkRow, CrawlRecord, FileHit, PageRecord, SourceType, CHUNK_ROW_COLUMNS,
    FILE_HIT_COLUMNS, TAG_SEPARATOR,
};
pub use sinks::{header_for, open_sinks, output_paths, CsvSink, JsonlSink, MemorySink, TeeSink};
pub use stats::{print_summary, CrawlSummary, StopReason};
pub use traits::{OutputError, OutputResult, RecordSink};
