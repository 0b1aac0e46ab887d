//! Output sink trait and error types

use super::records::CrawlRecord;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to write output: {0}")]
    Write(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Destination for crawl records
///
/// The coordinator is the only writer, so sinks need no internal locking.
/// Records already written must survive a later failure, which is why the
/// coordinator calls [`RecordSink::flush`] after every completed batch.
pub trait RecordSink: Send {
    /// Appends one record
    fn write(&mut self, record: &CrawlRecord) -> OutputResult<()>;

    /// Pushes buffered records to the underlying stream
    fn flush(&mut self) -> OutputResult<()>;
}

impl<S: RecordSink + ?Sized> RecordSink for Box<S> {
    fn write(&mut self, record: &CrawlRecord) -> OutputResult<()> {
        (**self).write(record)
    }

    fn flush(&mut self) -> OutputResult<()> {
        (**self).flush()
    }
}
