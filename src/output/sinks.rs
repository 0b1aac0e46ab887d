//! Record sink implementations: JSONL, CSV, in-memory and fan-out

use super::records::{CrawlRecord, CHUNK_ROW_COLUMNS, FILE_HIT_COLUMNS};
use super::traits::{OutputError, OutputResult, RecordSink};
use crate::config::{EmissionMode, OutputConfig, OutputFormat};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;

/// Writes one JSON object per line
pub struct JsonlSink<W: Write> {
    writer: W,
}

impl JsonlSink<BufWriter<File>> {
    /// Creates (or truncates) the file at `path`
    pub fn create(path: &Path) -> OutputResult<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> JsonlSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> RecordSink for JsonlSink<W> {
    fn write(&mut self, record: &CrawlRecord) -> OutputResult<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> OutputResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes CSV rows with a header matching the emission mode
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
}

impl CsvSink<File> {
    /// Creates (or truncates) the file at `path` and writes the header
    pub fn create(path: &Path, mode: EmissionMode) -> OutputResult<Self> {
        let file = File::create(path)?;
        Self::new(file, mode)
    }
}

impl<W: Write> CsvSink<W> {
    pub fn new(writer: W, mode: EmissionMode) -> OutputResult<Self> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(header_for(mode))?;
        Ok(Self { writer })
    }

    pub fn into_inner(self) -> OutputResult<W> {
        self.writer
            .into_inner()
            .map_err(|e| OutputError::Write(e.to_string()))
    }
}

impl<W: Write + Send> RecordSink for CsvSink<W> {
    fn write(&mut self, record: &CrawlRecord) -> OutputResult<()> {
        self.writer.write_record(record.csv_fields())?;
        Ok(())
    }

    fn flush(&mut self) -> OutputResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Column names for a mode's CSV output
pub fn header_for(mode: EmissionMode) -> &'static [&'static str] {
    match mode {
        EmissionMode::ResourceCatalog => FILE_HIT_COLUMNS,
        EmissionMode::RagChunks => CHUNK_ROW_COLUMNS,
    }
}

/// Collects records in memory; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<CrawlRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far
    pub fn records(&self) -> Vec<CrawlRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordSink for MemorySink {
    fn write(&mut self, record: &CrawlRecord) -> OutputResult<()> {
        self.records
            .lock()
            .map_err(|_| OutputError::Write("memory sink lock poisoned".to_string()))?
            .push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> OutputResult<()> {
        Ok(())
    }
}

/// Sends every record to each inner sink in turn
#[derive(Default)]
pub struct TeeSink {
    sinks: Vec<Box<dyn RecordSink>>,
}

impl TeeSink {
    pub fn new(sinks: Vec<Box<dyn RecordSink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Box<dyn RecordSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl RecordSink for TeeSink {
    fn write(&mut self, record: &CrawlRecord) -> OutputResult<()> {
        for sink in &mut self.sinks {
            sink.write(record)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> OutputResult<()> {
        for sink in &mut self.sinks {
            sink.flush()?;
        }
        Ok(())
    }
}

/// Output file paths for a configured prefix and format
pub fn output_paths(config: &OutputConfig) -> Vec<PathBuf> {
    let with_ext = |ext: &str| PathBuf::from(format!("{}.{}", config.path, ext));
    match config.format {
        OutputFormat::Jsonl => vec![with_ext("jsonl")],
        OutputFormat::Csv => vec![with_ext("csv")],
        OutputFormat::Both => vec![with_ext("csv"), with_ext("jsonl")],
    }
}

/// Opens the file sinks selected by the output configuration
///
/// Failure to create any file is fatal for the run.
pub fn open_sinks(config: &OutputConfig, mode: EmissionMode) -> OutputResult<TeeSink> {
    let mut tee = TeeSink::default();

    for path in output_paths(config) {
        let is_csv = path.extension().is_some_and(|ext| ext == "csv");
        if is_csv {
            tee.push(Box::new(CsvSink::create(&path, mode)?));
        } else {
            tee.push(Box::new(JsonlSink::create(&path)?));
        }
        info!("Writing records to {}", path.display());
    }

    Ok(tee)
}
