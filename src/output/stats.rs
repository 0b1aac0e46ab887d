//! Run summary
//!
//! The coordinator fills a [`CrawlSummary`] as entries reach terminal states;
//! the CLI prints it once the run ends.

use crate::config::EmissionMode;
use crate::state::EntryState;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Why a run stopped dispatching new work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    /// Nothing left to crawl
    #[default]
    FrontierExhausted,
    /// `max-pages` HTML pages were processed
    PageCapReached,
    /// `max-files` file records were emitted
    FileCapReached,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StopReason::FrontierExhausted => "frontier exhausted",
            StopReason::PageCapReached => "page cap reached",
            StopReason::FileCapReached => "file cap reached",
        })
    }
}

/// Counters collected over one crawl run
#[derive(Debug, Clone, Default)]
pub struct CrawlSummary {
    pub mode: EmissionMode,
    pub config_hash: Option<String>,
    pub elapsed: Duration,
    pub stop_reason: StopReason,

    /// HTML pages extracted
    pub pages_processed: u64,

    /// File records emitted (catalog mode) or binary rows (rag mode)
    pub files_recorded: u64,

    /// Chunk rows written, including zero-chunk rows
    pub chunk_rows: u64,

    /// Fetches that failed with a network error or error status
    pub fetch_failures: u64,

    /// URLs refused by robots.txt
    pub robots_blocked: u64,

    /// Frontier entries by terminal state
    pub entries_by_state: HashMap<EntryState, u64>,
}

impl CrawlSummary {
    pub fn new(mode: EmissionMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Counts one frontier entry reaching `state`
    pub fn record_entry(&mut self, state: EntryState) {
        *self.entries_by_state.entry(state).or_insert(0) += 1;
    }

    /// Number of entries that reached `state`
    pub fn entries_in(&self, state: EntryState) -> u64 {
        self.entries_by_state.get(&state).copied().unwrap_or(0)
    }

    /// Total frontier entries in terminal states
    pub fn total_terminal_entries(&self) -> u64 {
        self.entries_by_state
            .iter()
            .filter(|(state, _)| state.is_terminal())
            .map(|(_, count)| count)
            .sum()
    }

    /// Percentage of dispatched entries that produced output
    pub fn success_rate(&self) -> f64 {
        let dispatched = self.total_terminal_entries() - self.entries_in(EntryState::Skipped);
        if dispatched == 0 {
            return 0.0;
        }
        let succeeded = self.entries_in(EntryState::HtmlProcessed)
            + self.entries_in(EntryState::ResourceRecorded);
        (succeeded as f64 / dispatched as f64) * 100.0
    }
}

/// Prints a run summary to stdout
pub fn print_summary(summary: &CrawlSummary) {
    println!("=== Harvest Summary ===\n");

    println!("Run:");
    println!(
        "  Mode: {}",
        match summary.mode {
            EmissionMode::ResourceCatalog => "resource-catalog",
            EmissionMode::RagChunks => "rag-chunks",
        }
    );
    if let Some(hash) = &summary.config_hash {
        println!("  Config hash: {}", hash);
    }
    println!("  Elapsed: {:.1}s", summary.elapsed.as_secs_f64());
    println!("  Stopped: {}", summary.stop_reason);
    println!();

    println!("Output:");
    println!("  Pages processed: {}", summary.pages_processed);
    println!("  Files recorded: {}", summary.files_recorded);
    if summary.mode == EmissionMode::RagChunks {
        println!("  Chunk rows: {}", summary.chunk_rows);
    }
    println!();

    if !summary.entries_by_state.is_empty() {
        println!("Entries by State:");
        let mut counts: Vec<_> = summary.entries_by_state.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
        for (state, count) in counts {
            println!("  {}: {}", state, count);
        }
        println!();
    }

    if summary.fetch_failures > 0 || summary.robots_blocked > 0 {
        println!("Problems:");
        println!("  Fetch failures: {}", summary.fetch_failures);
        println!("  Blocked by robots.txt: {}", summary.robots_blocked);
        println!();
    }

    println!("Success Rate: {:.1}%", summary.success_rate());
}
