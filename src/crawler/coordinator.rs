//! Crawler coordinator - main crawl orchestration logic
//!
//! A single loop owns the frontier and the output sink. It dispatches frontier
//! entries to a bounded set of fetch tasks, and as tasks complete it writes
//! their records, queues the links they found, and re-checks the run caps.
//!
//! Fetch tasks share the robots cache, the politeness throttle and the probe
//! cache through [`CrawlContext`]. Each of those locks per key (origin, host,
//! file URL), so tasks working on different hosts never wait on each other.

use crate::config::{ChunkingConfig, Config, EmissionMode};
use crate::crawler::fetcher::{
    build_http_client, mime_type, FetchResult, HttpFetcher, PageFetcher,
};
use crate::crawler::parser::{discover_links, DiscoveredLinks, ResourceClassifier, ResourceLink};
use crate::crawler::scheduler::{Frontier, FrontierEntry};
use crate::extract::{extract_page, ExtractedPage};
use crate::output::{
    ChunkRow, CrawlRecord, CrawlSummary, FileHit, PageRecord, RecordSink, SourceType, StopReason,
};
use crate::robots::RobotsCache;
use crate::state::{effective_delay, EntryState, PolitenessThrottle};
use crate::url::{host_key, try_normalize_url, ScopeFilter};
use crate::{HarvestError, Result};
use chrono::Utc;
use dashmap::DashMap;
use scraper::Html;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};
use url::Url;

/// State shared by every fetch task of one run
struct CrawlContext {
    fetcher: Arc<dyn PageFetcher>,
    robots: RobotsCache,
    throttle: PolitenessThrottle,
    scope: ScopeFilter,
    classifier: ResourceClassifier,
    mode: EmissionMode,
    chunking: ChunkingConfig,
    delay: Duration,
    max_files: usize,

    /// File records reserved so far; never exceeds `max_files`
    files_reserved: AtomicUsize,

    /// One probe per resource URL per run, shared by every page linking it
    probes: DashMap<String, Arc<OnceCell<FetchResult>>>,

    /// Resource URLs already written as binary rows
    binary_rows: DashMap<String, ()>,
}

impl CrawlContext {
    fn new(
        config: &Config,
        fetcher: Arc<dyn PageFetcher>,
        robots: RobotsCache,
        scope: ScopeFilter,
    ) -> Self {
        Self {
            fetcher,
            robots,
            throttle: PolitenessThrottle::new(),
            scope,
            classifier: ResourceClassifier::new(&config.resources),
            mode: config.crawler.mode,
            chunking: config.chunking.clone(),
            delay: Duration::from_millis(config.crawler.per_host_delay_ms),
            max_files: config.crawler.max_files,
            files_reserved: AtomicUsize::new(0),
            probes: DashMap::new(),
            binary_rows: DashMap::new(),
        }
    }

    fn files_reserved(&self) -> usize {
        self.files_reserved.load(Ordering::SeqCst)
    }

    fn file_cap_reached(&self) -> bool {
        self.files_reserved() >= self.max_files
    }

    /// Claims one file slot, returning its 1-based number
    fn reserve_file(&self) -> Option<usize> {
        self.files_reserved
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.max_files).then_some(n + 1)
            })
            .ok()
            .map(|previous| previous + 1)
    }

    /// Waits for the politeness turn of the URL's host
    async fn await_turn(&self, url: &Url) {
        let Some(host) = host_key(url) else {
            return;
        };
        let delay = effective_delay(self.delay, self.robots.crawl_delay(url).await);
        self.throttle.await_turn(&host, delay).await;
    }

    /// Probes a resource once per run, behind its own robots check and politeness gate
    async fn probe_once(&self, url: &Url) -> FetchResult {
        let cell = self.probes.entry(url.to_string()).or_default().clone();
        cell.get_or_init(|| async {
            self.await_turn(url).await;
            self.fetcher.probe(url).await
        })
        .await
        .clone()
    }
}

/// What one fetch task produced
#[derive(Debug)]
struct EntryOutcome {
    entry: FrontierEntry,
    state: EntryState,
    records: Vec<CrawlRecord>,

    /// The extracted page, for HTML entries
    page: Option<Arc<PageRecord>>,

    /// In-scope page links, already normalized
    links: Vec<Url>,

    /// A response was received for the entry's own URL
    responded: bool,
    fetch_failures: u64,
    robots_blocked: u64,
    files: u64,
    chunk_rows: u64,
}

impl EntryOutcome {
    fn new(entry: FrontierEntry) -> Self {
        Self {
            entry,
            state: EntryState::Failed,
            records: Vec::new(),
            page: None,
            links: Vec::new(),
            responded: false,
            fetch_failures: 0,
            robots_blocked: 0,
            files: 0,
            chunk_rows: 0,
        }
    }

    fn finish(mut self, state: EntryState) -> Self {
        self.state = state;
        self
    }

    fn push_file(&mut self, hit: FileHit) {
        self.files += 1;
        self.records.push(hit.into());
    }

    fn push_chunk_row(&mut self, row: ChunkRow) {
        if row.source_type == SourceType::Binary {
            self.files += 1;
        } else {
            self.chunk_rows += 1;
        }
        self.records.push(row.into());
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    ctx: Arc<CrawlContext>,
    frontier: Frontier,
    sink: Box<dyn RecordSink>,
    summary: CrawlSummary,
    seeds: Vec<Url>,
    concurrency: usize,
    max_pages: usize,
}

impl Coordinator {
    /// Creates a coordinator that fetches over plain HTTP
    ///
    /// # Arguments
    ///
    /// * `config` - The run configuration; validated here
    /// * `sink` - Destination for emitted records
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(HarvestError)` - Invalid configuration or HTTP client failure
    pub fn new(config: Config, sink: Box<dyn RecordSink>) -> Result<Self> {
        let client = build_http_client(&config)?;
        let fetcher = Arc::new(HttpFetcher::new(client.clone()));
        Self::build(config, client, fetcher, sink)
    }

    /// Creates a coordinator around a caller-supplied fetcher
    ///
    /// robots.txt is still fetched over plain HTTP.
    pub fn with_fetcher(
        config: Config,
        fetcher: Arc<dyn PageFetcher>,
        sink: Box<dyn RecordSink>,
    ) -> Result<Self> {
        let client = build_http_client(&config)?;
        Self::build(config, client, fetcher, sink)
    }

    fn build(
        config: Config,
        client: reqwest::Client,
        fetcher: Arc<dyn PageFetcher>,
        sink: Box<dyn RecordSink>,
    ) -> Result<Self> {
        crate::config::validate(&config)?;

        let seeds = config
            .scope
            .seeds
            .iter()
            .map(|seed| try_normalize_url(seed, None))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let scope = ScopeFilter::new(&config.scope, &seeds);
        let robots = RobotsCache::new(client, config.user_agent.robots_token());
        let ctx = Arc::new(CrawlContext::new(&config, fetcher, robots, scope));

        let mut frontier = Frontier::new(config.crawler.max_depth, config.crawler.max_pages);
        frontier.seed(seeds.iter().cloned());

        info!(
            "Scope: {} (same-domain-only: {})",
            ctx.scope.allowed_domains().join(", "),
            config.scope.same_domain_only
        );

        Ok(Self {
            ctx,
            frontier,
            sink,
            summary: CrawlSummary::new(config.crawler.mode),
            seeds,
            concurrency: config.crawler.concurrency.max(1),
            max_pages: config.crawler.max_pages,
        })
    }

    /// Records the configuration hash in the run summary
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.summary.config_hash = Some(hash.into());
        self
    }

    /// Runs the crawl to completion
    ///
    /// Dispatch stops when the frontier is empty or a cap is reached; tasks
    /// already in flight always finish and their records are written.
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlSummary)` - Counters and stop reason of the run
    /// * `Err(HarvestError)` - The sink failed, or no seed could be fetched
    pub async fn run(mut self) -> Result<CrawlSummary> {
        let started = Instant::now();
        let mut tasks: JoinSet<EntryOutcome> = JoinSet::new();
        let mut seeds_attempted = 0u64;
        let mut seeds_responded = 0u64;

        info!(
            "Starting harvest: {} seed(s), mode {:?}",
            self.seeds.len(),
            self.ctx.mode
        );

        let stop_reason = loop {
            let mut blocked = None;

            while tasks.len() < self.concurrency {
                if let Some(reason) = self.cap_reached(tasks.len()) {
                    blocked = Some(reason);
                    break;
                }
                let Some(entry) = self.frontier.pop() else {
                    break;
                };
                if let Some(entry) = self.admit(entry) {
                    let ctx = Arc::clone(&self.ctx);
                    tasks.spawn(process_entry(ctx, entry));
                }
            }

            if tasks.is_empty() {
                break blocked.unwrap_or_default();
            }

            // Apply one completion batch: the first finished task plus any others already done
            let Some(joined) = tasks.join_next().await else {
                continue;
            };
            let mut batch = vec![joined];
            while let Some(joined) = tasks.try_join_next() {
                batch.push(joined);
            }

            for joined in batch {
                let Some(outcome) = self.complete(joined)? else {
                    continue;
                };
                // Seeds skipped by robots.txt were never requested
                if outcome.entry.depth == 0 && outcome.state != EntryState::Skipped {
                    seeds_attempted += 1;
                    if outcome.responded {
                        seeds_responded += 1;
                    }
                }
            }
            self.sink.flush()?;
        };

        self.sink.flush()?;

        self.summary.stop_reason = stop_reason;
        self.summary.elapsed = started.elapsed();

        info!(
            "Harvest finished ({}): {} pages, {} files, {} chunk rows in {:?}",
            stop_reason,
            self.summary.pages_processed,
            self.summary.files_recorded,
            self.summary.chunk_rows,
            self.summary.elapsed
        );

        if seeds_attempted > 0 && seeds_responded == 0 {
            return Err(HarvestError::SeedsUnreachable {
                seeds: self.seeds.iter().map(Url::to_string).collect(),
            });
        }

        Ok(self.summary)
    }

    /// Returns the cap that forbids another dispatch, if any
    fn cap_reached(&self, in_flight: usize) -> Option<StopReason> {
        if self.ctx.file_cap_reached() {
            return Some(StopReason::FileCapReached);
        }
        // In-flight entries may each become a page
        if self.summary.pages_processed as usize + in_flight >= self.max_pages {
            return Some(StopReason::PageCapReached);
        }
        None
    }

    /// Gates an entry before dispatch: visited, then scope
    fn admit(&mut self, entry: FrontierEntry) -> Option<FrontierEntry> {
        if !self.frontier.mark_visited(&entry.url) {
            trace_skip(&entry, "already visited");
            self.summary.record_entry(EntryState::Skipped);
            return None;
        }

        if !self.ctx.scope.is_in_scope(&entry.url) {
            trace_skip(&entry, "out of scope");
            self.summary.record_entry(EntryState::Skipped);
            return None;
        }

        match EntryState::Queued.transition(EntryState::Dispatched) {
            Ok(_) => Some(entry),
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    /// Writes a finished task's records and queues its links
    fn complete(
        &mut self,
        joined: std::result::Result<EntryOutcome, JoinError>,
    ) -> Result<Option<EntryOutcome>> {
        let mut outcome = match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Fetch task failed: {}", e);
                self.summary.record_entry(EntryState::Failed);
                return Ok(None);
            }
        };

        match EntryState::Dispatched.transition(outcome.state) {
            Ok(state) => self.summary.record_entry(state),
            Err(e) => warn!("{} for {}", e, outcome.entry.url),
        }

        for record in &outcome.records {
            self.sink.write(record)?;
        }

        self.summary.files_recorded += outcome.files;
        self.summary.chunk_rows += outcome.chunk_rows;
        self.summary.fetch_failures += outcome.fetch_failures;
        self.summary.robots_blocked += outcome.robots_blocked;

        if let Some(page) = outcome.page.clone() {
            self.summary.pages_processed += 1;
            info!(
                "OK ({}/{}) {}  chunks={} depth={}",
                self.summary.pages_processed,
                self.max_pages,
                page.url,
                outcome.chunk_rows,
                page.depth
            );

            for link in std::mem::take(&mut outcome.links) {
                if let Err(reason) = self.frontier.push_discovered(link, &page) {
                    debug!("Not queued ({:?}) from {}", reason, page.url);
                }
            }
        }

        Ok(Some(outcome))
    }
}

fn trace_skip(entry: &FrontierEntry, reason: &str) {
    debug!(
        "SKIP ({}) {} from {}",
        reason,
        entry.url,
        entry.origin_url().unwrap_or("seed")
    );
}

/// Runs one dispatched entry: robots, politeness, fetch, then branch on content type
async fn process_entry(ctx: Arc<CrawlContext>, entry: FrontierEntry) -> EntryOutcome {
    let url = entry.url.clone();
    let mut outcome = EntryOutcome::new(entry);

    if !ctx.robots.is_allowed(&url).await {
        info!("ROBOTS blocked: {}", url);
        outcome.robots_blocked += 1;
        return outcome.finish(EntryState::Skipped);
    }

    ctx.await_turn(&url).await;

    match ctx.fetcher.fetch(&url).await {
        FetchResult::Page {
            final_url,
            status,
            content_type,
            body,
        } => {
            outcome.responded = true;
            process_page(&ctx, outcome, final_url, status, content_type, body).await
        }

        FetchResult::Metadata {
            final_url,
            status,
            content_type,
            content_length,
        } => {
            outcome.responded = true;
            let content_type = content_type.unwrap_or_default();
            record_non_html(&ctx, outcome, &final_url, status, &content_type, content_length)
        }

        failure => {
            outcome.responded = matches!(failure, FetchResult::HttpError { .. });
            warn!("FAILED ({}) {}", failure.describe(), url);
            outcome.fetch_failures += 1;
            outcome.finish(EntryState::Failed)
        }
    }
}

/// A frontier URL that answered with something other than HTML
fn record_non_html(
    ctx: &CrawlContext,
    mut outcome: EntryOutcome,
    final_url: &str,
    status: u16,
    content_type: &str,
    content_length: Option<u64>,
) -> EntryOutcome {
    let url = outcome.entry.url.to_string();

    match ctx.mode {
        EmissionMode::RagChunks => {
            debug!("NON-HTML ({} {}) {}", status, content_type, url);
            outcome.push_chunk_row(ChunkRow::non_html(
                &url,
                final_url,
                status,
                content_type,
                outcome.entry.depth,
            ));
            outcome.finish(EntryState::ResourceRecorded)
        }
        EmissionMode::ResourceCatalog => {
            let Some(ext) = ctx.classifier.ext_for_mime(content_type) else {
                debug!("SKIP ({} {}) {}", status, content_type, url);
                return outcome.finish(EntryState::Skipped);
            };
            let Some(n) = ctx.reserve_file() else {
                return outcome.finish(EntryState::Skipped);
            };

            let origin = outcome.entry.origin.clone();
            info!(
                "[file {}] {}  (from {})",
                n,
                url,
                outcome.entry.origin_url().unwrap_or("seed")
            );
            outcome.push_file(FileHit::from_page(
                origin.as_deref(),
                url,
                ext,
                String::new(),
                content_type,
                content_length,
                Utc::now(),
            ));
            outcome.finish(EntryState::ResourceRecorded)
        }
    }
}

/// Parses a page without holding the document across an await
fn analyze(
    body: &str,
    base: &Url,
    classifier: &ResourceClassifier,
) -> (ExtractedPage, DiscoveredLinks) {
    let document = Html::parse_document(body);
    let extracted = extract_page(&document);
    let links = discover_links(&document, base, classifier);
    (extracted, links)
}

/// An HTML page: extract, chunk, queue links, record resources
async fn process_page(
    ctx: &CrawlContext,
    mut outcome: EntryOutcome,
    final_url: String,
    status: u16,
    content_type: String,
    body: String,
) -> EntryOutcome {
    let base = Url::parse(&final_url).unwrap_or_else(|_| outcome.entry.url.clone());
    let (extracted, links) = analyze(&body, &base, &ctx.classifier);

    let page = Arc::new(PageRecord {
        url: outcome.entry.url.to_string(),
        final_url,
        status,
        content_type,
        title: extracted.title,
        description: extracted.description,
        tags: extracted.tags,
        collected_date: extracted.collected_date,
        depth: outcome.entry.depth,
    });

    if ctx.mode == EmissionMode::RagChunks {
        let chunks = page.chunks(
            &extracted.text,
            ctx.chunking.chunk_size,
            ctx.chunking.chunk_overlap,
        );
        if chunks.is_empty() {
            outcome.push_chunk_row(ChunkRow::empty_page(&page));
        }
        for chunk in &chunks {
            outcome.push_chunk_row(ChunkRow::from_chunk(&page, chunk));
        }
    }

    outcome.links = links
        .pages
        .into_iter()
        .filter(|link| ctx.scope.is_in_scope(link))
        .collect();

    for resource in &links.resources {
        if ctx.file_cap_reached() {
            debug!("File cap reached, ignoring remaining resources on {}", page.url);
            break;
        }
        record_resource(ctx, &mut outcome, &page, resource).await;
    }

    outcome.page = Some(page);
    outcome.finish(EntryState::HtmlProcessed)
}

/// One data-file link: robots, then a probe (catalog) or a binary row (rag)
async fn record_resource(
    ctx: &CrawlContext,
    outcome: &mut EntryOutcome,
    page: &PageRecord,
    resource: &ResourceLink,
) {
    if !ctx.robots.is_allowed(&resource.url).await {
        info!("ROBOTS blocked: {}", resource.url);
        outcome.robots_blocked += 1;
        return;
    }

    if ctx.mode == EmissionMode::RagChunks {
        if ctx.binary_rows.insert(resource.url.to_string(), ()).is_some() {
            return;
        }
        if let Some(n) = ctx.reserve_file() {
            info!("[file {}] {}", n, resource.url);
            outcome.push_chunk_row(ChunkRow::binary(resource.url.as_str(), page.depth + 1));
        }
        return;
    }

    let (status, content_type, content_length) = match ctx.probe_once(&resource.url).await {
        FetchResult::Metadata {
            status,
            content_type,
            content_length,
            ..
        } => (status, content_type, content_length),
        FetchResult::Page {
            status,
            content_type,
            body,
            ..
        } => (
            status,
            mime_type(Some(&content_type)),
            Some(body.len() as u64),
        ),
        failure => {
            warn!("FAILED ({}) {}", failure.describe(), resource.url);
            outcome.fetch_failures += 1;
            return;
        }
    };

    let Some(n) = ctx.reserve_file() else {
        return;
    };

    info!("[file {}] {}  (from {})", n, resource.url, page.url);
    debug!("Probe of {} answered HTTP {}", resource.url, status);
    outcome.push_file(FileHit::from_page(
        Some(page),
        resource.url.to_string(),
        resource.ext,
        resource.anchor_text.clone(),
        content_type.as_deref().unwrap_or_default(),
        content_length,
        Utc::now(),
    ));
}

/// Runs a complete harvest
///
/// Pages are fetched over plain HTTP, or rendered in a headless browser when
/// `render-js` is set.
///
/// # Arguments
///
/// * `config` - The run configuration
/// * `sink` - Destination for emitted records
///
/// # Example
///
/// ```no_run
/// use gov_harvest::config::Config;
/// use gov_harvest::harvest;
/// use gov_harvest::output::MemorySink;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut config = Config::default();
/// config.scope.seeds = vec!["https://www.abs.gov.au/".to_string()];
///
/// let sink = MemorySink::new();
/// let summary = harvest(config, Box::new(sink.clone())).await?;
/// println!("{} pages, {} records", summary.pages_processed, sink.len());
/// # Ok(())
/// # }
/// ```
pub async fn harvest(config: Config, sink: Box<dyn RecordSink>) -> Result<CrawlSummary> {
    let fetcher = super::build_fetcher(&config).await?;
    Coordinator::with_fetcher(config, fetcher, sink)?.run().await
}
