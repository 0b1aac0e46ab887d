//! Gov-Harvest main entry point
//!
//! This is the command-line interface for the Gov-Harvest crawler.

use anyhow::Context;
use clap::Parser;
use gov_harvest::config::{
    compute_config_hash, parse_seed_list, read_config, validate, Config, EmissionMode,
    OutputFormat,
};
use gov_harvest::crawler::{build_fetcher, Coordinator};
use gov_harvest::output::{open_sinks, output_paths, print_summary};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Gov-Harvest: a polite data-file and text harvester
///
/// Gov-Harvest crawls government websites breadth-first while respecting
/// robots.txt and per-host delays. It either catalogs linked data files with
/// the context of the page that linked them, or writes overlapping text
/// chunks for retrieval indexing.
#[derive(Parser, Debug)]
#[command(name = "gov-harvest")]
#[command(version)]
#[command(about = "A polite data-file and text harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file; every value has a default
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Seed URLs, comma-separated
    #[arg(long, value_name = "URLS")]
    seeds: Option<String>,

    /// Maximum HTML pages to process
    #[arg(long)]
    max_pages: Option<usize>,

    /// Maximum data-file records to emit
    #[arg(long)]
    max_files: Option<usize>,

    /// Maximum link depth from the seeds
    #[arg(long)]
    max_depth: Option<u32>,

    /// Number of concurrent fetch tasks
    #[arg(long)]
    concurrency: Option<usize>,

    /// Minimum delay between requests to one host, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Also collect .zip archives
    #[arg(long)]
    allow_archives: bool,

    /// Only follow links within the allowed hosts (true/false)
    #[arg(long, value_name = "BOOL")]
    same_domain_only: Option<bool>,

    /// Allowed hosts, comma-separated; "*.example.gov.au" patterns allowed
    #[arg(long, value_name = "HOSTS")]
    allowed_domains: Option<String>,

    /// Restrict traversal to hosts under this suffix, e.g. "gov.au"
    #[arg(long)]
    public_suffix: Option<String>,

    /// Maximum characters per text chunk
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Characters shared by consecutive chunks
    #[arg(long)]
    chunk_overlap: Option<usize>,

    /// Verbatim User-Agent header
    #[arg(long)]
    user_agent: Option<String>,

    /// Emission mode: resource-catalog or rag-chunks
    #[arg(long)]
    mode: Option<EmissionMode>,

    /// Output path prefix; .csv / .jsonl are appended
    #[arg(short, long, value_name = "PATH")]
    output: Option<String>,

    /// Output format: csv, jsonl or both
    #[arg(long)]
    format: Option<OutputFormat>,

    /// Render pages in a headless browser
    #[arg(long)]
    js: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    /// Applies command-line overrides on top of the file (or default) configuration
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(seeds) = &self.seeds {
            config.scope.seeds = parse_seed_list(&[seeds]);
        }
        if let Some(n) = self.max_pages {
            config.crawler.max_pages = n;
        }
        if let Some(n) = self.max_files {
            config.crawler.max_files = n;
        }
        if let Some(n) = self.max_depth {
            config.crawler.max_depth = n;
        }
        if let Some(n) = self.concurrency {
            config.crawler.concurrency = n;
        }
        if let Some(ms) = self.delay_ms {
            config.crawler.per_host_delay_ms = ms;
        }
        if let Some(secs) = self.timeout_secs {
            config.crawler.request_timeout_secs = secs;
        }
        if self.allow_archives {
            config.resources.allow_archives = true;
        }
        if let Some(same) = self.same_domain_only {
            config.scope.same_domain_only = same;
        }
        if let Some(domains) = &self.allowed_domains {
            config.scope.allowed_domains = parse_seed_list(&[domains]);
        }
        if let Some(suffix) = &self.public_suffix {
            config.scope.public_suffix = Some(suffix.clone());
        }
        if let Some(n) = self.chunk_size {
            config.chunking.chunk_size = n;
        }
        if let Some(n) = self.chunk_overlap {
            config.chunking.chunk_overlap = n;
        }
        if let Some(ua) = &self.user_agent {
            config.user_agent.full = Some(ua.clone());
        }
        if let Some(mode) = self.mode {
            config.crawler.mode = mode;
        }
        if let Some(path) = &self.output {
            config.output.path = path.clone();
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
        if self.js {
            config.crawler.render_js = true;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (mut config, config_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let config = read_config(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            let hash = compute_config_hash(path)?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, Some(hash))
        }
        None => (Config::default(), None),
    };

    cli.apply_overrides(&mut config);
    validate(&config).context("invalid configuration")?;

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_crawl(config, config_hash).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("gov_harvest=info,warn"),
            1 => EnvFilter::new("gov_harvest=debug,info"),
            2 => EnvFilter::new("gov_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Gov-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Mode: {:?}", config.crawler.mode);
    println!("  Max pages: {}", config.crawler.max_pages);
    println!("  Max files: {}", config.crawler.max_files);
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Concurrency: {}", config.crawler.concurrency);
    println!("  Per-host delay: {}ms", config.crawler.per_host_delay_ms);
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    println!("  Render JS: {}", config.crawler.render_js);

    println!("\nScope:");
    println!("  Same domain only: {}", config.scope.same_domain_only);
    if !config.scope.allowed_domains.is_empty() {
        println!("  Allowed domains: {}", config.scope.allowed_domains.join(", "));
    }
    if let Some(suffix) = &config.scope.public_suffix {
        println!("  Public suffix: {}", suffix);
    }

    println!("\nResources:");
    println!("  Include PDF: {}", config.resources.include_pdf);
    println!("  Allow archives: {}", config.resources.allow_archives);

    if config.crawler.mode == EmissionMode::RagChunks {
        println!("\nChunking:");
        println!("  Chunk size: {}", config.chunking.chunk_size);
        println!("  Chunk overlap: {}", config.chunking.chunk_overlap);
    }

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nOutput:");
    for path in output_paths(&config.output) {
        println!("  {}", path.display());
    }

    println!("\nSeeds ({}):", config.scope.seeds.len());
    for seed in &config.scope.seeds {
        println!("  * {}", seed);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: Option<String>) -> anyhow::Result<()> {
    let sink = open_sinks(&config.output, config.crawler.mode)?;
    let fetcher = build_fetcher(&config).await?;

    let mut coordinator = Coordinator::with_fetcher(config, fetcher, Box::new(sink))?;
    if let Some(hash) = config_hash {
        coordinator = coordinator.with_config_hash(hash);
    }

    match coordinator.run().await {
        Ok(summary) => {
            print_summary(&summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
