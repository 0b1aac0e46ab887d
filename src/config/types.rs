use serde::{Deserialize, Serialize};

/// Main configuration structure for Gov-Harvest
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub scope: ScopeConfig,
    #[serde(default)]
    pub resources: ResourceConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Which record shape a crawl run produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmissionMode {
    /// One row per discovered data file, with the linking page as context
    #[default]
    ResourceCatalog,
    /// One row per text chunk of every HTML page
    RagChunks,
}

impl std::str::FromStr for EmissionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "resource-catalog" | "catalog" => Ok(Self::ResourceCatalog),
            "rag-chunks" | "rag" => Ok(Self::RagChunks),
            other => Err(format!(
                "unknown mode '{}', expected 'resource-catalog' or 'rag-chunks'",
                other
            )),
        }
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Record shape produced by the run
    pub mode: EmissionMode,

    /// Maximum number of HTML pages to process
    pub max_pages: usize,

    /// Maximum number of data file records to emit
    pub max_files: usize,

    /// Maximum link depth from the seeds for HTML traversal
    pub max_depth: u32,

    /// Number of in-flight fetch tasks (1 = sequential)
    pub concurrency: usize,

    /// Minimum time between requests to the same host (milliseconds)
    pub per_host_delay_ms: u64,

    /// Per-request timeout (seconds)
    pub request_timeout_secs: u64,

    /// Render pages through a headless browser instead of plain HTTP
    pub render_js: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            mode: EmissionMode::default(),
            max_pages: 500,
            max_files: 500,
            max_depth: 4,
            concurrency: 6,
            per_host_delay_ms: 1000,
            request_timeout_secs: 20,
            render_js: false,
        }
    }
}

/// Which hosts a run may traverse
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ScopeConfig {
    /// Seed URLs, crawled at depth 0
    pub seeds: Vec<String>,

    /// Only follow links whose host is in the allowed set
    pub same_domain_only: bool,

    /// Explicit allowed hosts (defaults to the seed hosts); "*.example.gov.au" patterns allowed
    pub allowed_domains: Vec<String>,

    /// Restrict traversal to hosts under this public suffix, e.g. "gov.au"
    pub public_suffix: Option<String>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            seeds: Vec::new(),
            same_domain_only: true,
            allowed_domains: Vec::new(),
            public_suffix: None,
        }
    }
}

/// Data-file classification options
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ResourceConfig {
    /// Also collect .zip archives
    pub allow_archives: bool,

    /// Also collect .pdf documents
    pub include_pdf: bool,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            allow_archives: false,
            include_pdf: true,
        }
    }
}

/// Text chunking options for RAG output
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ChunkingConfig {
    /// Maximum characters per chunk (0 = one chunk per page)
    pub chunk_size: usize,

    /// Characters shared between consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1400,
            chunk_overlap: 200,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: String,

    /// Email address for crawler-related contact
    pub contact_email: String,

    /// Verbatim User-Agent header, replacing the composed one
    pub full: Option<String>,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "GovHarvest".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://govhack.org".to_string(),
            contact_email: "team@example.com".to_string(),
            full: None,
        }
    }
}

impl UserAgentConfig {
    /// Returns the User-Agent header value
    ///
    /// Format: `CrawlerName/Version (+ContactURL; contact: ContactEmail)`
    pub fn header_value(&self) -> String {
        match &self.full {
            Some(full) if !full.trim().is_empty() => full.trim().to_string(),
            _ => format!(
                "{}/{} (+{}; contact: {})",
                self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
            ),
        }
    }

    /// Returns the product token used to match robots.txt `User-agent` groups
    pub fn robots_token(&self) -> String {
        let header = self.header_value();
        header
            .split(|c: char| c == '/' || c.is_whitespace())
            .find(|s| !s.is_empty())
            .unwrap_or("*")
            .to_string()
    }
}

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    Jsonl,
    Csv,
    #[default]
    Both,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jsonl" => Ok(Self::Jsonl),
            "csv" => Ok(Self::Csv),
            "both" => Ok(Self::Both),
            other => Err(format!(
                "unknown format '{}', expected 'jsonl', 'csv' or 'both'",
                other
            )),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Output path prefix; `.jsonl` / `.csv` are appended
    pub path: String,

    /// Which files to write
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: "harvest".to_string(),
            format: OutputFormat::default(),
        }
    }
}
