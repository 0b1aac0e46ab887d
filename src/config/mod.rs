//! Configuration module for Gov-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section has defaults, so a run can also be configured from the command
//! line alone.
//!
//! # Example
//!
//! ```no_run
//! use gov_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Crawler will process at most {} pages", config.crawler.max_pages);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ChunkingConfig, Config, CrawlerConfig, EmissionMode, OutputConfig, OutputFormat,
    ResourceConfig, ScopeConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, parse_seed_list, read_config,
};
pub use validation::validate;
