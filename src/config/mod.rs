//! Configuration module for Sitescan
//!
//! Settings come from an optional TOML file, with `SITESCAN_*` environment
//! variables layered on top. Every key has a default, so an empty file (or no
//! file at all) yields a working configuration.
//!
//! # Example
//!
//! ```no_run
//! use sitescan::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sitescan.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, HttpConfig, OutputConfig, DEFAULT_CONCURRENCY,
    DEFAULT_MAX_CRAWL_DEPTH, DEFAULT_MAX_REDIRECT_THRESHOLD,
};

// Re-export parser functions
pub use parser::{
    apply_env_overrides, compute_config_hash, default_config, load_config, load_config_with_hash,
    ENV_CONCURRENCY, ENV_DATABASE_PATH, ENV_MAX_CRAWL_DEPTH, ENV_MAX_REDIRECT_THRESHOLD,
};
pub use validation::validate;
