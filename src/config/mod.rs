//! Configuration module for Site-Spider
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use site_spider::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("spider.toml")).unwrap();
//! println!("Invocation budget: {}s", config.crawler.script_timeout);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ChangeFreq, Config, CrawlerConfig, HandlerKind, NotifyConfig, SiteConfig, SitemapConfig,
    StorageConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, normalize_website, parse_config,
};
