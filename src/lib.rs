//! Site-Spider: a resumable, time-boxed site crawler
//!
//! This crate crawls the reachable pages of a single site in short, budgeted
//! invocations, checkpointing the frontier between them. A completed pass
//! produces an XML sitemap, an image sitemap and an internal-link ("radar")
//! density report, and reports differences against the previous pass.

pub mod config;
pub mod crawler;
pub mod handler;
pub mod notify;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Site-Spider operations
#[derive(Debug, Error)]
pub enum SpiderError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Produced by [`notify::Notifier::stop`]; terminates the run
    #[error("{0}")]
    Fatal(String),

    /// The sitemap was already written today and the run was not forced
    #[error("Sitemap {0} already created today")]
    UpToDate(String),

    #[error("Page {url} still looks broken after a retry")]
    ThinContent { url: String, content: String },

    #[error("Only {0} page(s) visited, refusing to overwrite the sitemap")]
    InsufficientResults(usize),

    #[error("Handler {handler} failed: {message}")]
    Handler {
        handler: &'static str,
        message: String,
    },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Malformed link '{link}' on page {page}: leading or trailing whitespace")]
    MalformedLink { link: String, page: String },

    #[error("Ambiguous absolute link {link} on page {page}: host differs only by 'www.'")]
    AmbiguousHost { link: String, page: String },

    #[error("Missing host in URL: {0}")]
    MissingHost(String),
}

/// Result type alias for Site-Spider operations
pub type Result<T> = std::result::Result<T, SpiderError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, RunOptions, RunReport};
pub use state::{FrontierState, Snapshot};
pub use url::{cut_excess_get, is_external, resolve, should_skip, SitePolicy};
