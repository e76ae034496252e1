//! Crawler module for page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with manual redirect handling
//! - Tolerant link, radar and image extraction
//! - The time-boxed run loop over the frontier

mod coordinator;
mod extractor;
mod fetcher;

pub use coordinator::{Coordinator, RunOptions, RunReport, Step};
pub use extractor::{decode_content, ExtractedLinks, ImageTag, LinkExtractor, TolerantScanner};
pub use fetcher::{
    build_http_client, FetchOutcome, FetchPolicy, FetchResponse, Fetcher, HttpFetcher,
    TransportError,
};

use crate::config::Config;
use crate::Result;

/// Runs one invocation of the pass configured by `config`
///
/// This is the main entry point for a scheduled run. It will:
/// 1. Open the checkpoint database and build the HTTP client
/// 2. Restore the pass in progress, or start a new one
/// 3. Crawl until the frontier empties or the time budget runs out
/// 4. Checkpoint, or write the artifacts of the completed pass
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `options` - Flags of this invocation
/// * `config_hash` - Hash of the configuration file
///
/// # Returns
///
/// * `Ok(RunReport)` - How the invocation ended
/// * `Err(SpiderError)` - A fatal condition stopped the run
pub async fn crawl(config: Config, options: RunOptions, config_hash: &str) -> Result<RunReport> {
    Coordinator::new(config, options, config_hash)?.run().await
}
