//! URL handling module for Site-Spider
//!
//! This module provides href absolutization, external-link classification,
//! query-parameter stripping and skip-pattern matching, tied together by
//! [`SitePolicy::classify_link`].

mod classify;
mod filter;
mod resolve;

use crate::config::Config;
use crate::{ConfigError, UrlResult};
use regex::Regex;

// Re-export main functions
pub use classify::{extract_host, is_external};
pub use filter::{cut_excess_get, should_skip};
pub use resolve::{decode_link, resolve};

pub(crate) use resolve::origin_of;

/// Outcome of classifying one raw href found on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkClass {
    /// Link on the crawled site, absolute and stripped of disallowed parameters
    Internal(String),
    /// Link leaving the site (other host or non-HTTP scheme)
    External(String),
    /// Internal link matching a disallow pattern
    Skipped,
}

/// Compiled per-site URL rules
#[derive(Debug, Clone)]
pub struct SitePolicy {
    /// Normalized site root
    pub website: String,
    /// Host of the site root
    pub host: String,
    /// Query parameter names stripped from internal links
    pub disallow_keys: Vec<String>,
    /// Internal links matching any of these are not crawled
    pub disallow_patterns: Vec<Regex>,
    /// Images matching any of these stay out of the image sitemap
    pub image_patterns: Vec<Regex>,
}

impl SitePolicy {
    /// Builds the policy from a loaded configuration
    ///
    /// # Returns
    ///
    /// * `Ok(SitePolicy)` - Every pattern compiled
    /// * `Err(ConfigError::InvalidPattern)` - A pattern failed to compile
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            website: config.site.website.clone(),
            host: config.host(),
            disallow_keys: config.sitemap.disallow_keys.clone(),
            disallow_patterns: compile(&config.sitemap.disallow_patterns)?,
            image_patterns: compile(&config.sitemap.disallow_image_patterns)?,
        })
    }

    /// Classifies a raw href found on `current`
    ///
    /// External links are keyed by their decoded form (protocol-relative links
    /// gain the site scheme). Internal links are resolved, stripped of
    /// disallowed parameters and checked against the skip patterns.
    ///
    /// # Errors
    ///
    /// * `UrlError::AmbiguousHost` - Absolute link whose host differs only by `www.`
    /// * `UrlError::MalformedLink` - Link with leading or trailing whitespace
    pub fn classify_link(
        &self,
        raw: &str,
        current: &str,
        base: Option<&str>,
    ) -> UrlResult<LinkClass> {
        if is_external(raw, current, &self.host)? {
            let decoded = decode_link(raw);
            let key = if decoded.starts_with("//") {
                format!("{}:{}", self.scheme(), decoded)
            } else {
                decoded
            };
            return Ok(LinkClass::External(key));
        }

        let absolute = resolve(&self.website, raw, current, base)?;
        let cleaned = cut_excess_get(&absolute, &self.disallow_keys);

        if should_skip(&cleaned, &self.disallow_patterns) {
            return Ok(LinkClass::Skipped);
        }

        Ok(LinkClass::Internal(cleaned))
    }

    /// Returns true if an absolute image URL is excluded from the image sitemap
    pub fn skip_image(&self, src: &str) -> bool {
        should_skip(src, &self.image_patterns)
    }

    fn scheme(&self) -> &str {
        self.website.split_once("://").map_or("http", |(s, _)| s)
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|p| Regex::new(p).map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", p, e))))
        .collect()
}
