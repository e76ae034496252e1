//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - Manual redirect following up to the configured limit
//! - Classifying responses into the outcomes the run loop acts on

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::crawler::extractor::decode_content;
use async_trait::async_trait;
use reqwest::{header::LOCATION, redirect::Policy, Client};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};
use url::Url;

/// Failure to obtain any response
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Could not connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Invalid redirect target '{location}' from {url}")]
    BadRedirect { url: String, location: String },

    #[error("Request to {url} failed: {message}")]
    Other { url: String, message: String },
}

impl TransportError {
    fn from_reqwest(url: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else if e.is_connect() {
            Self::Connect {
                url: url.to_string(),
                message: e.to_string(),
            }
        } else {
            Self::Other {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    }
}

/// Raw response of one fetch
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status_code: u16,
    pub body: Vec<u8>,
    /// URL of the last request made, after followed redirects
    pub final_url: String,
    /// Number of redirects followed
    pub redirect_count: u32,
    pub body_size: usize,
    /// Absolute `Location` of an unfollowed redirect
    pub location: Option<String>,
}

impl FetchResponse {
    /// A plain response with no redirects involved
    pub fn new(url: &str, status_code: u16, body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        Self {
            status_code,
            body_size: body.len(),
            body,
            final_url: url.to_string(),
            redirect_count: 0,
            location: None,
        }
    }

    /// An unfollowed redirect to `location`
    pub fn redirect(url: &str, status_code: u16, location: &str) -> Self {
        Self {
            location: Some(location.to_string()),
            ..Self::new(url, status_code, Vec::new())
        }
    }
}

/// Retrieves pages
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, TransportError>;
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are never followed by the client itself; [`HttpFetcher`]
/// follows them manually so it can surface the target instead.
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `crawler` - Timeouts and TLS settings
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    crawler: &CrawlerConfig,
) -> Result<Client, reqwest::Error> {
    let timeout = Duration::from_secs(crawler.load_timeout);

    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(timeout)
        .connect_timeout(timeout)
        .redirect(Policy::none())
        .danger_accept_invalid_certs(crawler.accept_invalid_certs)
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`Fetcher`] over a reqwest client
pub struct HttpFetcher {
    client: Client,
    max_redirects: u32,
}

impl HttpFetcher {
    pub fn new(client: Client, max_redirects: u32) -> Self {
        Self {
            client,
            max_redirects,
        }
    }

    /// Builds the client from configuration
    pub fn from_config(
        user_agent: &UserAgentConfig,
        crawler: &CrawlerConfig,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self::new(
            build_http_client(user_agent, crawler)?,
            crawler.max_redirects,
        ))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, TransportError> {
        let mut current = url.to_string();
        let mut redirect_count = 0;

        loop {
            trace!("GET {}", current);
            let response = self
                .client
                .get(&current)
                .send()
                .await
                .map_err(|e| TransportError::from_reqwest(&current, e))?;

            let status = response.status();

            if status.is_redirection() {
                if let Some(location) = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                {
                    let target = Url::parse(&current)
                        .and_then(|base| base.join(location))
                        .map_err(|_| TransportError::BadRedirect {
                            url: current.clone(),
                            location: location.to_string(),
                        })?
                        .to_string();

                    if redirect_count < self.max_redirects {
                        debug!("Following redirect {} -> {}", current, target);
                        redirect_count += 1;
                        current = target;
                        continue;
                    }

                    return Ok(FetchResponse {
                        redirect_count,
                        ..FetchResponse::redirect(&current, status.as_u16(), &target)
                    });
                }
            }

            let body = response
                .bytes()
                .await
                .map_err(|e| TransportError::from_reqwest(&current, e))?
                .to_vec();

            return Ok(FetchResponse {
                redirect_count,
                ..FetchResponse::new(&current, status.as_u16(), body)
            });
        }
    }
}

/// What the run loop does with a fetched URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Decoded page content to analyze, with the URL it was served from
    /// after any followed redirects
    Content { content: String, final_url: String },
    /// Visited but never analyzed (oversized body, document format)
    NotAnalyzed,
    /// The URL points elsewhere
    Redirect { to: String },
    /// 5xx response, worth one more attempt
    ServerError { status: u16, message: String },
    /// Terminal failure for this URL
    Failed(String),
}

/// Turns fetcher results into [`FetchOutcome`]s
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    min_body_size: usize,
    max_body_size: usize,
    skip_extensions: Vec<String>,
}

impl FetchPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            min_body_size: config.min_body_size,
            max_body_size: config.max_body_size,
            skip_extensions: config
                .skip_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    /// Returns true for document formats never fetched for links
    pub fn is_document(&self, url: &str) -> bool {
        let path = Url::parse(url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| url.to_string());

        let file = path.rsplit('/').next().unwrap_or_default();
        match file.rsplit_once('.') {
            Some((_, ext)) => {
                let ext = ext.to_ascii_lowercase();
                self.skip_extensions.iter().any(|e| *e == ext)
            }
            None => false,
        }
    }

    /// Classifies the result of fetching `url`, found on page `origin`
    ///
    /// # Outcome Table
    ///
    /// | Response | Outcome |
    /// |----------|---------|
    /// | transport error | `Failed` |
    /// | 3xx with `Location` | `Redirect` |
    /// | 5xx | `ServerError` |
    /// | other non-2xx | `Failed` |
    /// | body under the floor | `Failed` |
    /// | body over the ceiling | `NotAnalyzed` |
    /// | otherwise | `Content` |
    pub fn classify(
        &self,
        url: &str,
        origin: &str,
        result: Result<FetchResponse, TransportError>,
    ) -> FetchOutcome {
        let response = match result {
            Ok(response) => response,
            Err(e) => return FetchOutcome::Failed(format!("{}. Linked from {}", e, origin)),
        };

        let status = response.status_code;

        if (300..400).contains(&status) {
            if let Some(to) = response.location {
                return FetchOutcome::Redirect { to };
            }
        }

        if status >= 500 {
            return FetchOutcome::ServerError {
                status,
                message: format!(
                    "Page {} is unavailable. Status: {}. Linked from {}",
                    url, status, origin
                ),
            };
        }

        if !(200..300).contains(&status) {
            return FetchOutcome::Failed(format!(
                "Page {} is unavailable. Status: {}. Linked from {}",
                url, status, origin
            ));
        }

        if response.body_size < self.min_body_size {
            return FetchOutcome::Failed(format!(
                "Page {} is empty. Size: {} bytes. Linked from {}",
                url, response.body_size, origin
            ));
        }

        if response.body_size > self.max_body_size {
            return FetchOutcome::NotAnalyzed;
        }

        FetchOutcome::Content {
            content: decode_content(&response.body),
            final_url: response.final_url,
        }
    }
}
