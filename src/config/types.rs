use indexmap::IndexMap;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Site-Spider
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub sitemap: SitemapConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl Config {
    /// Host part of the crawled website
    ///
    /// The loader guarantees the website parses and has a host, so this only
    /// falls back to an empty string for hand-built configs.
    pub fn host(&self) -> String {
        ::url::Url::parse(&self.site.website)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default()
    }
}

/// The crawled site and where its artifacts go
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Site root, e.g. "https://example.com/"
    pub website: String,

    /// Path of the generated XML sitemap
    #[serde(rename = "sitemap-file")]
    pub sitemap_file: PathBuf,

    /// Path of the generated image sitemap
    #[serde(rename = "imagemap-file", default = "default_imagemap_file")]
    pub imagemap_file: PathBuf,

    /// Content handlers run on every fetched page, in this order
    #[serde(default = "default_handlers")]
    pub handlers: Vec<HandlerKind>,
}

/// Content handler selected by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerKind {
    /// XML sitemap plus the sitemap diff
    Sitemap,
    /// Image sitemap
    Imagemap,
    /// Radar link-density report
    Linking,
}

impl HandlerKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sitemap => "sitemap",
            Self::Imagemap => "imagemap",
            Self::Linking => "linking",
        }
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Wall-clock budget of a single invocation (seconds)
    #[serde(rename = "script-timeout", default = "default_script_timeout")]
    pub script_timeout: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "load-timeout", default = "default_load_timeout")]
    pub load_timeout: u64,

    /// Time reserved for writing the checkpoint (seconds)
    #[serde(default = "default_recording")]
    pub recording: f64,

    /// Pause before every request (milliseconds)
    #[serde(rename = "delay-ms", default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Hours after which an untouched checkpoint is discarded
    #[serde(rename = "existence-time", default = "default_existence_time")]
    pub existence_time: u64,

    /// Redirects followed automatically; 0 disables following
    #[serde(rename = "max-redirects", default)]
    pub max_redirects: u32,

    /// Pages yielding fewer links than this are re-read once; 0 disables the check
    #[serde(rename = "thin-content-threshold", default = "default_thin_threshold")]
    pub thin_content_threshold: usize,

    /// Bodies below this size (bytes) are treated as failed fetches
    #[serde(rename = "min-body-size", default = "default_min_body")]
    pub min_body_size: usize,

    /// Bodies above this size (bytes) are visited but not analyzed
    #[serde(rename = "max-body-size", default = "default_max_body")]
    pub max_body_size: usize,

    /// File extensions never fetched for link content
    #[serde(rename = "skip-extensions", default = "default_skip_extensions")]
    pub skip_extensions: Vec<String>,

    /// Accept invalid TLS certificates
    #[serde(rename = "accept-invalid-certs", default)]
    pub accept_invalid_certs: bool,
}

impl CrawlerConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            script_timeout: default_script_timeout(),
            load_timeout: default_load_timeout(),
            recording: default_recording(),
            delay_ms: default_delay_ms(),
            existence_time: default_existence_time(),
            max_redirects: 0,
            thin_content_threshold: default_thin_threshold(),
            min_body_size: default_min_body(),
            max_body_size: default_max_body(),
            skip_extensions: default_skip_extensions(),
            accept_invalid_certs: false,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url", default)]
    pub contact_url: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    pub fn header_value(&self) -> String {
        if self.contact_url.is_empty() {
            format!("{}/{}", self.crawler_name, self.crawler_version)
        } else {
            format!(
                "{}/{} (+{})",
                self.crawler_name, self.crawler_version, self.contact_url
            )
        }
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "SiteSpider".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: String::new(),
        }
    }
}

/// Sitemap content configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SitemapConfig {
    #[serde(rename = "change-freq", default)]
    pub change_freq: ChangeFreq,

    /// Default priority for every page
    #[serde(default = "default_priority")]
    pub priority: f64,

    /// Per-URL priority overrides
    #[serde(default)]
    pub priorities: IndexMap<String, f64>,

    /// Query parameter names stripped from every link
    #[serde(rename = "disallow-keys", default)]
    pub disallow_keys: Vec<String>,

    /// Regexes over path+query; matching links are not crawled
    #[serde(rename = "disallow-patterns", default)]
    pub disallow_patterns: Vec<String>,

    /// Regexes over path+query; matching images stay out of the image sitemap
    #[serde(rename = "disallow-image-patterns", default)]
    pub disallow_image_patterns: Vec<String>,
}

impl SitemapConfig {
    /// Priority for a URL, falling back to the global default
    pub fn priority_for(&self, url: &str) -> f64 {
        self.priorities.get(url).copied().unwrap_or(self.priority)
    }
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            change_freq: ChangeFreq::default(),
            priority: default_priority(),
            priorities: IndexMap::new(),
            disallow_keys: Vec::new(),
            disallow_patterns: Vec::new(),
            disallow_image_patterns: Vec::new(),
        }
    }
}

/// `<changefreq>` values allowed by the sitemap protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeFreq {
    Always,
    Hourly,
    Daily,
    #[default]
    Weekly,
    Monthly,
    Yearly,
    Never,
}

impl fmt::Display for ChangeFreq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Always => "always",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Never => "never",
        };
        f.write_str(s)
    }
}

/// Checkpoint storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite checkpoint database
    #[serde(rename = "database-path")]
    pub database_path: PathBuf,
}

/// Notification recipients
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifyConfig {
    /// Recipient of change reports and warnings
    #[serde(rename = "email-notify", default)]
    pub email_notify: String,

    /// Recipient of the run transcript
    #[serde(rename = "email-cron", default)]
    pub email_cron: String,

    /// Recipient of the structured change record
    #[serde(rename = "email-json", default)]
    pub email_json: String,
}

fn default_imagemap_file() -> PathBuf {
    PathBuf::from("imagemap.xml")
}

fn default_handlers() -> Vec<HandlerKind> {
    vec![HandlerKind::Sitemap]
}

fn default_script_timeout() -> u64 {
    60
}

fn default_load_timeout() -> u64 {
    10
}

fn default_recording() -> f64 {
    0.5
}

fn default_delay_ms() -> u64 {
    1000
}

fn default_existence_time() -> u64 {
    25
}

fn default_thin_threshold() -> usize {
    10
}

fn default_min_body() -> usize {
    1024
}

fn default_max_body() -> usize {
    3 * 1024 * 1024
}

fn default_skip_extensions() -> Vec<String> {
    ["xls", "xlsx", "pdf", "doc", "docx"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_priority() -> f64 {
    0.8
}
