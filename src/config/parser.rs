use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;
use url::Url;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded, normalized and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use site_spider::config::load_config;
///
/// let config = load_config(Path::new("spider.toml")).unwrap();
/// println!("Crawling {}", config.site.website);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses, normalizes and validates configuration text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let mut config: Config = toml::from_str(content)?;

    config.site.website = normalize_website(&config.site.website)?;

    validate(&config)?;

    Ok(config)
}

/// Brings the site root to `scheme://host[:port]/path` form
///
/// A missing path becomes `/`; query and fragment are dropped.
pub fn normalize_website(website: &str) -> Result<String, ConfigError> {
    let url = Url::parse(website.trim())
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid website '{}': {}", website, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Website '{}' must use http or https",
            website
        )));
    }

    let host = url
        .host_str()
        .ok_or_else(|| ConfigError::InvalidUrl(format!("Website '{}' has no host", website)))?;

    let port = url.port().map(|p| format!(":{}", p)).unwrap_or_default();

    Ok(format!("{}://{}{}{}", url.scheme(), host, port, url.path()))
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Stored next to every checkpoint record to detect a configuration change
/// between the invocations of one pass.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(hash_content(&content))
}

fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChangeFreq, HandlerKind};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const VALID: &str = r#"
[site]
website = "http://example.com"
sitemap-file = "./sitemap.xml"
handlers = ["sitemap", "imagemap", "linking"]

[crawler]
script-timeout = 30
delay-ms = 500

[sitemap]
change-freq = "daily"
priority = 0.5
disallow-keys = ["sid", "PHPSESSID"]
disallow-patterns = ['(?i)\.(xml|txt|js|css)$']

[sitemap.priorities]
"http://example.com/promoted.html" = 0.9

[storage]
database-path = "./spider.db"
"#;

    #[test]
    fn test_load_valid_config() {
        let file = create_temp_config(VALID);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.site.website, "http://example.com/");
        assert_eq!(config.crawler.script_timeout, 30);
        assert_eq!(config.crawler.delay_ms, 500);
        assert_eq!(config.crawler.load_timeout, 10);
        assert_eq!(config.crawler.thin_content_threshold, 10);
        assert_eq!(config.sitemap.change_freq, ChangeFreq::Daily);
        assert_eq!(config.sitemap.disallow_keys.len(), 2);
        assert_eq!(
            config.site.handlers,
            vec![HandlerKind::Sitemap, HandlerKind::Imagemap, HandlerKind::Linking]
        );
        assert_eq!(config.host(), "example.com");
    }

    #[test]
    fn test_priority_override_lookup() {
        let config = parse_config(VALID).unwrap();
        assert_eq!(
            config
                .sitemap
                .priority_for("http://example.com/promoted.html"),
            0.9
        );
        assert_eq!(config.sitemap.priority_for("http://example.com/"), 0.5);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/spider.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let content = VALID.replace("priority = 0.5", "priority = 1.5");
        let result = parse_config(&content);
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_unknown_handler_rejected() {
        let content = VALID.replace("\"linking\"", "\"robots\"");
        assert!(parse_config(&content).is_err());
    }

    #[test]
    fn test_normalize_website() {
        assert_eq!(
            normalize_website("http://example.com").unwrap(),
            "http://example.com/"
        );
        assert_eq!(
            normalize_website("https://example.com/shop/?x=1#top").unwrap(),
            "https://example.com/shop/"
        );
        assert_eq!(
            normalize_website("http://127.0.0.1:8080").unwrap(),
            "http://127.0.0.1:8080/"
        );
        assert!(normalize_website("ftp://example.com").is_err());
        assert!(normalize_website("not a url").is_err());
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
