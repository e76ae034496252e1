use crate::config::types::{
    Config, CrawlerConfig, HandlerKind, NotifyConfig, SiteConfig, SitemapConfig, StorageConfig,
    UserAgentConfig,
};
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_sitemap_config(&config.sitemap)?;
    validate_storage_config(&config.storage)?;
    validate_notify_config(&config.notify)?;
    Ok(())
}

fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.website)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid website: {}", e)))?;

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "Website '{}' has no host",
            config.website
        )));
    }

    if config.sitemap_file.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "sitemap-file cannot be empty".to_string(),
        ));
    }

    // The sitemap handler owns the visited/external diff of a completed pass
    if !config.handlers.contains(&HandlerKind::Sitemap) {
        return Err(ConfigError::Validation(
            "handlers must include 'sitemap'".to_string(),
        ));
    }

    for (i, kind) in config.handlers.iter().enumerate() {
        if config.handlers[..i].contains(kind) {
            return Err(ConfigError::Validation(format!(
                "handler '{}' is listed more than once",
                kind.name()
            )));
        }
    }

    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.recording < 0.0 {
        return Err(ConfigError::Validation(format!(
            "recording must be >= 0, got {}",
            config.recording
        )));
    }

    if (config.script_timeout as f64) <= config.recording {
        return Err(ConfigError::Validation(format!(
            "script-timeout ({}s) must exceed recording ({}s)",
            config.script_timeout, config.recording
        )));
    }

    if config.load_timeout < 1 {
        return Err(ConfigError::Validation(format!(
            "load-timeout must be >= 1s, got {}s",
            config.load_timeout
        )));
    }

    if config.existence_time < 1 {
        return Err(ConfigError::Validation(format!(
            "existence-time must be >= 1 hour, got {}",
            config.existence_time
        )));
    }

    if config.min_body_size >= config.max_body_size {
        return Err(ConfigError::Validation(format!(
            "min-body-size ({}) must be below max-body-size ({})",
            config.min_body_size, config.max_body_size
        )));
    }

    Ok(())
}

fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if !config.contact_url.is_empty() {
        Url::parse(&config.contact_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;
    }

    Ok(())
}

fn validate_sitemap_config(config: &SitemapConfig) -> Result<(), ConfigError> {
    validate_priority("priority", config.priority)?;

    for (url, priority) in &config.priorities {
        Url::parse(url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid priority override URL '{}': {}", url, e))
        })?;
        validate_priority(url, *priority)?;
    }

    if config.disallow_keys.iter().any(|k| k.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "disallow-keys cannot contain empty names".to_string(),
        ));
    }

    for pattern in config
        .disallow_patterns
        .iter()
        .chain(&config.disallow_image_patterns)
    {
        Regex::new(pattern)
            .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))?;
    }

    Ok(())
}

fn validate_priority(name: &str, priority: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&priority) {
        return Err(ConfigError::Validation(format!(
            "priority for {} must be between 0.0 and 1.0, got {}",
            name, priority
        )));
    }
    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_notify_config(config: &NotifyConfig) -> Result<(), ConfigError> {
    for email in [&config.email_notify, &config.email_cron, &config.email_json] {
        if !email.is_empty() {
            validate_email(email)?;
        }
    }
    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("admin@sub.example.com").is_ok());

        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@domain").is_err());
    }

    #[test]
    fn test_validate_priority_bounds() {
        assert!(validate_priority("x", 0.0).is_ok());
        assert!(validate_priority("x", 1.0).is_ok());
        assert!(validate_priority("x", -0.1).is_err());
        assert!(validate_priority("x", 1.1).is_err());
    }

    #[test]
    fn test_bad_disallow_pattern() {
        let config = SitemapConfig {
            disallow_patterns: vec!["(unclosed".to_string()],
            ..SitemapConfig::default()
        };
        assert!(matches!(
            validate_sitemap_config(&config),
            Err(ConfigError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_handlers_require_sitemap() {
        let site = |handlers: Vec<HandlerKind>| SiteConfig {
            website: "http://ex.com/".to_string(),
            sitemap_file: "sitemap.xml".into(),
            imagemap_file: "imagemap.xml".into(),
            handlers,
        };

        assert!(validate_site_config(&site(vec![HandlerKind::Sitemap, HandlerKind::Linking])).is_ok());
        assert!(matches!(
            validate_site_config(&site(vec![HandlerKind::Linking, HandlerKind::Imagemap])),
            Err(ConfigError::Validation(ref m)) if m.contains("sitemap")
        ));
        assert!(validate_site_config(&site(Vec::new())).is_err());
    }

    #[test]
    fn test_timeout_must_exceed_recording() {
        let config = CrawlerConfig {
            script_timeout: 1,
            recording: 1.0,
            ..CrawlerConfig::default()
        };
        assert!(validate_crawler_config(&config).is_err());
    }
}
