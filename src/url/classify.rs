use crate::url::resolve::{decode_link, has_http_scheme};
use crate::{UrlError, UrlResult};
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

/// Schemes that never point at a crawlable page
static APPLICATION_SCHEME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(ftp://|mailto:|news:|javascript:|telnet:|callto:|tel:|skype:|data:)")
        .expect("static regex")
});

/// Checks whether a raw link points outside the crawled site
///
/// # Classification Rules
///
/// | Link | Result |
/// |------|--------|
/// | `mailto:`, `tel:`, `ftp://`, ... | external, no host comparison |
/// | no `http(s)://` scheme and not starting with `//` | internal |
/// | host equal to `host` | internal |
/// | host differs only by a `www.` prefix | `UrlError::AmbiguousHost` |
/// | any other host | external |
///
/// # Arguments
///
/// * `link` - The raw link as found in the page; it is decoded the same way
///   `resolve` decodes it before the scheme is checked
/// * `current` - The page the link was found on (used in error messages)
/// * `host` - The host of the crawled site
///
/// # Examples
///
/// ```
/// use site_spider::url::is_external;
///
/// assert!(is_external("http://other.com/x", "http://ex.com/", "ex.com").unwrap());
/// assert!(!is_external("/local", "http://ex.com/", "ex.com").unwrap());
/// assert!(is_external("http://www.ex.com/x", "http://ex.com/", "ex.com").is_err());
/// ```
pub fn is_external(link: &str, current: &str, host: &str) -> UrlResult<bool> {
    let decoded = decode_link(link);

    if APPLICATION_SCHEME.is_match(&decoded) {
        return Ok(true);
    }

    if !has_http_scheme(&decoded) && !decoded.starts_with("//") {
        return Ok(false);
    }

    let link_host = extract_host(&decoded)?;

    if link_host.eq_ignore_ascii_case(host) {
        return Ok(false);
    }

    if strip_www(&link_host).eq_ignore_ascii_case(strip_www(host)) {
        return Err(UrlError::AmbiguousHost {
            link: link.to_string(),
            page: current.to_string(),
        });
    }

    Ok(true)
}

/// Extracts the host of an absolute or protocol-relative link
pub fn extract_host(link: &str) -> UrlResult<String> {
    let absolute = if link.starts_with("//") {
        format!("http:{}", link)
    } else {
        link.to_string()
    };

    let url = Url::parse(&absolute).map_err(|e| UrlError::Parse(format!("{}: {}", link, e)))?;

    url.host_str()
        .map(|h| h.to_lowercase())
        .ok_or_else(|| UrlError::MissingHost(link.to_string()))
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}
