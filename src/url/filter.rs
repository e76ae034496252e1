use regex::Regex;
use url::Url;

/// Removes disallowed query parameters and the fragment from a URL
///
/// Trailing `&` and `?` left behind by the removal are trimmed, so applying
/// the function twice gives the same result as applying it once.
///
/// # Arguments
///
/// * `url` - An absolute URL
/// * `keys` - Query parameter names to drop
///
/// # Examples
///
/// ```
/// use site_spider::url::cut_excess_get;
///
/// let keys = vec!["sid".to_string()];
/// assert_eq!(cut_excess_get("http://ex.com/p?sid=9&a=1", &keys), "http://ex.com/p?a=1");
/// assert_eq!(cut_excess_get("http://ex.com/p?sid=9#top", &keys), "http://ex.com/p");
/// ```
pub fn cut_excess_get(url: &str, keys: &[String]) -> String {
    let without_fragment = match url.find('#') {
        Some(i) => &url[..i],
        None => url,
    };

    let cleaned = match without_fragment.split_once('?') {
        Some((head, query)) if !keys.is_empty() => {
            let kept: Vec<&str> = query
                .split('&')
                .filter(|pair| !pair.is_empty())
                .filter(|pair| {
                    let name = pair.split_once('=').map_or(*pair, |(name, _)| name);
                    !keys.iter().any(|k| k == name)
                })
                .collect();
            format!("{}?{}", head, kept.join("&"))
        }
        _ => without_fragment.to_string(),
    };

    cleaned.trim_end_matches(['&', '?']).to_string()
}

/// Checks a URL against the configured skip patterns
///
/// Patterns are matched against the path and query of the URL. An empty
/// pattern list never skips anything.
pub fn should_skip(url: &str, patterns: &[Regex]) -> bool {
    if patterns.is_empty() {
        return false;
    }

    let target = match Url::parse(url) {
        Ok(parsed) => match parsed.query() {
            Some(query) => format!("{}?{}", parsed.path(), query),
            None => parsed.path().to_string(),
        },
        Err(_) => url.to_string(),
    };

    patterns.iter().any(|p| p.is_match(&target))
}
