use crate::{UrlError, UrlResult};
use url::Url;

/// Resolves a raw href into an absolute URL
///
/// # Resolution Steps
///
/// 1. Turn `&amp;` back into `&` and decode percent-escapes
/// 2. Reject links with leading or trailing whitespace
/// 3. `//host/path` inherits the website's scheme
/// 4. Absolute `http(s)` links are returned as-is; a host-only link gains a `/`
/// 5. Otherwise the link is joined to the directory of `current`:
///    - `?query` is rebased onto the current file name
///    - `/path` discards the directory
///    - one leading `./` is stripped, each leading `../` pops a directory
/// 6. A page-declared `<base href>` replaces the directory for the final join
///
/// # Arguments
///
/// * `website` - The site root (its scheme is used for `//` links)
/// * `link` - The raw href as found in the page
/// * `current` - The absolute URL of the page the link was found on
/// * `base` - The page's `<base href>` value, if any
///
/// # Examples
///
/// ```
/// use site_spider::url::resolve;
///
/// let page = "http://ex.com/a/c.html";
/// assert_eq!(resolve("http://ex.com/", "../b.html", page, None).unwrap(), "http://ex.com/b.html");
/// assert_eq!(resolve("http://ex.com/", "?p=1", page, None).unwrap(), "http://ex.com/a/c.html?p=1");
/// ```
pub fn resolve(website: &str, link: &str, current: &str, base: Option<&str>) -> UrlResult<String> {
    let link = decode_link(link);

    if link.chars().count() > 1
        && (link.starts_with(char::is_whitespace) || link.ends_with(char::is_whitespace))
    {
        return Err(UrlError::MalformedLink {
            link,
            page: current.to_string(),
        });
    }

    let link = if link.starts_with("//") {
        format!("{}:{}", scheme_of(website)?, link)
    } else {
        link
    };

    if has_http_scheme(&link) {
        return Ok(ensure_root_slash(link));
    }

    let page = Url::parse(current).map_err(|e| UrlError::Parse(format!("{}: {}", current, e)))?;
    let origin = origin_of(&page)?;
    let path = page.path();

    let mut link = link;
    let mut dir = if let Some(stripped) = path.strip_suffix('/') {
        stripped.to_string()
    } else {
        if link.starts_with('?') {
            link = format!("{}{}", basename(path), link);
        }
        match dirname(path) {
            "/" => String::new(),
            d => d.to_string(),
        }
    };

    if let Some(rest) = link.strip_prefix('/') {
        link = rest.to_string();
        dir.clear();
    }

    if let Some(rest) = link.strip_prefix("./") {
        link = rest.to_string();
    } else {
        while let Some(rest) = link.strip_prefix("../") {
            link = rest.to_string();
            dir.truncate(dir.rfind('/').unwrap_or(0));
        }
    }

    if let Some(base) = base.map(str::trim).filter(|b| !b.is_empty()) {
        let mut base = absolute_base(base, &origin, &dir, website)?;
        if !base.ends_with('/') {
            base.push('/');
        }
        return Ok(format!("{}{}", base, link));
    }

    Ok(format!("{}{}/{}", origin, dir, link))
}

/// Decodes `&amp;` entities and percent-escapes so equivalent links converge
pub fn decode_link(link: &str) -> String {
    let unescaped = link.replace("&amp;", "&");
    String::from_utf8_lossy(&urlencoding::decode_binary(unescaped.as_bytes())).into_owned()
}

/// Returns true for links carrying an explicit `http:` or `https:` scheme
pub(crate) fn has_http_scheme(link: &str) -> bool {
    let lower = link.get(..8).unwrap_or(link).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Appends `/` to a host-only absolute link, keeping any query or fragment
fn ensure_root_slash(link: String) -> String {
    let Some(authority_start) = link.find("://").map(|i| i + 3) else {
        return link;
    };
    let rest = &link[authority_start..];
    match rest.find(['/', '?', '#']) {
        Some(i) if rest.as_bytes()[i] == b'/' => link,
        Some(i) => {
            let split = authority_start + i;
            format!("{}/{}", &link[..split], &link[split..])
        }
        None => format!("{}/", link),
    }
}

/// Makes a `<base href>` value absolute
fn absolute_base(base: &str, origin: &str, dir: &str, website: &str) -> UrlResult<String> {
    if base.starts_with("//") {
        return Ok(format!("{}:{}", scheme_of(website)?, base));
    }
    if has_http_scheme(base) {
        return Ok(ensure_root_slash(base.to_string()));
    }
    if base.starts_with('/') {
        return Ok(format!("{}{}", origin, base));
    }
    Ok(format!("{}{}/{}", origin, dir, base.trim_start_matches("./")))
}

fn scheme_of(website: &str) -> UrlResult<String> {
    Url::parse(website)
        .map(|u| u.scheme().to_string())
        .map_err(|e| UrlError::Parse(format!("{}: {}", website, e)))
}

/// `scheme://host[:port]` of a parsed URL
pub(crate) fn origin_of(url: &Url) -> UrlResult<String> {
    let host = url
        .host_str()
        .ok_or_else(|| UrlError::MissingHost(url.to_string()))?;
    let port = url.port().map(|p| format!(":{}", p)).unwrap_or_default();
    Ok(format!("{}://{}{}", url.scheme(), host, port))
}

fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
