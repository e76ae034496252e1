//! Link extraction from fetched pages
//!
//! Extraction is a best-effort scan: it does not validate the markup, it only
//! has to find the `href` of every anchor in document order. The scan sits
//! behind [`LinkExtractor`] so the run loop never depends on how it is done.

use crate::state::RadarCounts;
use encoding_rs::WINDOWS_1251;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;

static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script.*?</script>").expect("static regex"));

static ANCHOR_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<a\s([^>]*)>").expect("static regex"));

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([\w-]+)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#).expect("static regex")
});

static BASE_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<base\s[^>]*?href\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("static regex")
});

static RADAR_OFF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<!--start_content_off-->.*?<!--end_content_off-->").expect("static regex")
});

static RADAR_REGION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<!--start_content-->(.*?)<!--end_content-->").expect("static regex")
});

/// Links found on one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedLinks {
    /// Raw hrefs in document order
    pub links: Vec<String>,
    /// Value of the page's `<base href>`, if declared
    pub base: Option<String>,
}

/// One `<img>` tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTag {
    pub src: String,
    pub alt: String,
    pub title: String,
}

/// Pulls links and images out of page content
pub trait LinkExtractor: Send + Sync {
    /// Raw anchor hrefs, minus empty, fragment-only and `javascript:` links
    fn extract(&self, html: &str) -> ExtractedLinks;

    /// Anchor hrefs inside radar regions, with their number of occurrences
    fn extract_radar(&self, html: &str) -> RadarCounts;

    /// `<img>` tags with a non-empty `src`
    fn extract_images(&self, html: &str) -> Vec<ImageTag>;
}

/// Regex-driven scanner tolerant of broken markup and unquoted attributes
#[derive(Debug, Clone, Copy, Default)]
pub struct TolerantScanner;

impl TolerantScanner {
    pub fn new() -> Self {
        Self
    }

    fn anchor_hrefs(text: &str) -> Vec<String> {
        ANCHOR_TAG
            .captures_iter(text)
            .filter_map(|tag| tag.get(1).and_then(|attrs| href_of(attrs.as_str())))
            .filter(|href| is_followable(href))
            .collect()
    }
}

impl LinkExtractor for TolerantScanner {
    fn extract(&self, html: &str) -> ExtractedLinks {
        let base = BASE_HREF
            .captures(html)
            .and_then(|c| c.get(1).or_else(|| c.get(2)).or_else(|| c.get(3)))
            .map(|m| m.as_str().trim().to_string())
            .filter(|b| !b.is_empty());

        let stripped = SCRIPT_BLOCK.replace_all(html, "");

        ExtractedLinks {
            links: Self::anchor_hrefs(&stripped),
            base,
        }
    }

    fn extract_radar(&self, html: &str) -> RadarCounts {
        let visible = RADAR_OFF.replace_all(html, "");
        let mut counts = RadarCounts::new();

        for region in RADAR_REGION.captures_iter(&visible) {
            let Some(body) = region.get(1) else {
                continue;
            };
            for href in Self::anchor_hrefs(body.as_str()) {
                *counts.entry(href).or_insert(0) += 1;
            }
        }

        counts
    }

    fn extract_images(&self, html: &str) -> Vec<ImageTag> {
        let document = Html::parse_document(html);
        let Ok(selector) = Selector::parse("img[src]") else {
            return Vec::new();
        };

        document
            .select(&selector)
            .filter_map(|element| {
                let attrs = element.value();
                let src = attrs.attr("src")?.trim();
                if src.is_empty() {
                    return None;
                }
                Some(ImageTag {
                    src: src.to_string(),
                    alt: attrs.attr("alt").unwrap_or_default().trim().to_string(),
                    title: attrs.attr("title").unwrap_or_default().trim().to_string(),
                })
            })
            .collect()
    }
}

/// Finds the `href` value among the attributes of one tag
fn href_of(attributes: &str) -> Option<String> {
    ATTRIBUTE.captures_iter(attributes).find_map(|attr| {
        let name = attr.get(1)?.as_str();
        if !name.eq_ignore_ascii_case("href") {
            return None;
        }
        attr.get(2)
            .or_else(|| attr.get(3))
            .or_else(|| attr.get(4))
            .map(|v| v.as_str().to_string())
    })
}

fn is_followable(href: &str) -> bool {
    !href.is_empty()
        && !href.starts_with('#')
        && !href
            .get(..11)
            .is_some_and(|p| p.eq_ignore_ascii_case("javascript:"))
}

/// Decodes a response body
///
/// Bodies that are not valid UTF-8 are read as windows-1251, the legacy
/// encoding pages on the crawled sites fall back to.
pub fn decode_content(body: &[u8]) -> String {
    match std::str::from_utf8(body) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (text, _, _) = WINDOWS_1251.decode(body);
            text.into_owned()
        }
    }
}
