//! XML sitemap handler

use crate::config::Config;
use crate::handler::{ensure_writable, HandlerContext};
use crate::output::compare_sitemap;
use crate::state::{FrontierState, Snapshot};
use crate::storage::{CheckpointStore, FRONTIER_KEY};
use crate::{Result, SpiderError};
use chrono::{DateTime, Local, Utc};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{info, warn};

/// Text following `&` that makes it an entity reference already
static ENTITY_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z]{0,4}\w{2,3}|#\d{2,4});").expect("static regex")
});

/// Hours without a frontier write after which a stale sitemap is reported
const IDLE_CHECKPOINT_HOURS: i64 = 12;

/// Writes the XML sitemap of a completed pass
#[derive(Debug, Default)]
pub struct SiteMapHandler;

impl SiteMapHandler {
    pub fn new() -> Self {
        Self
    }

    /// Checks the sitemap file before crawling
    ///
    /// # Errors
    ///
    /// * `SpiderError::Fatal` - The sitemap cannot be written
    /// * `SpiderError::UpToDate` - The sitemap was already written today and
    ///   the run is not forced
    pub fn load(&mut self, ctx: &HandlerContext<'_>, store: &dyn CheckpointStore) -> Result<()> {
        let path = &ctx.config.site.sitemap_file;
        ensure_writable(path, ctx.notifier)?;

        let Some(modified) = modified_at(path) else {
            return Ok(());
        };

        if modified.with_timezone(&Local).date_naive() == Local::now().date_naive() {
            if !ctx.options.force {
                return Err(SpiderError::UpToDate(path.display().to_string()));
            }
            warn!(
                "Sitemap {} already created today, continuing because the run is forced",
                path.display()
            );
            return Ok(());
        }

        let now = Utc::now();
        let stale_after = ctx.config.crawler.existence_time as i64 * 2;
        let sitemap_age = (now - modified).num_hours();
        let checkpoint_idle = store
            .load_record(FRONTIER_KEY)?
            .map(|record| record.age_hours(now) > IDLE_CHECKPOINT_HOURS)
            .unwrap_or(false);

        if sitemap_age > stale_after && checkpoint_idle {
            warn!("Sitemap is {} hours old", sitemap_age);
            ctx.notifier.notify(
                &format!(
                    "The sitemap was last updated more than {} hours ago.",
                    stale_after
                ),
                None,
                None,
            );
        }

        Ok(())
    }

    /// Reports the diff against the previous pass, then writes the sitemap
    pub fn finish(
        &mut self,
        ctx: &HandlerContext<'_>,
        store: &mut dyn CheckpointStore,
        frontier: &FrontierState,
    ) -> Result<()> {
        compare_sitemap(
            store,
            &Snapshot::from_frontier(frontier),
            ctx.config_hash,
            ctx.notifier,
            &ctx.config.notify.email_json,
            &ctx.config.host(),
        )?;

        let xml = render_sitemap(frontier.visited.iter(), ctx.config, Local::now());
        let path = &ctx.config.site.sitemap_file;
        fs::write(path, xml)?;

        info!(
            "Sitemap with {} pages saved to {}",
            frontier.visited.len(),
            path.display()
        );
        Ok(())
    }
}

fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

/// Renders the sitemap document
pub fn render_sitemap<'a>(
    urls: impl IntoIterator<Item = &'a String>,
    config: &Config,
    now: DateTime<Local>,
) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\" \
         xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
         xsi:schemaLocation=\"http://www.sitemaps.org/schemas/sitemap/0.9 \
         https://www.sitemaps.org/schemas/sitemap/0.9/sitemap.xsd\">\n",
    );
    xml.push_str(&format!(
        "<!-- Last update of sitemap {} -->\n",
        now.format("%Y-%m-%dT%H:%M:%S%:z")
    ));

    for url in urls {
        xml.push_str(&format!(
            "<url><loc>{}</loc><changefreq>{}</changefreq><priority>{:.1}</priority></url>\n",
            xml_escape(url),
            config.sitemap.change_freq,
            config.sitemap.priority_for(url)
        ));
    }

    xml.push_str("</urlset>\n");
    xml
}

/// Escapes XML reserved characters
///
/// An ampersand that already starts an entity reference is kept as is.
///
/// # Examples
///
/// ```
/// use site_spider::handler::xml_escape;
///
/// assert_eq!(xml_escape("/a?x=1&y=<2>"), "/a?x=1&amp;y=&lt;2&gt;");
/// assert_eq!(xml_escape("/a?x=1&amp;y=2"), "/a?x=1&amp;y=2");
/// ```
pub fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());

    for (i, c) in text.char_indices() {
        match c {
            '&' if ENTITY_TAIL.is_match(&text[i + 1..]) => out.push('&'),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::crawler::{RunOptions, TolerantScanner};
    use crate::notify::MemoryNotifier;
    use crate::storage::{SqliteStore, StoredRecord, SITEMAP_SNAPSHOT_KEY};
    use crate::url::SitePolicy;
    use chrono::{Duration, TimeZone};
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> Config {
        parse_config(&format!(
            r#"
[site]
website = "http://ex.com"
sitemap-file = "{}"

[sitemap]
change-freq = "daily"
priority = 0.5

[sitemap.priorities]
"http://ex.com/top" = 1.0

[storage]
database-path = "spider.db"
"#,
            dir.path().join("sitemap.xml").display()
        ))
        .unwrap()
    }

    fn context<'a>(
        config: &'a Config,
        policy: &'a SitePolicy,
        notifier: &'a MemoryNotifier,
        options: RunOptions,
    ) -> HandlerContext<'a> {
        HandlerContext {
            config,
            policy,
            extractor: &TolerantScanner,
            notifier,
            options,
            config_hash: "h",
        }
    }

    #[test]
    fn test_xml_escape() {
        assert_eq!(xml_escape("a&b"), "a&amp;b");
        assert_eq!(xml_escape("a&#38;b"), "a&#38;b");
        assert_eq!(xml_escape("a&quot;b"), "a&quot;b");
        assert_eq!(xml_escape("it's \"x\""), "it&apos;s &quot;x&quot;");
        assert_eq!(xml_escape("&"), "&amp;");
    }

    #[test]
    fn test_render_sitemap() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let urls = vec!["http://ex.com/".to_string(), "http://ex.com/top".to_string()];
        let now = Local.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap();

        let xml = render_sitemap(&urls, &config, now);

        assert!(xml.contains("<!-- Last update of sitemap 2024-05-01T10:30:00"));
        assert!(xml.contains(
            "<url><loc>http://ex.com/</loc><changefreq>daily</changefreq><priority>0.5</priority></url>"
        ));
        assert!(xml.contains("<loc>http://ex.com/top</loc><changefreq>daily</changefreq><priority>1.0</priority>"));
        assert!(xml.trim_end().ends_with("</urlset>"));
    }

    #[test]
    fn test_load_fresh_sitemap_is_up_to_date() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let policy = SitePolicy::from_config(&config).unwrap();
        let notifier = MemoryNotifier::new();
        let store = SqliteStore::new_in_memory().unwrap();
        fs::write(&config.site.sitemap_file, "<urlset/>").unwrap();

        let ctx = context(&config, &policy, &notifier, RunOptions::default());
        let result = SiteMapHandler::new().load(&ctx, &store);
        assert!(matches!(result, Err(SpiderError::UpToDate(_))));
        assert!(notifier.sent().is_empty());

        let forced = RunOptions {
            force: true,
            ..RunOptions::default()
        };
        let ctx = context(&config, &policy, &notifier, forced);
        assert!(SiteMapHandler::new().load(&ctx, &store).is_ok());
    }

    #[test]
    fn test_load_without_sitemap() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let policy = SitePolicy::from_config(&config).unwrap();
        let notifier = MemoryNotifier::new();
        let store = SqliteStore::new_in_memory().unwrap();

        let ctx = context(&config, &policy, &notifier, RunOptions::default());
        assert!(SiteMapHandler::new().load(&ctx, &store).is_ok());
        assert!(!config.site.sitemap_file.exists());
    }

    #[test]
    fn test_finish_writes_sitemap_and_snapshot() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let policy = SitePolicy::from_config(&config).unwrap();
        let notifier = MemoryNotifier::new();
        let mut store = SqliteStore::new_in_memory().unwrap();

        let mut frontier = FrontierState::new();
        frontier.seed("http://ex.com/");
        frontier.discover("http://ex.com/a?x=1&y=2", "http://ex.com/");
        frontier.mark_visited("http://ex.com/");
        frontier.mark_visited("http://ex.com/a?x=1&y=2");

        let ctx = context(&config, &policy, &notifier, RunOptions::default());
        SiteMapHandler::new()
            .finish(&ctx, &mut store, &frontier)
            .unwrap();

        let xml = fs::read_to_string(&config.site.sitemap_file).unwrap();
        assert!(xml.contains("<loc>http://ex.com/a?x=1&amp;y=2</loc>"));
        assert!(store.load_record(SITEMAP_SNAPSHOT_KEY).unwrap().is_some());
        assert_eq!(notifier.sent().len(), 1);
    }

    #[test]
    fn test_stale_sitemap_is_reported() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let policy = SitePolicy::from_config(&config).unwrap();
        let notifier = MemoryNotifier::new();
        let mut store = SqliteStore::new_in_memory().unwrap();

        fs::write(&config.site.sitemap_file, "<urlset/>").unwrap();
        let three_days_ago = SystemTime::now() - std::time::Duration::from_secs(72 * 3600);
        fs::File::options()
            .write(true)
            .open(&config.site.sitemap_file)
            .unwrap()
            .set_modified(three_days_ago)
            .unwrap();

        let mut record = StoredRecord::encode(&FrontierState::new(), "h").unwrap();
        record.updated_at = Utc::now() - Duration::hours(13);
        store.save_record(FRONTIER_KEY, &record).unwrap();

        let ctx = context(&config, &policy, &notifier, RunOptions::default());
        SiteMapHandler::new().load(&ctx, &store).unwrap();

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.contains("more than 50 hours"));
    }
}
