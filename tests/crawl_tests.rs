//! Integration tests for the crawler
//!
//! These tests use wiremock to serve a small site and run full passes
//! end-to-end through the HTTP fetcher and the SQLite checkpoint store.

use site_spider::config::{load_config_with_hash, Config};
use site_spider::crawler::{Coordinator, HttpFetcher, RunOptions, RunReport};
use site_spider::notify::MemoryNotifier;
use site_spider::storage::{CheckpointStore, SqliteStore, FRONTIER_KEY};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A page above the body-size floor linking to `links`
fn page(links: &[&str], extra: &str) -> String {
    let anchors: String = links
        .iter()
        .map(|l| format!("<a href=\"{}\">{}</a>\n", l, l))
        .collect();
    format!(
        "<html><head><title>Test</title></head><body>\n{}{}\n<p>{}</p></body></html>",
        anchors,
        extra,
        "filler text ".repeat(120)
    )
}

async fn serve(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// Writes a configuration file for the mock site and loads it back
fn load_config(dir: &Path, website: &str) -> (Config, String) {
    let file = dir.join("spider.toml");
    std::fs::write(
        &file,
        format!(
            r#"
[site]
website = "{}"
sitemap-file = "{}"
imagemap-file = "{}"
handlers = ["sitemap", "imagemap", "linking"]

[crawler]
delay-ms = 0
load-timeout = 5
thin-content-threshold = 0

[sitemap]
change-freq = "weekly"
priority = 0.5
disallow-keys = ["utm_source"]
disallow-patterns = ['^/private/']

[notify]
email-notify = "admin@example.com"
email-json = "log@example.com"

[storage]
database-path = "{}"
"#,
            website,
            dir.join("sitemap.xml").display(),
            dir.join("imagemap.xml").display(),
            dir.join("spider.db").display()
        ),
    )
    .expect("Failed to write config");

    load_config_with_hash(&file).expect("Failed to load config")
}

fn coordinator(
    config: Config,
    hash: &str,
    options: RunOptions,
    notifier: &Arc<MemoryNotifier>,
) -> Coordinator {
    let fetcher = HttpFetcher::from_config(&config.user_agent, &config.crawler)
        .expect("Failed to build fetcher");
    let store = SqliteStore::new(&config.storage.database_path).expect("Failed to open DB");

    Coordinator::with_parts(
        config,
        options,
        hash,
        Box::new(fetcher),
        Box::new(store),
        notifier.clone(),
    )
    .expect("Failed to create coordinator")
}

#[tokio::test]
async fn test_full_pass_then_diff() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    serve(
        &server,
        "/",
        page(
            &["/a.html", "/b.html?utm_source=mail", "/private/x", "https://other.org/"],
            r#"<!--start_content--><a href="/a.html">A</a> <a href="/b.html">B</a><!--end_content-->
               <img src="/img/logo.png" alt="Logo"> <img src="data:image/png;base64,AAAA">"#,
        ),
    )
    .await;
    serve(&server, "/a.html", page(&["/", "b.html"], r#"<!--start_content--><a href="b.html">B</a><!--end_content-->"#)).await;
    serve(&server, "/b.html", page(&["/a.html"], "")).await;

    let (config, hash) = load_config(dir.path(), &base);
    let notifier = Arc::new(MemoryNotifier::new());

    let mut first = coordinator(config.clone(), &hash, RunOptions::default(), &notifier);
    let report = first.run().await.expect("First pass failed");
    assert!(matches!(report, RunReport::Completed { pages: 3, external: 1, .. }));
    assert!(first.store().load_record(FRONTIER_KEY).unwrap().is_none());
    drop(first);

    let sitemap = std::fs::read_to_string(dir.path().join("sitemap.xml")).unwrap();
    assert!(sitemap.contains(&format!("<loc>{}/b.html</loc><changefreq>weekly</changefreq>", base)));
    assert!(!sitemap.contains("private"));
    assert!(!sitemap.contains("utm_source"));

    let imagemap = std::fs::read_to_string(dir.path().join("imagemap.xml")).unwrap();
    assert!(imagemap.contains(&format!("<image:loc>{}/img/logo.png</image:loc>", base)));
    assert!(!imagemap.contains("data:"));

    let radar = notifier.with_subject("- linking");
    assert_eq!(radar.len(), 1);
    assert!(radar[0].text.contains(&format!("{}/b.html - 2", base)));

    // The site changes: b.html disappears, c.html appears
    server.reset().await;
    serve(&server, "/", page(&["/a.html", "/c.html", "https://other.org/"], "")).await;
    serve(&server, "/a.html", page(&["/", "c.html"], "")).await;
    serve(&server, "/c.html", page(&["/"], "")).await;

    let notifier = Arc::new(MemoryNotifier::new());
    let forced = RunOptions {
        force: true,
        ..RunOptions::default()
    };
    let mut second = coordinator(config, &hash, forced, &notifier);
    let report = second.run().await.expect("Second pass failed");
    assert!(matches!(report, RunReport::Completed { pages: 3, .. }));

    let sent = notifier.sent();
    let diff = &sent[0];
    assert!(diff.text.contains(&format!("Pages added\n{}/c.html\n", base)));
    assert!(diff.text.contains(&format!("Pages removed\n{}/b.html\n", base)));
    assert!(diff.text.contains("No new external links"));

    let records = notifier.with_subject("sitemap result");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].recipient.as_deref(), Some("log@example.com"));
    assert!(records[0].text.contains(&format!("\"add\":[\"{}/c.html\"]", base)));

    let radar = notifier.with_subject("- linking");
    assert_eq!(radar.len(), 1);
    assert!(radar[0].text.contains("markers"));
}

#[tokio::test]
async fn test_same_day_run_is_skipped() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page(&[], "")))
        .expect(0)
        .mount(&server)
        .await;

    let (config, hash) = load_config(dir.path(), &server.uri());
    std::fs::write(&config.site.sitemap_file, "<urlset/>").unwrap();
    let notifier = Arc::new(MemoryNotifier::new());

    let mut coordinator = coordinator(config, &hash, RunOptions::default(), &notifier);
    let report = coordinator.run().await.expect("Run failed");

    assert!(matches!(report, RunReport::UpToDate(_)));
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn test_broken_links_reported_once() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();

    serve(&server, "/", page(&["/ok.html", "/missing.html", "/gone.html"], "")).await;
    serve(&server, "/ok.html", page(&["/"], "")).await;

    let (config, hash) = load_config(dir.path(), &base);
    let notifier = Arc::new(MemoryNotifier::new());

    let mut coordinator = coordinator(config, &hash, RunOptions::default(), &notifier);
    let report = coordinator.run().await.expect("Run failed");
    assert!(matches!(report, RunReport::Completed { pages: 2, .. }));

    let digests = notifier.with_subject("sitemap error");
    assert_eq!(digests.len(), 1);
    assert!(digests[0]
        .text
        .contains(&format!("Page {}/missing.html is unavailable. Status: 404", base)));
    assert!(digests[0].text.contains(&format!("{}/gone.html", base)));
}
