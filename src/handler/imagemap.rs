//! Image sitemap handler

use crate::handler::{ensure_writable, handler_error, xml_escape, HandlerContext};
use crate::storage::{load_json, save_json, CheckpointStore, IMAGEMAP_KEY};
use crate::url::{is_external, resolve};
use crate::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use tracing::{debug, info, warn};

/// An image listed in the image sitemap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageEntry {
    /// Absolute URL of the image
    pub src: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub title: String,
}

/// Images per page, in crawl order
pub type PageImages = IndexMap<String, Vec<ImageEntry>>;

/// Collects site-hosted images and writes the image sitemap
#[derive(Debug, Default)]
pub struct ImageMapHandler {
    images: PageImages,
}

impl ImageMapHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn images(&self) -> &PageImages {
        &self.images
    }

    pub fn load(&mut self, ctx: &HandlerContext<'_>, store: &dyn CheckpointStore) -> Result<()> {
        ensure_writable(&ctx.config.site.imagemap_file, ctx.notifier)?;

        if let Some(images) = load_json::<PageImages>(store, IMAGEMAP_KEY)? {
            debug!("Restored images of {} pages", images.len());
            self.images = images;
        }
        Ok(())
    }

    /// Records the site-hosted images of one page
    ///
    /// Inline `data:` images, images on other hosts and images matching the
    /// image skip patterns are left out.
    pub fn parse(&mut self, ctx: &HandlerContext<'_>, url: &str, content: &str) -> Result<()> {
        let mut entries = Vec::new();

        for tag in ctx.extractor.extract_images(content) {
            if tag.src.starts_with("data:") {
                continue;
            }

            match is_external(&tag.src, url, &ctx.policy.host) {
                Ok(false) => {}
                Ok(true) => continue,
                Err(e) => {
                    warn!("Image skipped: {}", e);
                    continue;
                }
            }

            let src = match resolve(&ctx.policy.website, &tag.src, url, None) {
                Ok(src) => src,
                Err(e) => {
                    warn!("Image skipped: {}", e);
                    continue;
                }
            };

            if ctx.policy.skip_image(&src) {
                continue;
            }

            entries.push(ImageEntry {
                src,
                alt: tag.alt,
                title: tag.title,
            });
        }

        if entries.is_empty() {
            self.images.shift_remove(url);
        } else {
            self.images.insert(url.to_string(), entries);
        }
        Ok(())
    }

    pub fn save(&self, ctx: &HandlerContext<'_>, store: &mut dyn CheckpointStore) -> Result<()> {
        if !self.images.is_empty() {
            save_json(store, IMAGEMAP_KEY, &self.images, ctx.config_hash)?;
        }
        Ok(())
    }

    /// Writes the image sitemap and drops the checkpoint
    pub fn finish(&mut self, ctx: &HandlerContext<'_>, store: &mut dyn CheckpointStore) -> Result<()> {
        let path = &ctx.config.site.imagemap_file;
        fs::write(path, render_imagemap(&self.images)).map_err(|e| {
            handler_error("imagemap", format!("cannot write {}: {}", path.display(), e))
        })?;

        store.delete_record(IMAGEMAP_KEY)?;

        info!(
            "Image sitemap with {} pages saved to {}",
            self.images.len(),
            path.display()
        );
        Ok(())
    }
}

/// Renders the image sitemap document
pub fn render_imagemap(images: &PageImages) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\"\n \
         xmlns:image=\"http://www.google.com/schemas/sitemap-image/1.1\">\n",
    );

    for (page, entries) in images {
        xml.push_str(&format!("<url><loc>{}</loc>\n", xml_escape(page)));
        for image in entries {
            xml.push_str("<image:image>\n");
            xml.push_str(&format!("<image:loc>{}</image:loc>\n", xml_escape(&image.src)));
            if !image.alt.is_empty() {
                xml.push_str(&format!("<image:title>{}</image:title>\n", xml_escape(&image.alt)));
            }
            if !image.title.is_empty() && image.title != image.alt {
                xml.push_str(&format!(
                    "<image:caption>{}</image:caption>\n",
                    xml_escape(&image.title)
                ));
            }
            xml.push_str("</image:image>\n");
        }
        xml.push_str("</url>\n");
    }

    xml.push_str("</urlset>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_config, Config};
    use crate::crawler::{RunOptions, TolerantScanner};
    use crate::notify::MemoryNotifier;
    use crate::storage::SqliteStore;
    use crate::url::SitePolicy;
    use tempfile::TempDir;

    const PAGE: &str = "http://ex.com/gallery/index.html";

    fn config(dir: &TempDir) -> Config {
        parse_config(&format!(
            r#"
[site]
website = "http://ex.com"
sitemap-file = "{}"
imagemap-file = "{}"
handlers = ["sitemap", "imagemap"]

[sitemap]
disallow-image-patterns = ['^/icons/']

[storage]
database-path = "spider.db"
"#,
            dir.path().join("sitemap.xml").display(),
            dir.path().join("imagemap.xml").display()
        ))
        .unwrap()
    }

    fn parse_page(handler: &mut ImageMapHandler, config: &Config, html: &str) {
        let policy = SitePolicy::from_config(config).unwrap();
        let notifier = MemoryNotifier::new();
        let ctx = HandlerContext {
            config,
            policy: &policy,
            extractor: &TolerantScanner,
            notifier: &notifier,
            options: RunOptions::default(),
            config_hash: "h",
        };
        handler.parse(&ctx, PAGE, html).unwrap();
    }

    #[test]
    fn test_parse_filters_images() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let mut handler = ImageMapHandler::new();

        parse_page(
            &mut handler,
            &config,
            r#"
            <img src="photo.jpg" alt="Photo" title="A photo">
            <img src="/icons/star.png" alt="star">
            <img src="http://cdn.other.com/x.png">
            <img src="data:image/gif;base64,R0lGOD">
            <img src="http://ex.com/abs.png" alt="Abs" title="Abs">
            "#,
        );

        let images = &handler.images()[PAGE];
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].src, "http://ex.com/gallery/photo.jpg");
        assert_eq!(images[1].src, "http://ex.com/abs.png");
    }

    #[test]
    fn test_page_without_images_is_not_listed() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let mut handler = ImageMapHandler::new();

        parse_page(&mut handler, &config, "<p>no images</p>");
        assert!(handler.images().is_empty());
    }

    #[test]
    fn test_render_imagemap() {
        let mut images = PageImages::new();
        images.insert(
            "http://ex.com/".to_string(),
            vec![
                ImageEntry {
                    src: "http://ex.com/a.png".to_string(),
                    alt: "A".to_string(),
                    title: "A".to_string(),
                },
                ImageEntry {
                    src: "http://ex.com/b.png".to_string(),
                    alt: String::new(),
                    title: "Tom & Jerry".to_string(),
                },
            ],
        );

        let xml = render_imagemap(&images);

        assert!(xml.contains("xmlns:image=\"http://www.google.com/schemas/sitemap-image/1.1\""));
        assert!(xml.contains("<image:loc>http://ex.com/a.png</image:loc>\n<image:title>A</image:title>\n</image:image>"));
        assert!(xml.contains("<image:loc>http://ex.com/b.png</image:loc>\n<image:caption>Tom &amp; Jerry</image:caption>"));
    }

    #[test]
    fn test_save_load_finish() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let policy = SitePolicy::from_config(&config).unwrap();
        let notifier = MemoryNotifier::new();
        let mut store = SqliteStore::new_in_memory().unwrap();
        let ctx = HandlerContext {
            config: &config,
            policy: &policy,
            extractor: &TolerantScanner,
            notifier: &notifier,
            options: RunOptions::default(),
            config_hash: "h",
        };

        let mut first = ImageMapHandler::new();
        first.parse(&ctx, PAGE, r#"<img src="a.png">"#).unwrap();
        first.save(&ctx, &mut store).unwrap();

        let mut resumed = ImageMapHandler::new();
        resumed.load(&ctx, &store).unwrap();
        assert_eq!(resumed.images(), first.images());

        resumed.finish(&ctx, &mut store).unwrap();
        assert!(store.load_record(IMAGEMAP_KEY).unwrap().is_none());
        let xml = fs::read_to_string(&config.site.imagemap_file).unwrap();
        assert!(xml.contains("http://ex.com/gallery/a.png"));
    }
}
