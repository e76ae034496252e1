//! Content handlers
//!
//! Every fetched page is passed to the handlers enabled in configuration.
//! A handler follows the life cycle of a pass:
//!
//! 1. `load` - restore the handler's checkpoint at the start of an invocation
//! 2. `parse` - called once per analyzed page, in configuration order
//! 3. `save` - persist partial state when the invocation runs out of time
//! 4. `finish` - produce the final artifact once the pass completes

mod imagemap;
mod linking;
mod sitemap;

pub use imagemap::{render_imagemap, ImageEntry, ImageMapHandler, PageImages};
pub use linking::LinkingHandler;
pub use sitemap::{render_sitemap, xml_escape, SiteMapHandler};

use crate::config::{Config, HandlerKind};
use crate::crawler::{LinkExtractor, RunOptions};
use crate::notify::Notifier;
use crate::state::FrontierState;
use crate::storage::CheckpointStore;
use crate::url::SitePolicy;
use crate::{Result, SpiderError};
use std::fs;
use std::path::Path;

/// Read-only view of the session handed to handlers
pub struct HandlerContext<'a> {
    pub config: &'a Config,
    pub policy: &'a SitePolicy,
    pub extractor: &'a dyn LinkExtractor,
    pub notifier: &'a dyn Notifier,
    pub options: RunOptions,
    pub config_hash: &'a str,
}

/// A content handler selected by configuration
#[derive(Debug)]
pub enum Handler {
    SiteMap(SiteMapHandler),
    ImageMap(ImageMapHandler),
    Linking(LinkingHandler),
}

impl Handler {
    pub fn from_kind(kind: HandlerKind) -> Self {
        match kind {
            HandlerKind::Sitemap => Self::SiteMap(SiteMapHandler::new()),
            HandlerKind::Imagemap => Self::ImageMap(ImageMapHandler::new()),
            HandlerKind::Linking => Self::Linking(LinkingHandler::new()),
        }
    }

    /// Builds the handlers enabled in configuration, in order
    pub fn from_config(config: &Config) -> Vec<Self> {
        config
            .site
            .handlers
            .iter()
            .map(|kind| Self::from_kind(*kind))
            .collect()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SiteMap(_) => HandlerKind::Sitemap.name(),
            Self::ImageMap(_) => HandlerKind::Imagemap.name(),
            Self::Linking(_) => HandlerKind::Linking.name(),
        }
    }

    /// Restores checkpointed state and checks the handler's outputs
    pub fn load(&mut self, ctx: &HandlerContext<'_>, store: &dyn CheckpointStore) -> Result<()> {
        match self {
            Self::SiteMap(h) => h.load(ctx, store),
            Self::ImageMap(h) => h.load(ctx, store),
            Self::Linking(h) => h.load(store),
        }
    }

    /// Drops any state restored by `load`
    pub fn reset(&mut self) {
        *self = match self {
            Self::SiteMap(_) => Self::from_kind(HandlerKind::Sitemap),
            Self::ImageMap(_) => Self::from_kind(HandlerKind::Imagemap),
            Self::Linking(_) => Self::from_kind(HandlerKind::Linking),
        };
    }

    /// Processes the content of one analyzed page
    pub fn parse(&mut self, ctx: &HandlerContext<'_>, url: &str, content: &str) -> Result<()> {
        match self {
            Self::SiteMap(_) => Ok(()),
            Self::ImageMap(h) => h.parse(ctx, url, content),
            Self::Linking(h) => h.parse(ctx, url, content),
        }
    }

    /// Persists partial state
    pub fn save(&self, ctx: &HandlerContext<'_>, store: &mut dyn CheckpointStore) -> Result<()> {
        match self {
            Self::SiteMap(_) => Ok(()),
            Self::ImageMap(h) => h.save(ctx, store),
            Self::Linking(h) => h.save(ctx, store),
        }
    }

    /// Produces the final artifact of a completed pass
    pub fn finish(
        &mut self,
        ctx: &HandlerContext<'_>,
        store: &mut dyn CheckpointStore,
        frontier: &FrontierState,
    ) -> Result<()> {
        match self {
            Self::SiteMap(h) => h.finish(ctx, store, frontier),
            Self::ImageMap(h) => h.finish(ctx, store),
            Self::Linking(h) => h.finish(ctx, store),
        }
    }
}

/// Fails unless `path` can be written
///
/// A missing file is created and removed again to prove the directory is
/// writable.
pub(crate) fn ensure_writable(path: &Path, notifier: &dyn Notifier) -> Result<()> {
    if path.exists() {
        let readonly = fs::metadata(path)
            .map(|m| m.permissions().readonly())
            .unwrap_or(true);
        if readonly {
            return Err(notifier.stop(
                &format!("File {} is not writable!", path.display()),
                true,
            ));
        }
        return Ok(());
    }

    match fs::write(path, "") {
        Ok(()) => {
            fs::remove_file(path)?;
            Ok(())
        }
        Err(e) => Err(notifier.stop(
            &format!("Couldn't create file {}: {}", path.display(), e),
            true,
        )),
    }
}

/// Wraps a handler failure
pub(crate) fn handler_error(handler: &'static str, message: impl Into<String>) -> SpiderError {
    SpiderError::Handler {
        handler,
        message: message.into(),
    }
}
