//! Radar (internal link density) handler

use crate::handler::HandlerContext;
use crate::output::compare_radar;
use crate::state::{merge_counts, RadarCounts};
use crate::storage::{load_json, save_json, CheckpointStore, LINKING_KEY};
use crate::url::LinkClass;
use crate::Result;
use tracing::{debug, warn};

/// Counts how often each internal link is mentioned inside radar regions
#[derive(Debug, Default)]
pub struct LinkingHandler {
    counts: RadarCounts,
}

impl LinkingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> &RadarCounts {
        &self.counts
    }

    pub fn load(&mut self, store: &dyn CheckpointStore) -> Result<()> {
        if let Some(counts) = load_json::<RadarCounts>(store, LINKING_KEY)? {
            debug!("Restored radar counts of {} links", counts.len());
            self.counts = counts;
        }
        Ok(())
    }

    /// Adds the radar mentions of one page
    ///
    /// Mentions are keyed by the resolved internal URL; external and
    /// disallowed links are not counted.
    pub fn parse(&mut self, ctx: &HandlerContext<'_>, url: &str, content: &str) -> Result<()> {
        let mut page = RadarCounts::new();

        for (href, count) in ctx.extractor.extract_radar(content) {
            match ctx.policy.classify_link(&href, url, None) {
                Ok(LinkClass::Internal(link)) => {
                    *page.entry(link).or_insert(0) += count;
                }
                Ok(_) => {}
                Err(e) => warn!("Radar link skipped: {}", e),
            }
        }

        merge_counts(&mut self.counts, &page);
        Ok(())
    }

    pub fn save(&self, ctx: &HandlerContext<'_>, store: &mut dyn CheckpointStore) -> Result<()> {
        save_json(store, LINKING_KEY, &self.counts, ctx.config_hash)?;
        Ok(())
    }

    /// Reports the radar against the previous pass and drops the checkpoint
    pub fn finish(&mut self, ctx: &HandlerContext<'_>, store: &mut dyn CheckpointStore) -> Result<()> {
        compare_radar(
            store,
            &self.counts,
            &ctx.config.sitemap.priorities,
            ctx.config_hash,
            ctx.notifier,
            &ctx.config.host(),
        )?;
        store.delete_record(LINKING_KEY)?;
        Ok(())
    }
}
