use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Origin recorded for the seed URL, which no page links to
pub const SEED_ORIGIN: &str = "";

/// The crawl frontier of one pass
///
/// Three URL collections persisted between invocations:
///
/// - `pending`: URLs known but not yet fetched, mapped to the page they were found on
/// - `visited`: URLs already fetched in this pass
/// - `external`: links leaving the site, mapped to the first page they were found on
///
/// `pending` and `visited` never share a URL. `pending` keeps insertion order,
/// so the next URL to fetch is always the oldest one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrontierState {
    pub pending: IndexMap<String, String>,
    pub visited: IndexSet<String>,
    pub external: IndexMap<String, String>,
}

impl FrontierState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the site root if nothing is known yet
    pub fn seed(&mut self, website: &str) {
        if self.is_empty() {
            self.pending
                .insert(website.to_string(), SEED_ORIGIN.to_string());
        }
    }

    /// Returns true if no URL has been queued or visited
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.visited.is_empty()
    }

    /// The oldest pending URL and its origin
    pub fn next_pending(&self) -> Option<(String, String)> {
        self.pending
            .first()
            .map(|(url, origin)| (url.clone(), origin.clone()))
    }

    /// Queues an internal URL unless it is already pending or visited
    ///
    /// # Returns
    ///
    /// `true` if the URL was newly queued
    pub fn discover(&mut self, url: &str, origin: &str) -> bool {
        if self.visited.contains(url) || self.pending.contains_key(url) {
            return false;
        }
        self.pending.insert(url.to_string(), origin.to_string());
        true
    }

    /// Moves a URL from `pending` to `visited`
    ///
    /// A URL that is not pending is left alone.
    ///
    /// # Returns
    ///
    /// `true` if the URL moved
    pub fn mark_visited(&mut self, url: &str) -> bool {
        if self.pending.shift_remove(url).is_none() {
            return false;
        }
        self.visited.insert(url.to_string())
    }

    /// Drops a URL from `pending` without visiting it
    pub fn drop_pending(&mut self, url: &str) -> Option<String> {
        self.pending.shift_remove(url)
    }

    /// Moves a pending URL to the back of the queue, keeping its origin
    pub fn requeue_back(&mut self, url: &str) {
        if let Some(origin) = self.pending.shift_remove(url) {
            self.pending.insert(url.to_string(), origin);
        }
    }

    /// Replaces a pending URL by its redirect destination
    ///
    /// The destination inherits the origin of the replaced URL. It is not
    /// queued when it was already visited or is already pending.
    ///
    /// # Returns
    ///
    /// `true` if the destination was newly queued
    pub fn redirect(&mut self, from: &str, to: &str) -> bool {
        let origin = self.pending.shift_remove(from).unwrap_or_default();
        self.discover(to, &origin)
    }

    /// Records an external link; the first origin seen is kept
    pub fn record_external(&mut self, url: &str, origin: &str) {
        self.external
            .entry(url.to_string())
            .or_insert_with(|| origin.to_string());
    }

    /// Number of URLs known to this pass
    pub fn known(&self) -> usize {
        self.pending.len() + self.visited.len()
    }

    /// Returns true if no URL is both pending and visited
    pub fn is_consistent(&self) -> bool {
        self.pending.keys().all(|url| !self.visited.contains(url))
    }
}

/// URLs given one extra chance during the current invocation
///
/// Not persisted: a resumed invocation starts with an empty ledger.
#[derive(Debug, Clone, Default)]
pub struct RetryLedger {
    urls: HashSet<String>,
}

impl RetryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a URL and returns `true` if it was not recorded before
    pub fn first_strike(&mut self, url: &str) -> bool {
        self.urls.insert(url.to_string())
    }

}
