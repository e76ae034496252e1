use crate::state::FrontierState;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Link mention counts gathered from radar regions, in first-seen order
pub type RadarCounts = IndexMap<String, u64>;

/// Result of a completed pass, kept as the baseline for the next one
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub visited: IndexSet<String>,
    pub external: IndexMap<String, String>,
}

impl Snapshot {
    /// Captures the visited and external sets of a finished frontier
    pub fn from_frontier(frontier: &FrontierState) -> Self {
        Self {
            visited: frontier.visited.clone(),
            external: frontier.external.clone(),
        }
    }
}

/// Adds the counts of one page into the running totals
pub fn merge_counts(total: &mut RadarCounts, page: &RadarCounts) {
    for (link, count) in page {
        *total.entry(link.clone()).or_insert(0) += count;
    }
}
