//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `FrontierState`: pending, visited and external URLs of the current pass
//! - `RetryLedger`: URLs given a second chance during one invocation
//! - `Snapshot`: visited and external sets of the last completed pass

mod frontier;
mod snapshot;

// Re-export main types
pub use frontier::{FrontierState, RetryLedger, SEED_ORIGIN};
pub use snapshot::{merge_counts, RadarCounts, Snapshot};
