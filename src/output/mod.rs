//! Output module for reporting pass results
//!
//! This module handles:
//! - Diffing the visited and external sets against the previous pass
//! - The structured change record
//! - The radar link-density report and its diff

mod diff;
mod radar;

pub use diff::{compare_sitemap, ChangeRecord, DiffSet, SetDiff, SitemapDiff};
pub use radar::{compare_radar, format_radar_report, sort_by_count, RadarDiff};
