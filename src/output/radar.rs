//! Radar (internal link density) report

use crate::notify::Notifier;
use crate::state::RadarCounts;
use crate::storage::{load_json, save_json, CheckpointStore, RADAR_SNAPSHOT_KEY};
use crate::Result;
use indexmap::IndexMap;
use tracing::{info, warn};

/// Count changes between two radar passes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RadarDiff {
    /// Links new to the radar, with their count
    pub added: Vec<(String, u64)>,
    /// Links no longer in the radar
    pub removed: Vec<String>,
    /// Links whose count changed: `(link, old, new)`
    pub changed: Vec<(String, u64, u64)>,
}

impl RadarDiff {
    /// Both maps are expected sorted by count, see [`sort_by_count`]
    pub fn between(previous: &RadarCounts, current: &RadarCounts) -> Self {
        let added = current
            .iter()
            .filter(|(link, _)| !previous.contains_key(*link))
            .map(|(link, count)| (link.clone(), *count))
            .collect();

        let removed = previous
            .keys()
            .filter(|link| !current.contains_key(*link))
            .cloned()
            .collect();

        let changed = current
            .iter()
            .filter_map(|(link, count)| {
                previous
                    .get(link)
                    .filter(|old| *old != count)
                    .map(|old| (link.clone(), *old, *count))
            })
            .collect();

        Self {
            added,
            removed,
            changed,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    pub fn report(&self) -> String {
        let mut sections = Vec::new();

        if !self.added.is_empty() {
            let mut text = String::from("New links in the radar area\n");
            for (link, count) in &self.added {
                text.push_str(&format!("{} - {}\n", link, count));
            }
            sections.push(text);
        }

        if !self.removed.is_empty() {
            let mut text = String::from("Links removed from the radar area\n");
            for link in &self.removed {
                text.push_str(&format!("{}\n", link));
            }
            sections.push(text);
        }

        if !self.changed.is_empty() {
            let mut text = String::from("Changed number of incoming links\n");
            for (link, old, new) in &self.changed {
                text.push_str(&format!("{} - was ({}) now ({})\n", link, old, new));
            }
            sections.push(text);
        }

        sections.join("\n")
    }
}

/// Orders links by count, highest first; ties keep first-seen order
pub fn sort_by_count(counts: &mut RadarCounts) {
    counts.sort_by(|_, a, _, b| b.cmp(a));
}

/// Full listing of radar counts
///
/// Links with a configured priority are listed again in a leading section.
pub fn format_radar_report(counts: &RadarCounts, priorities: &IndexMap<String, f64>) -> String {
    let mut all = String::new();
    let mut prioritized = String::new();

    for (link, count) in counts {
        if let Some(priority) = priorities.get(link) {
            prioritized.push_str(&format!("{} - {} (priority - {})\n", link, count, priority));
        }
        all.push_str(&format!("{} - {}\n", link, count));
    }

    if prioritized.is_empty() {
        all
    } else {
        format!(
            "Links with a configured priority:\n{}\nAll links:\n{}",
            prioritized, all
        )
    }
}

/// Compares the radar of a finished pass with the previous one
///
/// The new counts replace the stored ones before anything is reported. No
/// report is sent when nothing changed.
///
/// # Returns
///
/// The diff, or `None` for the first pass or a pass without radar markers
pub fn compare_radar(
    store: &mut dyn CheckpointStore,
    counts: &RadarCounts,
    priorities: &IndexMap<String, f64>,
    config_hash: &str,
    notifier: &dyn Notifier,
    host: &str,
) -> Result<Option<RadarDiff>> {
    let previous: Option<RadarCounts> = load_json(store, RADAR_SNAPSHOT_KEY)?;

    save_json(store, RADAR_SNAPSHOT_KEY, counts, config_hash)?;

    let subject = format!("{} - linking", host);

    if counts.is_empty() {
        warn!("No radar regions found on any page");
        notifier.notify(
            "The linking report cannot be built: radar markers are probably missing from the pages.",
            None,
            Some(&subject),
        );
        return Ok(None);
    }

    let mut current = counts.clone();
    sort_by_count(&mut current);

    let previous = previous.filter(|p| !p.is_empty()).map(|mut p| {
        sort_by_count(&mut p);
        p
    });

    let diff = previous.as_ref().map(|p| RadarDiff::between(p, &current));

    match &diff {
        Some(d) if d.is_empty() => {
            info!("Radar unchanged");
        }
        Some(d) => {
            let report = format!("{}\n{}", d.report(), format_radar_report(&current, priorities));
            notifier.notify(&report, None, Some(&subject));
        }
        None => {
            notifier.notify(&format_radar_report(&current, priorities), None, Some(&subject));
        }
    }

    Ok(diff)
}
