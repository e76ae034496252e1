//! Sitemap diff against the previous completed pass

use crate::notify::Notifier;
use crate::state::Snapshot;
use crate::storage::{load_json, save_json, CheckpointStore, SITEMAP_SNAPSHOT_KEY};
use crate::Result;
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use tracing::info;

/// Added and removed members of a set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetDiff<T> {
    pub added: T,
    pub removed: T,
}

impl<T: DiffSet> SetDiff<T> {
    /// Computes `current − previous` and `previous − current`
    pub fn between(previous: &T, current: &T) -> Self {
        Self {
            added: current.minus(previous),
            removed: previous.minus(current),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty_set() && self.removed.is_empty_set()
    }
}

/// Collections usable with [`SetDiff`], compared by key
pub trait DiffSet: Sized {
    fn minus(&self, other: &Self) -> Self;
    fn is_empty_set(&self) -> bool;
}

impl DiffSet for IndexSet<String> {
    fn minus(&self, other: &Self) -> Self {
        self.difference(other).cloned().collect()
    }

    fn is_empty_set(&self) -> bool {
        self.is_empty()
    }
}

impl<V: Clone> DiffSet for IndexMap<String, V> {
    fn minus(&self, other: &Self) -> Self {
        self.iter()
            .filter(|(k, _)| !other.contains_key(*k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn is_empty_set(&self) -> bool {
        self.is_empty()
    }
}

/// Differences between two passes
///
/// When there was no previous pass (or it recorded nothing), every current
/// entry counts as added and the `initial_*` flag is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SitemapDiff {
    pub initial_pages: bool,
    pub pages: SetDiff<IndexSet<String>>,
    pub initial_external: bool,
    pub external: SetDiff<IndexMap<String, String>>,
}

impl SitemapDiff {
    pub fn between(previous: &Snapshot, current: &Snapshot) -> Self {
        Self {
            initial_pages: previous.visited.is_empty(),
            pages: SetDiff::between(&previous.visited, &current.visited),
            initial_external: previous.external.is_empty(),
            external: SetDiff::between(&previous.external, &current.external),
        }
    }

    /// Returns true if anything changed, or this is the first pass
    pub fn has_modifications(&self) -> bool {
        self.initial_pages || self.initial_external || !self.pages.is_empty() || !self.external.is_empty()
    }

    /// Human-readable report
    pub fn report(&self) -> String {
        let mut text = String::new();

        if self.initial_pages {
            text.push_str("Pages added (initial sitemap generation)\n");
            push_lines(&mut text, &self.pages.added);
        } else {
            if self.pages.added.is_empty() {
                text.push_str("Nothing added\n");
            } else {
                text.push_str("Pages added\n");
                push_lines(&mut text, &self.pages.added);
            }

            if self.pages.removed.is_empty() {
                text.push_str("Nothing removed\n");
            } else {
                text.push_str("Pages removed\n");
                push_lines(&mut text, &self.pages.removed);
            }
        }

        if self.initial_external {
            text.push_str("\nExternal links added (initial sitemap generation):\n");
            push_external(&mut text, &self.external.added);
        } else {
            if self.external.added.is_empty() {
                text.push_str("\nNo new external links\n");
            } else {
                text.push_str("\nExternal links added:\n");
                push_external(&mut text, &self.external.added);
            }

            if self.external.removed.is_empty() {
                text.push_str("\nNo external links removed\n");
            } else {
                text.push_str("\nExternal links removed:\n");
                push_external(&mut text, &self.external.removed);
            }
        }

        text
    }
}

fn push_lines<'a>(text: &mut String, urls: impl IntoIterator<Item = &'a String>) {
    for url in urls {
        text.push_str(url);
        text.push('\n');
    }
}

fn push_external(text: &mut String, links: &IndexMap<String, String>) {
    for (link, page) in links {
        text.push_str(&format!("{} on page {}\n", link, page));
    }
}

/// Machine-readable summary of a changed sitemap
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeRecord {
    pub add: Vec<String>,
    pub del: Vec<String>,
    pub add_external: IndexMap<String, String>,
    pub del_external: IndexMap<String, String>,
}

impl ChangeRecord {
    /// Lists only real differences; a first pass yields empty lists
    pub fn from_diff(diff: &SitemapDiff) -> Self {
        let pages = |set: &IndexSet<String>, initial: bool| {
            if initial {
                Vec::new()
            } else {
                set.iter().cloned().collect()
            }
        };
        let external = |map: &IndexMap<String, String>, initial: bool| {
            if initial {
                IndexMap::new()
            } else {
                map.clone()
            }
        };

        Self {
            add: pages(&diff.pages.added, diff.initial_pages),
            del: pages(&diff.pages.removed, diff.initial_pages),
            add_external: external(&diff.external.added, diff.initial_external),
            del_external: external(&diff.external.removed, diff.initial_external),
        }
    }
}

/// Compares a finished pass with the previous one and reports the result
///
/// The new snapshot replaces the stored one before anything is reported.
///
/// # Arguments
///
/// * `store` - Checkpoint store holding the previous snapshot
/// * `current` - Snapshot of the pass that just completed
/// * `config_hash` - Stored with the new snapshot
/// * `notifier` - Receives the report
/// * `email_json` - Recipient of the [`ChangeRecord`]; empty disables it
/// * `host` - Host of the crawled site, used in subjects
pub fn compare_sitemap(
    store: &mut dyn CheckpointStore,
    current: &Snapshot,
    config_hash: &str,
    notifier: &dyn Notifier,
    email_json: &str,
    host: &str,
) -> Result<SitemapDiff> {
    let previous: Snapshot = load_json(store, SITEMAP_SNAPSHOT_KEY)?.unwrap_or_default();

    save_json(store, SITEMAP_SNAPSHOT_KEY, current, config_hash)?;

    let diff = SitemapDiff::between(&previous, current);
    info!(
        "Sitemap diff: {} added, {} removed, {} external added, {} external removed",
        diff.pages.added.len(),
        diff.pages.removed.len(),
        diff.external.added.len(),
        diff.external.removed.len()
    );

    notifier.notify(&diff.report(), None, None);

    if diff.has_modifications() && !email_json.is_empty() {
        let record = serde_json::to_string(&ChangeRecord::from_diff(&diff))?;
        let subject = format!("{} sitemap result", host);
        notifier.notify(&record, Some(email_json), Some(&subject));
    }

    Ok(diff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MemoryNotifier;
    use crate::storage::SqliteStore;

    fn snapshot(visited: &[&str], external: &[(&str, &str)]) -> Snapshot {
        Snapshot {
            visited: visited.iter().map(|s| s.to_string()).collect(),
            external: external
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_added_and_removed_pages() {
        let previous = snapshot(&["A", "B"], &[("X", "A")]);
        let current = snapshot(&["B", "C"], &[("X", "A")]);

        let diff = SitemapDiff::between(&previous, &current);

        assert_eq!(diff.pages.added.iter().collect::<Vec<_>>(), vec!["C"]);
        assert_eq!(diff.pages.removed.iter().collect::<Vec<_>>(), vec!["A"]);
        assert!(diff.external.is_empty());
        assert!(diff.has_modifications());
    }

    #[test]
    fn test_identical_passes() {
        let pass = snapshot(&["A", "B"], &[("X", "A")]);
        let diff = SitemapDiff::between(&pass, &pass);

        assert!(!diff.has_modifications());
        let report = diff.report();
        assert!(report.contains("Nothing added"));
        assert!(report.contains("Nothing removed"));
        assert!(report.contains("No new external links"));
    }

    #[test]
    fn test_initial_pass_report() {
        let diff = SitemapDiff::between(&Snapshot::default(), &snapshot(&["A"], &[("X", "A")]));

        assert!(diff.initial_pages);
        let report = diff.report();
        assert!(report.starts_with("Pages added (initial sitemap generation)\nA\n"));
        assert!(report.contains("X on page A"));
    }

    #[test]
    fn test_change_record_json() {
        let previous = snapshot(&["A", "B"], &[("X", "A")]);
        let current = snapshot(&["B", "C"], &[("Y", "B")]);
        let record = ChangeRecord::from_diff(&SitemapDiff::between(&previous, &current));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["add"], serde_json::json!(["C"]));
        assert_eq!(json["del"], serde_json::json!(["A"]));
        assert_eq!(json["add_external"], serde_json::json!({"Y": "B"}));
        assert_eq!(json["del_external"], serde_json::json!({"X": "A"}));
    }

    #[test]
    fn test_compare_sitemap_persists_and_reports() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        let notifier = MemoryNotifier::new();

        compare_sitemap(
            &mut store,
            &snapshot(&["A", "B"], &[]),
            "h",
            &notifier,
            "log@ex.com",
            "ex.com",
        )
        .unwrap();

        let diff = compare_sitemap(
            &mut store,
            &snapshot(&["B", "C"], &[]),
            "h",
            &notifier,
            "log@ex.com",
            "ex.com",
        )
        .unwrap();
        assert_eq!(diff.pages.added.len(), 1);

        let stored: Snapshot = load_json(&store, SITEMAP_SNAPSHOT_KEY).unwrap().unwrap();
        assert!(stored.visited.contains("C"));

        let records = notifier.with_subject("sitemap result");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].recipient.as_deref(), Some("log@ex.com"));
        assert!(records[1].text.contains("\"add\":[\"C\"]"));
    }

    #[test]
    fn test_unchanged_pass_sends_no_record() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        let notifier = MemoryNotifier::new();
        let pass = snapshot(&["A", "B"], &[("X", "A")]);

        compare_sitemap(&mut store, &pass, "h", &notifier, "log@ex.com", "ex.com").unwrap();
        compare_sitemap(&mut store, &pass, "h", &notifier, "log@ex.com", "ex.com").unwrap();

        assert_eq!(notifier.with_subject("sitemap result").len(), 1);
        assert_eq!(notifier.sent().len(), 3);
    }
}
