//! Version inference for task-produced assets.
//!
//! Versions are small integers in `1..=MAX_VERSION`. A version is computed
//! once per task per request through [`VersionMemo`] so history entries and
//! related-task listings always agree.

use std::collections::HashMap;

use assetforge_shared::Task;

pub const MAX_VERSION: u8 = 3;

pub(crate) const ENHANCEMENT_KEYWORDS: &[&str] =
    &["enhanced", "improved", "updated", "revised", "advanced"];

const VERSION_TWO_MARKERS: &[&str] = &["version 2", "v2", "asset 2"];
const VERSION_THREE_MARKERS: &[&str] = &["version 3", "v3", "asset 3"];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Infer the version of an asset produced by `task`.
///
/// Rules apply in order, first match wins:
/// 1. no task → 1
/// 2. iteration count above 1 → the count, capped at [`MAX_VERSION`]
/// 3. enhancement keywords → 2
/// 4. "final" → 2, or 3 when the name also says "enhanced"
/// 5. explicit "version N" / "vN" / "asset N" markers
/// 6. otherwise 1
///
/// Rule 3 already claims every name containing "enhanced", so the 3 branch of
/// rule 4 never fires. A later iteration can therefore score lower than an
/// earlier one that carried an explicit "version 3" marker.
pub fn version(task: Option<&Task>, task_name: &str) -> u8 {
    let Some(task) = task else {
        return 1;
    };

    if task.iteration_count > 1 {
        return task.iteration_count.min(u32::from(MAX_VERSION)) as u8;
    }

    let name = task_name.to_lowercase();
    if contains_any(&name, ENHANCEMENT_KEYWORDS) {
        return 2;
    }
    if name.contains("final") {
        return if name.contains("enhanced") { 3 } else { 2 };
    }
    if contains_any(&name, VERSION_TWO_MARKERS) {
        return 2;
    }
    if contains_any(&name, VERSION_THREE_MARKERS) {
        return 3;
    }
    1
}

/// Human-readable summary of what a history entry changed.
pub fn changes_summary(version: u8, task_name: &str) -> String {
    if version == 1 {
        return "Initial version with core content structure".to_string();
    }
    let name = task_name.to_lowercase();
    if contains_any(&name, ENHANCEMENT_KEYWORDS) {
        "Enhanced version with improved content quality".to_string()
    } else if name.contains("final") {
        "Final version ready for business use".to_string()
    } else {
        format!("Version {version} with updated content and refinements")
    }
}

/// Per-request cache of task versions, keyed by task id.
#[derive(Debug, Default, Clone)]
pub struct VersionMemo {
    by_task: HashMap<String, u8>,
}

impl VersionMemo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Version for `task`, computed on first sight and reused afterwards.
    pub fn version_for(&mut self, task: Option<&Task>, task_name: &str) -> u8 {
        let Some(t) = task else {
            return version(None, task_name);
        };
        *self
            .by_task
            .entry(t.id.clone())
            .or_insert_with(|| version(Some(t), task_name))
    }

    /// Previously computed version of a task.
    pub fn get(&self, task_id: &str) -> Option<u8> {
        self.by_task.get(task_id).copied()
    }

    /// Cached version, or a fresh computation from the task's own name.
    pub fn resolve(&self, task: &Task) -> u8 {
        self.get(&task.id)
            .unwrap_or_else(|| version(Some(task), &task.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(name: &str, iterations: u32) -> Task {
        Task {
            iteration_count: iterations,
            ..Task::new("t", name)
        }
    }

    fn v(name: &str, iterations: u32) -> u8 {
        version(Some(&task(name, iterations)), name)
    }

    #[test]
    fn no_task_is_version_one() {
        assert_eq!(version(None, "Final enhanced version 3"), 1);
    }

    #[test]
    fn iteration_count_wins_and_is_capped() {
        assert_eq!(v("Plain", 5), 3);
        assert_eq!(v("Plain", 2), 2);
        assert_eq!(v("Outreach version 3", 2), 2);
        assert_eq!(v("Plain", 0), 1);
    }

    #[test]
    fn enhancement_keywords() {
        assert_eq!(v("Revised outreach", 1), 2);
        assert_eq!(v("Enhanced Email Sequences", 1), 2);
    }

    #[test]
    fn final_keyword() {
        assert_eq!(v("Final landing page", 1), 2);
        // "enhanced" is caught by the keyword rule first.
        assert_eq!(v("Final enhanced plan", 1), 2);
    }

    #[test]
    fn explicit_markers_are_checked_last() {
        assert_eq!(v("Copy v2", 1), 2);
        assert_eq!(v("Copy Version 3", 1), 3);
        assert_eq!(v("Pricing asset 3", 1), 3);
        assert_eq!(v("Updated copy v3", 1), 2);
    }

    #[test]
    fn default_is_one() {
        assert_eq!(v("Initial Email Sequences", 1), 1);
    }

    #[test]
    fn markers_can_outrank_later_iterations() {
        assert_eq!(v("Outreach version 3", 1), 3);
        assert_eq!(v("Outreach version 3", 2), 2);
    }

    #[test]
    fn memo_reuses_first_computation() {
        let mut memo = VersionMemo::new();
        let t = task("Plain", 2);
        assert_eq!(memo.version_for(Some(&t), "Plain"), 2);
        let renamed = task("Final enhanced", 1);
        // Same task id: the cached value is returned.
        assert_eq!(memo.version_for(Some(&renamed), &renamed.name), 2);
        assert_eq!(memo.get("t"), Some(2));
        assert_eq!(memo.resolve(&renamed), 2);
        assert_eq!(memo.version_for(None, "Final"), 1);
    }

    #[test]
    fn summaries() {
        assert_eq!(
            changes_summary(1, "Enhanced draft"),
            "Initial version with core content structure"
        );
        assert!(changes_summary(2, "Improved draft").starts_with("Enhanced version"));
        assert!(changes_summary(2, "Final draft").starts_with("Final version"));
        assert_eq!(
            changes_summary(3, "Draft"),
            "Version 3 with updated content and refinements"
        );
    }
}
