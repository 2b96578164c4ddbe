//! Version aggregation: raw assets → groups of versioned assets.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, instrument};

use assetforge_shared::{RawAsset, Task};

use crate::classifier;
use crate::versioning::VersionMemo;

/// A raw asset annotated with its version and group.
#[derive(Debug, Clone)]
pub struct VersionedAsset<'a> {
    /// Extractor id of the raw asset.
    pub raw_id: &'a str,
    pub asset: &'a RawAsset,
    pub version: u8,
    pub group_key: String,
    /// The completed task that produced the asset, when resolvable.
    pub source_task: Option<&'a Task>,
}

impl VersionedAsset<'_> {
    /// Task name when the task resolves, otherwise the asset's own name.
    pub fn display_task_name(&self) -> &str {
        match self.source_task {
            Some(task) => &task.name,
            None => self.asset.metadata.asset_name.as_deref().unwrap_or(""),
        }
    }
}

/// All versions of one logical asset.
#[derive(Debug, Clone)]
pub struct AssetGroup<'a> {
    pub group_key: String,
    /// Raw type of the first asset classified into the group.
    pub asset_type: String,
    pub group_name: String,
    /// Members in raw-asset iteration order.
    pub versions: Vec<VersionedAsset<'a>>,
    pub latest_version: u8,
}

impl<'a> AssetGroup<'a> {
    /// The member with the highest version; the first one encountered wins ties.
    pub fn latest(&self) -> Option<&VersionedAsset<'a>> {
        self.versions.iter().fold(None, |best, candidate| match best {
            Some(b) if b.version >= candidate.version => Some(b),
            _ => Some(candidate),
        })
    }

    /// Distinct source tasks, in member order.
    pub fn source_tasks(&self) -> Vec<&'a Task> {
        let mut seen: Vec<&'a Task> = Vec::new();
        for task in self.versions.iter().filter_map(|v| v.source_task) {
            if !seen.iter().any(|t| t.id == task.id) {
                seen.push(task);
            }
        }
        seen
    }
}

/// Group raw assets by classification and annotate each with its version.
///
/// Assets whose id starts with `marker_prefix` are extractor metadata and
/// are skipped. A source task resolves only if it appears in `tasks`.
#[instrument(skip_all, fields(raw_assets = raw_assets.len(), tasks = tasks.len()))]
pub fn aggregate<'a>(
    raw_assets: &'a BTreeMap<String, RawAsset>,
    tasks: &'a [Task],
    marker_prefix: &str,
    memo: &mut VersionMemo,
) -> BTreeMap<String, AssetGroup<'a>> {
    let task_index: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();
    let mut groups: BTreeMap<String, AssetGroup<'a>> = BTreeMap::new();

    for (raw_id, asset) in raw_assets {
        if !marker_prefix.is_empty() && raw_id.starts_with(marker_prefix) {
            debug!(raw_id = %raw_id, "skipping internal marker");
            continue;
        }

        let source_task = asset
            .metadata
            .source_task_id
            .as_deref()
            .and_then(|id| task_index.get(id).copied());

        let task_name = match source_task {
            Some(task) => task.name.as_str(),
            None => asset.metadata.asset_name.as_deref().unwrap_or(""),
        };

        let group_key = classifier::classify(&asset.asset_type, task_name);
        let version = memo.version_for(source_task, task_name);

        debug!(raw_id = %raw_id, group = %group_key, version, "classified asset");

        let group = groups
            .entry(group_key.clone())
            .or_insert_with(|| AssetGroup {
                group_name: classifier::group_name(&group_key, &asset.asset_type, task_name),
                group_key: group_key.clone(),
                asset_type: asset.asset_type.clone(),
                versions: Vec::new(),
                latest_version: 0,
            });

        group.latest_version = group.latest_version.max(version);
        group.versions.push(VersionedAsset {
            raw_id,
            asset,
            version,
            group_key,
            source_task,
        });
    }

    debug!(groups = groups.len(), "aggregation complete");
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use assetforge_shared::AssetMetadata;
    use serde_json::json;

    fn asset(asset_type: &str, task_id: Option<&str>) -> RawAsset {
        RawAsset {
            metadata: AssetMetadata {
                source_task_id: task_id.map(str::to_string),
                ..AssetMetadata::default()
            },
            ..RawAsset::new(asset_type, json!({"k": "v"}))
        }
    }

    fn email_fixture() -> (BTreeMap<String, RawAsset>, Vec<Task>) {
        let tasks = vec![
            Task::new("t1", "Initial Email Sequences"),
            Task {
                iteration_count: 2,
                ..Task::new("t2", "Enhanced Email Sequences")
            },
        ];
        let mut raw = BTreeMap::new();
        raw.insert("a1".into(), asset("email_templates", Some("t1")));
        raw.insert("a2".into(), asset("email_templates", Some("t2")));
        (raw, tasks)
    }

    #[test]
    fn versions_of_one_asset_share_a_group() {
        let (raw, tasks) = email_fixture();
        let mut memo = VersionMemo::new();
        let groups = aggregate(&raw, &tasks, "_", &mut memo);

        assert_eq!(groups.len(), 1);
        let group = &groups["email_sequences"];
        assert_eq!(group.group_name, "Email Sequences");
        assert_eq!(group.versions.len(), 2);
        assert_eq!(group.latest_version, 2);
        assert_eq!(group.latest().map(|v| v.raw_id), Some("a2"));
        assert_eq!(memo.get("t2"), Some(2));
    }

    #[test]
    fn marker_entries_are_skipped() {
        let (mut raw, tasks) = email_fixture();
        raw.insert("_extraction_meta".into(), asset("extraction_summary", None));
        let groups = aggregate(&raw, &tasks, "_", &mut VersionMemo::new());
        let total: usize = groups.values().map(|g| g.versions.len()).sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn unresolved_task_is_version_one_and_uses_asset_name() {
        let mut raw = BTreeMap::new();
        let mut orphan = asset("business_asset", Some("missing"));
        orphan.metadata.asset_name = Some("Competitor research".into());
        raw.insert("x".into(), orphan);

        let groups = aggregate(&raw, &[], "_", &mut VersionMemo::new());
        let group = &groups["analysis_report"];
        assert_eq!(group.latest_version, 1);
        assert!(group.versions[0].source_task.is_none());
        assert_eq!(group.versions[0].display_task_name(), "Competitor research");
    }

    #[test]
    fn ties_keep_first_encountered() {
        let tasks = vec![Task::new("t1", "Lead list"), Task::new("t2", "Lead list refresh")];
        let mut raw = BTreeMap::new();
        raw.insert("a".into(), asset("contact_database", Some("t1")));
        raw.insert("b".into(), asset("contact_database", Some("t2")));

        let groups = aggregate(&raw, &tasks, "_", &mut VersionMemo::new());
        let group = &groups["contact_database"];
        assert_eq!(group.latest().map(|v| v.raw_id), Some("a"));
    }

    #[test]
    fn source_tasks_are_deduplicated() {
        let tasks = vec![Task::new("t1", "Lead list")];
        let mut raw = BTreeMap::new();
        raw.insert("a".into(), asset("contact_database", Some("t1")));
        raw.insert("b".into(), asset("contact_database", Some("t1")));
        raw.insert("c".into(), asset("contact_database", None));

        let groups = aggregate(&raw, &tasks, "_", &mut VersionMemo::new());
        let related = groups["contact_database"].source_tasks();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].id, "t1");
    }

    #[test]
    fn empty_marker_prefix_skips_nothing() {
        let mut raw = BTreeMap::new();
        raw.insert("_x".into(), asset("contact_database", None));
        let groups = aggregate(&raw, &[], "", &mut VersionMemo::new());
        assert_eq!(groups.len(), 1);
    }
}
