//! Unified asset assembler.
//!
//! Turns one [`AssetGroup`] plus the enhanced payload of its latest version
//! into the externally visible [`UnifiedAsset`] record.

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use assetforge_shared::{
    AssetForgeError, ContentPayload, RelatedTask, Result, UnifiedAsset, VersionHistoryEntry,
};

use crate::aggregator::AssetGroup;
use crate::versioning::{self, VersionMemo};

const DEFAULT_CREATED_BY: &str = "AI Agent";
const DEFAULT_EXTRACTION_METHOD: &str = "unified_extraction";
const DEFAULT_BUSINESS_ACTIONABILITY: f64 = 0.8;

/// Assemble a group into a unified asset.
#[instrument(skip_all, fields(group = %group.group_key, versions = group.versions.len()))]
pub fn assemble(
    group: &AssetGroup<'_>,
    content: ContentPayload,
    memo: &VersionMemo,
) -> Result<UnifiedAsset> {
    let latest = group.latest().ok_or_else(|| {
        AssetForgeError::Assembly(format!("group {} has no versions", group.group_key))
    })?;
    let metadata = &latest.asset.metadata;

    let mut ordered: Vec<_> = group.versions.iter().collect();
    // Stable sort: equal versions keep encounter order.
    ordered.sort_by(|a, b| b.version.cmp(&a.version));

    let version_history: Vec<VersionHistoryEntry> = ordered
        .into_iter()
        .filter_map(|member| {
            let task = member.source_task?;
            Some(VersionHistoryEntry {
                version: member.version,
                created_at: task.created_at,
                created_by: task
                    .assigned_to_role
                    .clone()
                    .unwrap_or_else(|| DEFAULT_CREATED_BY.to_string()),
                task_name: task.name.clone(),
                task_id: task.id.clone(),
                quality_scores: member.asset.metadata.quality_scores.clone(),
                changes_summary: versioning::changes_summary(member.version, &task.name),
            })
        })
        .collect();

    let related_tasks: Vec<RelatedTask> = group
        .source_tasks()
        .into_iter()
        .map(|task| RelatedTask {
            id: task.id.clone(),
            name: task.name.clone(),
            version: memo.resolve(task),
            updated_at: task.updated_at,
            status: task.status.clone(),
        })
        .collect();

    let last_modified = latest
        .source_task
        .and_then(|task| task.updated_at)
        .or_else(|| parse_timestamp(metadata.extraction_timestamp.as_deref()))
        .or_else(|| latest.source_task.and_then(|task| task.created_at))
        .or_else(|| newest_timestamp(group));

    debug!(
        latest = %latest.raw_id,
        history = version_history.len(),
        related = related_tasks.len(),
        source = %content.enhancement_source,
        "group assembled"
    );

    Ok(UnifiedAsset {
        id: group.group_key.clone(),
        name: group.group_name.clone(),
        asset_type: group.asset_type.clone(),
        versions: group.versions.len(),
        last_modified,
        source_task_id: metadata.source_task_id.clone(),
        ready_to_use: metadata.ready_to_use.unwrap_or(true),
        quality_scores: metadata.quality_scores.clone(),
        extraction_method: metadata
            .extraction_method
            .clone()
            .unwrap_or_else(|| DEFAULT_EXTRACTION_METHOD.to_string()),
        business_actionability: metadata
            .business_actionability
            .unwrap_or(DEFAULT_BUSINESS_ACTIONABILITY),
        content,
        version_history,
        related_tasks,
    })
}

fn parse_timestamp(ts: Option<&str>) -> Option<DateTime<Utc>> {
    ts.and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.with_timezone(&Utc))
}

/// Newest timestamp carried by any member of the group.
fn newest_timestamp(group: &AssetGroup<'_>) -> Option<DateTime<Utc>> {
    group
        .versions
        .iter()
        .flat_map(|member| {
            let task = member.source_task;
            [
                task.and_then(|t| t.updated_at),
                task.and_then(|t| t.created_at),
                parse_timestamp(member.asset.metadata.extraction_timestamp.as_deref()),
            ]
        })
        .flatten()
        .max()
}
