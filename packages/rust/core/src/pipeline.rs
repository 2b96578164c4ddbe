//! End-to-end consolidation: workspace → aggregate → enhance → assemble → catalog.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, instrument, warn};

use assetforge_markup::MarkupRenderer;
use assetforge_shared::{
    AssetForgeError, AssetsResponse, ContentPayload, EngineConfig, RawAsset, Result, Task,
    UnifiedAsset,
};

use crate::aggregator::{self, AssetGroup};
use crate::assembler;
use crate::enhancer;
use crate::fallback;
use crate::source::WorkspaceStore;
use crate::versioning::VersionMemo;

/// Inputs of one consolidation, as supplied by the orchestration layer.
#[derive(Debug, Clone, Copy)]
pub struct EngineInput<'a> {
    pub workspace_id: &'a str,
    pub workspace_goal: &'a str,
    /// Passed through for the caller's bookkeeping; not interpreted.
    pub deliverable_type: &'a str,
    pub completed_tasks: &'a [Task],
    pub raw_assets: &'a BTreeMap<String, RawAsset>,
}

/// Pipeline stage at which a group failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Enhancement,
    Assembly,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Enhancement => "enhancement",
            Self::Assembly => "assembly",
        })
    }
}

/// A group that did not come through cleanly.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupFailure {
    pub group_key: String,
    pub stage: FailureStage,
    pub message: String,
}

/// A catalog plus the per-group failures behind any missing or degraded entry.
#[derive(Debug, Clone)]
pub struct Consolidation {
    pub response: AssetsResponse,
    /// Enhancement failures keep their group (with an `error_fallback`
    /// payload); assembly failures drop it.
    pub failures: Vec<GroupFailure>,
}

impl Consolidation {
    pub fn empty(workspace_id: &str) -> Self {
        Self {
            response: AssetsResponse::empty(workspace_id),
            failures: Vec::new(),
        }
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a group's enhancement finishes, in completion order.
    fn group_enhanced(&self, group_key: &str, current: usize, total: usize);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn group_enhanced(&self, _group_key: &str, _current: usize, _total: usize) {}
}

/// Run the engine over already-loaded inputs.
///
/// 1. Aggregate raw assets into versioned groups
/// 2. Enhance each group's latest version, concurrently, under one deadline
/// 3. Assemble each group into a unified asset
#[instrument(skip_all, fields(workspace_id = %input.workspace_id, raw_assets = input.raw_assets.len()))]
pub async fn consolidate(
    input: &EngineInput<'_>,
    renderer: &dyn MarkupRenderer,
    config: &EngineConfig,
    progress: &dyn ProgressReporter,
) -> Consolidation {
    let start = Instant::now();
    let processed_at = Utc::now();

    debug!(deliverable_type = %input.deliverable_type, "consolidating");

    // --- Phase 1: Aggregate ---
    progress.phase("Grouping assets");
    let mut memo = VersionMemo::new();
    let groups = aggregator::aggregate(
        input.raw_assets,
        input.completed_tasks,
        &config.internal_marker_prefix,
        &mut memo,
    );

    // --- Phase 2: Enhance ---
    progress.phase("Enhancing content");
    let (mut payloads, mut failures) =
        enhance_groups(&groups, input.workspace_goal, renderer, config, progress).await;

    // --- Phase 3: Assemble ---
    progress.phase("Assembling assets");
    let mut assets: BTreeMap<String, UnifiedAsset> = BTreeMap::new();
    for (key, group) in &groups {
        let Some(payload) = payloads.remove(key) else {
            continue;
        };
        match assembler::assemble(group, payload, &memo) {
            Ok(asset) => {
                assets.insert(key.clone(), asset);
            }
            Err(e) => {
                error!(group = %key, error = %e, "assembly failed, dropping group");
                failures.push(GroupFailure {
                    group_key: key.clone(),
                    stage: FailureStage::Assembly,
                    message: e.to_string(),
                });
            }
        }
    }

    let mut response = AssetsResponse::from_assets(input.workspace_id, input.workspace_goal, assets);
    response.processing_timestamp = processed_at;

    info!(
        groups = groups.len(),
        assets = response.asset_count,
        total_versions = response.total_versions,
        failures = failures.len(),
        elapsed_ms = start.elapsed().as_millis(),
        "consolidation complete"
    );

    Consolidation { response, failures }
}

/// Enhance every group's latest version with bounded concurrency.
async fn enhance_groups(
    groups: &BTreeMap<String, AssetGroup<'_>>,
    workspace_goal: &str,
    renderer: &dyn MarkupRenderer,
    config: &EngineConfig,
    progress: &dyn ProgressReporter,
) -> (HashMap<String, ContentPayload>, Vec<GroupFailure>) {
    let deadline = tokio::time::Instant::now() + config.enhancement_budget;
    let total = groups.len();

    let results: Vec<(String, ContentPayload, Option<GroupFailure>)> =
        stream::iter(groups.iter())
            .filter_map(|(key, group)| async move { group.latest().map(|latest| (key, latest)) })
            .map(move |(key, latest)| async move {
                let asset = latest.asset;
                let outcome = tokio::time::timeout_at(
                    deadline,
                    enhancer::try_enhance(asset, workspace_goal, renderer),
                )
                .await
                .unwrap_or_else(|_| {
                    Err(AssetForgeError::Enhancement(
                        "enhancement budget exceeded".to_string(),
                    ))
                });
                match outcome {
                    Ok(payload) => (key.clone(), payload, None),
                    Err(e) => {
                        warn!(group = %key, error = %e, "enhancement failed, keeping raw data");
                        let failure = GroupFailure {
                            group_key: key.clone(),
                            stage: FailureStage::Enhancement,
                            message: e.to_string(),
                        };
                        (key.clone(), enhancer::error_fallback(asset, &e), Some(failure))
                    }
                }
            })
            .buffer_unordered(config.enhancement_concurrency.max(1))
            .enumerate()
            .map(|(i, result)| {
                progress.group_enhanced(&result.0, i + 1, total);
                result
            })
            .collect()
            .await;

    let mut payloads = HashMap::with_capacity(results.len());
    let mut failures = Vec::new();
    for (key, payload, failure) in results {
        debug!(group = %key, source = %payload.enhancement_source, "group enhanced");
        payloads.insert(key, payload);
        failures.extend(failure);
    }
    // Completion order is nondeterministic; report failures by group key.
    failures.sort_by(|a, b| a.group_key.cmp(&b.group_key));
    (payloads, failures)
}

/// Build the asset catalog for a workspace.
///
/// Missing workspaces, workspaces without completed tasks, and workspaces
/// whose extraction (including the deliverable fallback) yields nothing all
/// produce the empty catalog. Store failures propagate.
#[instrument(skip_all, fields(workspace_id = %workspace_id))]
pub async fn get_assets(
    store: &dyn WorkspaceStore,
    renderer: &dyn MarkupRenderer,
    config: &EngineConfig,
    workspace_id: &str,
    progress: &dyn ProgressReporter,
) -> Result<Consolidation> {
    progress.phase("Loading workspace");
    let Some(workspace) = store.get_workspace(workspace_id).await? else {
        info!("workspace not found, returning empty catalog");
        return Ok(Consolidation::empty(workspace_id));
    };

    let tasks = store.list_completed_tasks(workspace_id).await?;
    if tasks.is_empty() {
        info!("no completed tasks, returning empty catalog");
        return Ok(Consolidation::empty(workspace_id));
    }

    progress.phase("Loading extracted assets");
    let mut raw_assets = store.list_extracted_assets(workspace_id).await?;
    if !has_content(&raw_assets, &config.internal_marker_prefix) {
        progress.phase("Scanning deliverables");
        let deliverables = store.list_deliverables(workspace_id).await?;
        raw_assets = fallback::extract_from_deliverables(&deliverables);
        info!(
            deliverables = deliverables.len(),
            raw_assets = raw_assets.len(),
            "extractor output empty, used deliverable fallback"
        );
    }

    if !has_content(&raw_assets, &config.internal_marker_prefix) {
        info!("extraction yielded nothing, returning empty catalog");
        return Ok(Consolidation::empty(workspace_id));
    }

    let input = EngineInput {
        workspace_id,
        workspace_goal: &workspace.goal,
        deliverable_type: &config.deliverable_type,
        completed_tasks: &tasks,
        raw_assets: &raw_assets,
    };
    Ok(consolidate(&input, renderer, config, progress).await)
}

/// Recompute the asset catalog. The engine keeps no state, so this is the
/// same computation as [`get_assets`].
pub async fn refresh_assets(
    store: &dyn WorkspaceStore,
    renderer: &dyn MarkupRenderer,
    config: &EngineConfig,
    workspace_id: &str,
    progress: &dyn ProgressReporter,
) -> Result<Consolidation> {
    info!(workspace_id = %workspace_id, "refreshing assets");
    get_assets(store, renderer, config, workspace_id, progress).await
}

/// [`get_assets`] for clients that must always receive a catalog: store
/// failures are logged and become the empty catalog.
pub async fn get_assets_or_empty(
    store: &dyn WorkspaceStore,
    renderer: &dyn MarkupRenderer,
    config: &EngineConfig,
    workspace_id: &str,
    progress: &dyn ProgressReporter,
) -> AssetsResponse {
    match get_assets(store, renderer, config, workspace_id, progress).await {
        Ok(consolidation) => consolidation.response,
        Err(e) => {
            warn!(workspace_id = %workspace_id, error = %e, "asset lookup failed, returning empty catalog");
            AssetsResponse::empty(workspace_id)
        }
    }
}

fn has_content(raw_assets: &BTreeMap<String, RawAsset>, marker_prefix: &str) -> bool {
    raw_assets
        .keys()
        .any(|id| marker_prefix.is_empty() || !id.starts_with(marker_prefix))
}
