//! Core domain types for AssetForge.
//!
//! Inputs (workspaces, tasks, raw assets, deliverables) arrive from the
//! orchestration layer; outputs ([`UnifiedAsset`], [`AssetsResponse`]) are the
//! JSON catalog returned to clients.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Task status that marks a task as eligible for consolidation.
pub const TASK_STATUS_COMPLETED: &str = "completed";

// ---------------------------------------------------------------------------
// Workspace / Task / Deliverable (read-only inputs)
// ---------------------------------------------------------------------------

/// A workspace owning goals, tasks, and deliverables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub name: String,
    /// The workspace goal, passed through to the response.
    #[serde(default)]
    pub goal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// A task executed by an AI agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_id: Option<String>,
    pub name: String,
    #[serde(default = "default_task_status")]
    pub status: String,
    /// How many times the task was re-run; always at least 1.
    #[serde(default = "default_iteration_count")]
    pub iteration_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    /// A completed, first-iteration task with no timestamps.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            workspace_id: None,
            name: name.into(),
            status: default_task_status(),
            iteration_count: 1,
            assigned_to_role: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TASK_STATUS_COMPLETED
    }
}

fn default_task_status() -> String {
    TASK_STATUS_COMPLETED.into()
}
fn default_iteration_count() -> u32 {
    1
}

/// A persisted deliverable record, scanned when primary extraction is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deliverable {
    pub id: String,
    pub workspace_id: String,
    #[serde(default)]
    pub title: String,
    /// Free-form deliverable body (usually a JSON object).
    #[serde(default)]
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// RawAsset
// ---------------------------------------------------------------------------

/// Extraction metadata attached to a [`RawAsset`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_to_use: Option<bool>,
    /// Quality dimension → score.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub quality_scores: BTreeMap<String, f64>,
    /// Business actionability in `0.0..=1.0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_actionability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_method: Option<String>,
    /// Extractor confidence (fallback extraction sets this).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Name of the asset when it has no resolvable source task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_name: Option<String>,
    /// Extractor-specific keys, preserved as-is.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// An extracted work-product candidate. Never mutated after extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAsset {
    #[serde(rename = "type")]
    pub asset_type: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub metadata: AssetMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendered_html: Option<String>,
}

impl RawAsset {
    /// Create a raw asset with empty metadata.
    pub fn new(asset_type: impl Into<String>, data: Value) -> Self {
        Self {
            asset_type: asset_type.into(),
            data,
            metadata: AssetMetadata::default(),
            rendered_html: None,
        }
    }

    /// Pre-rendered HTML carried at the top level or inside `data`.
    pub fn rendered_html(&self) -> Option<&str> {
        self.rendered_html
            .as_deref()
            .or_else(|| self.data.get("rendered_html").and_then(Value::as_str))
            .filter(|html| !html.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// Enhanced content
// ---------------------------------------------------------------------------

/// Which rendering strategy produced a [`ContentPayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnhancementSource {
    PreRendered,
    ContactListRenderer,
    EmailSequenceRenderer,
    MarkupProcessor,
    RawFallback,
    ErrorFallback,
}

impl EnhancementSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreRendered => "pre_rendered",
            Self::ContactListRenderer => "contact_list_renderer",
            Self::EmailSequenceRenderer => "email_sequence_renderer",
            Self::MarkupProcessor => "markup_processor",
            Self::RawFallback => "raw_fallback",
            Self::ErrorFallback => "error_fallback",
        }
    }
}

impl std::fmt::Display for EnhancementSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directly actionable block of rendered content (e.g. a contact table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionableSection {
    #[serde(rename = "type")]
    pub section_type: String,
    pub title: String,
    pub html: String,
    pub count: usize,
}

/// Presentation payload for the latest version of an asset group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendered_html: Option<String>,
    pub structured_content: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actionable_sections: Vec<ActionableSection>,
    /// Elements reported by the markup processor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markup_elements: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub has_ai_enhancement: bool,
    pub enhancement_source: EnhancementSource,
}

impl ContentPayload {
    /// Payload with only structured content set.
    pub fn new(structured_content: Value, source: EnhancementSource) -> Self {
        Self {
            rendered_html: None,
            structured_content,
            actionable_sections: Vec::new(),
            markup_elements: None,
            raw_content: None,
            error: None,
            has_ai_enhancement: false,
            enhancement_source: source,
        }
    }

    /// Payload recording a failed enhancement.
    pub fn error_fallback(structured_content: Value, message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::new(structured_content, EnhancementSource::ErrorFallback)
        }
    }
}

// ---------------------------------------------------------------------------
// UnifiedAsset
// ---------------------------------------------------------------------------

/// One entry of a unified asset's version history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionHistoryEntry {
    pub version: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: String,
    pub task_name: String,
    pub task_id: String,
    #[serde(default)]
    pub quality_scores: BTreeMap<String, f64>,
    pub changes_summary: String,
}

/// Summary of a task that contributed to a unified asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedTask {
    pub id: String,
    pub name: String,
    pub version: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub status: String,
}

/// The externally visible, versioned, presentation-ready asset record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedAsset {
    /// Equal to the group key.
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub asset_type: String,
    /// Number of versions consolidated into this asset.
    pub versions: usize,
    /// Newest timestamp the inputs carry for the group; `None` when no
    /// task or extraction record is dated.
    #[serde(rename = "lastModified")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(rename = "sourceTaskId")]
    pub source_task_id: Option<String>,
    pub ready_to_use: bool,
    pub quality_scores: BTreeMap<String, f64>,
    pub extraction_method: String,
    pub business_actionability: f64,
    pub content: ContentPayload,
    pub version_history: Vec<VersionHistoryEntry>,
    pub related_tasks: Vec<RelatedTask>,
}

// ---------------------------------------------------------------------------
// AssetsResponse
// ---------------------------------------------------------------------------

/// Where the assets in a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    UnifiedConcreteExtraction,
    NoCompletedTasks,
}

/// The full asset catalog for a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetsResponse {
    pub workspace_id: String,
    pub workspace_goal: String,
    pub assets: BTreeMap<String, UnifiedAsset>,
    pub asset_count: usize,
    pub total_versions: usize,
    pub processing_timestamp: DateTime<Utc>,
    pub data_source: DataSource,
}

impl AssetsResponse {
    /// The well-defined empty catalog (no workspace, no tasks, or no assets).
    pub fn empty(workspace_id: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            workspace_goal: String::new(),
            assets: BTreeMap::new(),
            asset_count: 0,
            total_versions: 0,
            processing_timestamp: Utc::now(),
            data_source: DataSource::NoCompletedTasks,
        }
    }

    /// Wrap assembled assets, deriving the count fields.
    pub fn from_assets(
        workspace_id: impl Into<String>,
        workspace_goal: impl Into<String>,
        assets: BTreeMap<String, UnifiedAsset>,
    ) -> Self {
        let total_versions = assets.values().map(|a| a.versions).sum();
        Self {
            workspace_id: workspace_id.into(),
            workspace_goal: workspace_goal.into(),
            asset_count: assets.len(),
            total_versions,
            assets,
            processing_timestamp: Utc::now(),
            data_source: DataSource::UnifiedConcreteExtraction,
        }
    }
}

// ---------------------------------------------------------------------------
// WorkspaceSnapshot
// ---------------------------------------------------------------------------

/// Import bundle: a workspace with its tasks, deliverables, and extractor output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceSnapshot {
    pub workspace: Workspace,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub deliverables: Vec<Deliverable>,
    /// Raw-asset id → raw asset, as produced by the extractor.
    #[serde(default)]
    pub raw_assets: BTreeMap<String, RawAsset>,
}
