//! Fallback extraction over persisted deliverables.
//!
//! Used when the extractor produced nothing for a workspace. Each deliverable
//! yields raw assets from its `deliverable_assets` list, its
//! `project_summary`, and its `implementation_roadmap`; a deliverable that
//! yields none of these is wrapped whole as one `business_document`.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};
use tracing::{debug, instrument};

use assetforge_shared::{AssetMetadata, Deliverable, RawAsset};

pub const EXTRACTION_METHOD: &str = "deliverable_fallback";

const LISTED_CONFIDENCE: f64 = 0.8;
const SUMMARY_CONFIDENCE: f64 = 0.9;
const ROADMAP_CONFIDENCE: f64 = 0.85;
const DOCUMENT_CONFIDENCE: f64 = 0.7;

/// Name keywords → asset type, first match wins.
const TYPE_HINTS: &[(&[&str], &str)] = &[
    (&["contact", "lead"], "contact_database"),
    (&["email", "sequence"], "email_templates"),
    (&["report", "analysis"], "business_report"),
    (&["guide", "roadmap"], "implementation_guide"),
];

/// Infer an asset type from a free-text asset name.
pub fn infer_asset_type(name: &str) -> &'static str {
    let name = name.to_lowercase();
    TYPE_HINTS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| name.contains(k)))
        .map(|(_, asset_type)| *asset_type)
        .unwrap_or("business_asset")
}

/// Synthesize raw assets from deliverable records.
#[instrument(skip_all, fields(deliverables = deliverables.len()))]
pub fn extract_from_deliverables(deliverables: &[Deliverable]) -> BTreeMap<String, RawAsset> {
    let mut out = BTreeMap::new();

    for deliverable in deliverables {
        let before = out.len();
        let title = display_title(deliverable);

        if let Some(fields) = deliverable.content.as_object() {
            extract_listed(deliverable, &title, fields, &mut out);

            if let Some(summary) = present(fields.get("project_summary")) {
                out.insert(
                    format!("{}_summary", deliverable.id),
                    synthesized(
                        deliverable,
                        "project_report",
                        format!("{title} Summary"),
                        json!({ "project_summary": summary }),
                        SUMMARY_CONFIDENCE,
                    ),
                );
            }

            if let Some(roadmap) = present(fields.get("implementation_roadmap")) {
                out.insert(
                    format!("{}_roadmap", deliverable.id),
                    synthesized(
                        deliverable,
                        "implementation_guide",
                        format!("{title} Roadmap"),
                        json!({ "implementation_roadmap": roadmap }),
                        ROADMAP_CONFIDENCE,
                    ),
                );
            }
        }

        if out.len() == before && present(Some(&deliverable.content)).is_some() {
            let data = match &deliverable.content {
                Value::Object(_) => deliverable.content.clone(),
                other => json!({ "content": other }),
            };
            out.insert(
                format!("{}_document", deliverable.id),
                synthesized(
                    deliverable,
                    "business_document",
                    title.clone(),
                    data,
                    DOCUMENT_CONFIDENCE,
                ),
            );
        }

        debug!(
            deliverable = %deliverable.id,
            assets = out.len() - before,
            "deliverable scanned"
        );
    }

    out
}

fn extract_listed(
    deliverable: &Deliverable,
    title: &str,
    fields: &Map<String, Value>,
    out: &mut BTreeMap<String, RawAsset>,
) {
    let Some(entries) = fields.get("deliverable_assets").and_then(Value::as_array) else {
        return;
    };

    for (n, entry) in entries.iter().enumerate() {
        let (name, explicit_type, data) = match entry {
            Value::Object(item) => {
                let name = first_str(item, &["asset_name", "name"])
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{title} Asset {}", n + 1));
                let explicit_type = first_str(item, &["asset_type", "type"]).map(str::to_string);
                let data = ["asset_data", "data"]
                    .iter()
                    .find_map(|k| item.get(*k))
                    .cloned()
                    .unwrap_or_else(|| entry.clone());
                (name, explicit_type, data)
            }
            other => (
                format!("{title} Asset {}", n + 1),
                None,
                json!({ "content": other }),
            ),
        };

        let asset_type = explicit_type.unwrap_or_else(|| infer_asset_type(&name).to_string());
        out.insert(
            format!("{}_asset_{n}", deliverable.id),
            synthesized(deliverable, &asset_type, name, data, LISTED_CONFIDENCE),
        );
    }
}

fn synthesized(
    deliverable: &Deliverable,
    asset_type: &str,
    name: String,
    data: Value,
    confidence: f64,
) -> RawAsset {
    RawAsset {
        metadata: AssetMetadata {
            source_task_id: deliverable.source_task_id.clone(),
            extraction_timestamp: deliverable.created_at.map(|ts| ts.to_rfc3339()),
            confidence: Some(confidence),
            extraction_method: Some(EXTRACTION_METHOD.to_string()),
            asset_name: Some(name),
            ..AssetMetadata::default()
        },
        ..RawAsset::new(asset_type, data)
    }
}

fn display_title(deliverable: &Deliverable) -> String {
    if deliverable.title.trim().is_empty() {
        format!("Deliverable {}", deliverable.id)
    } else {
        deliverable.title.trim().to_string()
    }
}

/// The value, unless it is null or blank.
fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| match v {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(m) => !m.is_empty(),
        _ => true,
    })
}

fn first_str<'a>(item: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| item.get(*k).and_then(Value::as_str))
        .filter(|s| !s.trim().is_empty())
}
