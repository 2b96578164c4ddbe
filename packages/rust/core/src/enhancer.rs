//! Content enhancement: the latest version of a group → presentation payload.
//!
//! Strategies are tried in [`STRATEGIES`] order and the first that produces a
//! payload wins. Renderer errors surface from [`try_enhance`]; [`enhance`]
//! converts them into an `error_fallback` payload so one group can never
//! abort a whole consolidation.

use serde_json::Value;
use tracing::{debug, instrument, warn};

use assetforge_markup::MarkupRenderer;
use assetforge_shared::{
    ActionableSection, AssetForgeError, ContentPayload, EnhancementSource, RawAsset, Result,
};

const NO_CONTENT: &str = "No detailed content available";

/// Content shape, derived once from the raw asset type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    ContactDatabase,
    EmailSequenceStrategy,
    Generic,
}

impl ContentKind {
    pub fn from_asset_type(asset_type: &str) -> Self {
        match asset_type {
            "contact_database" => Self::ContactDatabase,
            "email_sequence_strategy" => Self::EmailSequenceStrategy,
            _ => Self::Generic,
        }
    }
}

/// One enhancement path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    PreRendered,
    ContactList,
    EmailSequences,
    MarkupProcessor,
}

/// Enhancement strategies in evaluation order. The raw fallback applies when
/// none of these produce a payload.
pub const STRATEGIES: [Strategy; 4] = [
    Strategy::PreRendered,
    Strategy::ContactList,
    Strategy::EmailSequences,
    Strategy::MarkupProcessor,
];

impl Strategy {
    /// Whether the strategy should be attempted for this asset.
    pub fn applies(&self, asset: &RawAsset, kind: ContentKind) -> bool {
        match self {
            Self::PreRendered => asset.rendered_html().is_some(),
            Self::ContactList => {
                kind == ContentKind::ContactDatabase && non_empty_list(&asset.data, "contacts")
            }
            Self::EmailSequences => {
                kind == ContentKind::EmailSequenceStrategy
                    && non_empty_list(&asset.data, "sequences")
            }
            Self::MarkupProcessor => asset.data.as_object().is_some_and(|m| !m.is_empty()),
        }
    }

    /// Run the strategy. `Ok(None)` means the strategy found nothing to render.
    async fn apply(
        &self,
        asset: &RawAsset,
        renderer: &dyn MarkupRenderer,
    ) -> Result<Option<ContentPayload>> {
        let data = &asset.data;
        match self {
            Self::PreRendered => Ok(asset.rendered_html().map(|html| ContentPayload {
                rendered_html: Some(html.to_string()),
                has_ai_enhancement: true,
                ..ContentPayload::new(data.clone(), EnhancementSource::PreRendered)
            })),
            Self::ContactList => {
                let contacts = list(data, "contacts");
                let html = renderer.render_contacts(contacts).await?;
                let section = ActionableSection {
                    section_type: "contacts".into(),
                    title: format!("Contact List ({} contacts)", contacts.len()),
                    html: html.clone(),
                    count: contacts.len(),
                };
                Ok(Some(rendered_payload(
                    data,
                    html,
                    section,
                    EnhancementSource::ContactListRenderer,
                )))
            }
            Self::EmailSequences => {
                let sequences = list(data, "sequences");
                let html = renderer.render_email_sequences(sequences).await?;
                let section = ActionableSection {
                    section_type: "email_sequences".into(),
                    title: format!("Email Sequences ({})", sequences.len()),
                    html: html.clone(),
                    count: sequences.len(),
                };
                Ok(Some(rendered_payload(
                    data,
                    html,
                    section,
                    EnhancementSource::EmailSequenceRenderer,
                )))
            }
            Self::MarkupProcessor => {
                let Some(fields) = data.as_object() else {
                    return Ok(None);
                };
                let processed = renderer.process(fields).await?;
                if !processed.has_structured_content {
                    return Ok(None);
                }
                Ok(Some(ContentPayload {
                    markup_elements: Some(processed.combined_elements()?),
                    has_ai_enhancement: true,
                    ..ContentPayload::new(data.clone(), EnhancementSource::MarkupProcessor)
                }))
            }
        }
    }
}

/// Enhance an asset, propagating renderer failures.
#[instrument(skip_all, fields(asset_type = %asset.asset_type, goal = %workspace_goal))]
pub async fn try_enhance(
    asset: &RawAsset,
    workspace_goal: &str,
    renderer: &dyn MarkupRenderer,
) -> Result<ContentPayload> {
    let kind = ContentKind::from_asset_type(&asset.asset_type);
    for strategy in STRATEGIES {
        if !strategy.applies(asset, kind) {
            continue;
        }
        if let Some(payload) = strategy.apply(asset, renderer).await? {
            debug!(?strategy, source = %payload.enhancement_source, "asset enhanced");
            return Ok(payload);
        }
    }
    debug!("no strategy applied, using raw fallback");
    Ok(raw_fallback(&asset.data))
}

/// Enhance an asset; failures become an `error_fallback` payload.
pub async fn enhance(
    asset: &RawAsset,
    workspace_goal: &str,
    renderer: &dyn MarkupRenderer,
) -> ContentPayload {
    match try_enhance(asset, workspace_goal, renderer).await {
        Ok(payload) => payload,
        Err(e) => {
            warn!(asset_type = %asset.asset_type, error = %e, "enhancement failed");
            error_fallback(asset, &e)
        }
    }
}

/// Payload for an asset whose enhancement failed: raw data plus the error.
pub fn error_fallback(asset: &RawAsset, error: &AssetForgeError) -> ContentPayload {
    ContentPayload::error_fallback(asset.data.clone(), error.to_string())
}

/// Payload carrying the raw data as text.
pub fn raw_fallback(data: &Value) -> ContentPayload {
    ContentPayload {
        raw_content: Some(stringify(data)),
        ..ContentPayload::new(data.clone(), EnhancementSource::RawFallback)
    }
}

fn rendered_payload(
    data: &Value,
    html: String,
    section: ActionableSection,
    source: EnhancementSource,
) -> ContentPayload {
    ContentPayload {
        rendered_html: Some(html),
        actionable_sections: vec![section],
        has_ai_enhancement: true,
        ..ContentPayload::new(data.clone(), source)
    }
}

fn list<'v>(data: &'v Value, key: &str) -> &'v [Value] {
    data.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn non_empty_list(data: &Value, key: &str) -> bool {
    !list(data, key).is_empty()
}

fn stringify(data: &Value) -> String {
    let text = match data {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Object(m) if m.is_empty() => String::new(),
        Value::Array(a) if a.is_empty() => String::new(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };
    if text.trim().is_empty() {
        NO_CONTENT.to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assetforge_markup::{HtmlRenderer, ProcessedMarkup};
    use async_trait::async_trait;
    use serde_json::{Map, json};

    /// Renderer that fails every call.
    struct BrokenRenderer;

    #[async_trait]
    impl MarkupRenderer for BrokenRenderer {
        async fn render_contacts(&self, _contacts: &[Value]) -> Result<String> {
            Err(AssetForgeError::render("renderer offline"))
        }
        async fn render_email_sequences(&self, _sequences: &[Value]) -> Result<String> {
            Err(AssetForgeError::render("renderer offline"))
        }
        async fn process(&self, _data: &Map<String, Value>) -> Result<ProcessedMarkup> {
            Err(AssetForgeError::render("renderer offline"))
        }
    }

    fn contacts_asset() -> RawAsset {
        RawAsset::new(
            "contact_database",
            json!({"contacts": [{"name": "Ada", "email": "ada@example.com"}]}),
        )
    }

    #[test]
    fn content_kind_from_type() {
        assert_eq!(
            ContentKind::from_asset_type("contact_database"),
            ContentKind::ContactDatabase
        );
        assert_eq!(
            ContentKind::from_asset_type("email_sequence_strategy"),
            ContentKind::EmailSequenceStrategy
        );
        assert_eq!(ContentKind::from_asset_type("email_templates"), ContentKind::Generic);
    }

    #[test]
    fn strategy_applicability_is_table_driven() {
        let asset = contacts_asset();
        let kind = ContentKind::from_asset_type(&asset.asset_type);
        let applicable: Vec<_> = STRATEGIES
            .into_iter()
            .filter(|s| s.applies(&asset, kind))
            .collect();
        assert_eq!(applicable, vec![Strategy::ContactList, Strategy::MarkupProcessor]);
    }

    #[tokio::test]
    async fn pre_rendered_wins() {
        let asset = RawAsset::new(
            "contact_database",
            json!({"rendered_html": "<p>done</p>", "contacts": [{"name": "Ada"}]}),
        );
        let payload = enhance(&asset, "goal", &BrokenRenderer).await;
        assert_eq!(payload.enhancement_source, EnhancementSource::PreRendered);
        assert_eq!(payload.rendered_html.as_deref(), Some("<p>done</p>"));
        assert!(payload.has_ai_enhancement);
    }

    #[tokio::test]
    async fn contact_list_renders_table_section() {
        let payload = enhance(&contacts_asset(), "goal", &HtmlRenderer::new()).await;
        assert_eq!(payload.enhancement_source, EnhancementSource::ContactListRenderer);
        assert_eq!(payload.actionable_sections.len(), 1);
        let section = &payload.actionable_sections[0];
        assert_eq!(section.section_type, "contacts");
        assert_eq!(section.count, 1);
        assert!(payload.rendered_html.as_deref().unwrap_or("").contains("<table"));
    }

    #[tokio::test]
    async fn email_sequence_strategy_renders_sequences() {
        let asset = RawAsset::new(
            "email_sequence_strategy",
            json!({"sequences": [{"name": "Intro", "emails": [{"subject": "Hi"}]}]}),
        );
        let payload = enhance(&asset, "goal", &HtmlRenderer::new()).await;
        assert_eq!(payload.enhancement_source, EnhancementSource::EmailSequenceRenderer);
        assert_eq!(payload.actionable_sections[0].section_type, "email_sequences");
    }

    #[tokio::test]
    async fn markup_processor_for_structured_text() {
        let asset = RawAsset::new(
            "strategy_framework",
            json!({"plan": "## Steps\n- Research\n- Outreach"}),
        );
        let payload = enhance(&asset, "goal", &HtmlRenderer::new()).await;
        assert_eq!(payload.enhancement_source, EnhancementSource::MarkupProcessor);
        assert!(payload.markup_elements.is_some());
        assert!(payload.has_ai_enhancement);
    }

    #[tokio::test]
    async fn plain_data_falls_back_to_raw() {
        let asset = RawAsset::new("business_asset", json!({"budget": 1200}));
        let payload = enhance(&asset, "goal", &HtmlRenderer::new()).await;
        assert_eq!(payload.enhancement_source, EnhancementSource::RawFallback);
        assert!(!payload.has_ai_enhancement);
        assert!(payload.raw_content.as_deref().unwrap_or("").contains("1200"));
    }

    #[tokio::test]
    async fn empty_data_reports_no_content() {
        let asset = RawAsset::new("business_asset", json!({}));
        let payload = enhance(&asset, "goal", &HtmlRenderer::new()).await;
        assert_eq!(payload.raw_content.as_deref(), Some(NO_CONTENT));
    }

    #[tokio::test]
    async fn renderer_failure_becomes_error_fallback() {
        let asset = contacts_asset();
        assert!(try_enhance(&asset, "goal", &BrokenRenderer).await.is_err());

        let payload = enhance(&asset, "goal", &BrokenRenderer).await;
        assert_eq!(payload.enhancement_source, EnhancementSource::ErrorFallback);
        assert!(!payload.has_ai_enhancement);
        assert!(payload.error.as_deref().unwrap_or("").contains("renderer offline"));
        assert_eq!(payload.structured_content, asset.data);
    }

    #[test]
    fn error_fallback_carries_error_text_and_raw_data() {
        let asset = contacts_asset();
        let err = AssetForgeError::Enhancement("budget exceeded".into());
        let payload = error_fallback(&asset, &err);
        assert_eq!(payload.enhancement_source, EnhancementSource::ErrorFallback);
        assert_eq!(payload.error.as_deref(), Some("enhancement error: budget exceeded"));
        assert_eq!(payload.structured_content, asset.data);
    }
}
