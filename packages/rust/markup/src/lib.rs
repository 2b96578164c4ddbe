//! Markup processing and HTML rendering for asset content.
//!
//! The consolidation engine talks to rendering through the [`MarkupRenderer`]
//! trait. [`HtmlRenderer`] is the built-in implementation: it renders contact
//! lists as tables, email sequences as ordered sections, and scans free-text
//! fields for markup blocks (tables, cards, timelines, Markdown sections)
//! using `pulldown-cmark`.

mod blocks;

use async_trait::async_trait;
use pulldown_cmark::{Event, Options, Parser, html};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use assetforge_shared::{AssetForgeError, Result};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Kind of a detected markup element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkupKind {
    Table,
    Card,
    Timeline,
    Section,
}

/// A rendered fragment found inside an asset's structured content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkupElement {
    pub kind: MarkupKind,
    pub title: String,
    pub html: String,
    /// Dotted path of the field the element came from (e.g. `plan.steps[0]`).
    pub source_field: String,
}

/// Result of running the markup processor over a structured mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessedMarkup {
    pub has_structured_content: bool,
    pub elements: Vec<MarkupElement>,
}

impl ProcessedMarkup {
    /// All elements, in discovery order, as a JSON array.
    pub fn combined_elements(&self) -> Result<Value> {
        Ok(serde_json::to_value(&self.elements)?)
    }
}

/// Renders structured asset content into presentation HTML.
#[async_trait]
pub trait MarkupRenderer: Send + Sync {
    /// Render a list of contact records as a table.
    async fn render_contacts(&self, contacts: &[Value]) -> Result<String>;

    /// Render a list of email sequences.
    async fn render_email_sequences(&self, sequences: &[Value]) -> Result<String>;

    /// Scan a structured mapping for markup blocks.
    async fn process(&self, data: &Map<String, Value>) -> Result<ProcessedMarkup>;
}

// ---------------------------------------------------------------------------
// HtmlRenderer
// ---------------------------------------------------------------------------

/// Contact columns rendered first, in this order, when present.
const PREFERRED_CONTACT_COLUMNS: &[&str] = &[
    "name", "email", "company", "title", "role", "phone", "linkedin",
];

/// Nested values deeper than this are not scanned for markup.
const MAX_SCAN_DEPTH: usize = 8;

/// Built-in [`MarkupRenderer`] producing self-contained HTML fragments.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl HtmlRenderer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MarkupRenderer for HtmlRenderer {
    #[instrument(skip_all, fields(contacts = contacts.len()))]
    async fn render_contacts(&self, contacts: &[Value]) -> Result<String> {
        if contacts.is_empty() {
            return Err(AssetForgeError::render("contact list is empty"));
        }

        let columns = contact_columns(contacts);
        let mut html = String::from("<table class=\"contact-table\"><thead><tr>");
        for column in &columns {
            html.push_str(&format!("<th>{}</th>", escape_html(&humanize(column))));
        }
        html.push_str("</tr></thead><tbody>");

        for contact in contacts {
            html.push_str("<tr>");
            match contact {
                Value::Object(fields) => {
                    for column in &columns {
                        let cell = fields.get(column).map(cell_text).unwrap_or_default();
                        html.push_str(&format!("<td>{}</td>", escape_html(&cell)));
                    }
                }
                other => {
                    html.push_str(&format!(
                        "<td colspan=\"{}\">{}</td>",
                        columns.len(),
                        escape_html(&cell_text(other))
                    ));
                }
            }
            html.push_str("</tr>");
        }
        html.push_str("</tbody></table>");

        debug!(columns = columns.len(), html_len = html.len(), "contact table rendered");
        Ok(html)
    }

    #[instrument(skip_all, fields(sequences = sequences.len()))]
    async fn render_email_sequences(&self, sequences: &[Value]) -> Result<String> {
        if sequences.is_empty() {
            return Err(AssetForgeError::render("email sequence list is empty"));
        }

        let mut html = String::new();
        for (i, sequence) in sequences.iter().enumerate() {
            html.push_str(&render_sequence(i + 1, sequence));
        }
        Ok(html)
    }

    #[instrument(skip_all, fields(fields = data.len()))]
    async fn process(&self, data: &Map<String, Value>) -> Result<ProcessedMarkup> {
        let mut elements = Vec::new();
        for (key, value) in data {
            // Pre-rendered HTML is handled before the markup processor.
            if key == "rendered_html" {
                continue;
            }
            collect_elements(key, value, 0, &mut elements);
        }

        debug!(elements = elements.len(), "markup processing complete");
        Ok(ProcessedMarkup {
            has_structured_content: !elements.is_empty(),
            elements,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn collect_elements(path: &str, value: &Value, depth: usize, out: &mut Vec<MarkupElement>) {
    if depth > MAX_SCAN_DEPTH {
        return;
    }
    match value {
        Value::String(text) => out.extend(blocks::extract_blocks(path, text)),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                collect_elements(&format!("{path}[{i}]"), item, depth + 1, out);
            }
        }
        Value::Object(fields) => {
            for (key, item) in fields {
                collect_elements(&format!("{path}.{key}"), item, depth + 1, out);
            }
        }
        _ => {}
    }
}

/// Union of contact field names: preferred columns first, then first-seen order.
fn contact_columns(contacts: &[Value]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for fields in contacts.iter().filter_map(Value::as_object) {
        for key in fields.keys() {
            if !seen.iter().any(|k| k == key) {
                seen.push(key.clone());
            }
        }
    }

    if seen.is_empty() {
        return vec!["contact".to_string()];
    }

    let mut columns: Vec<String> = PREFERRED_CONTACT_COLUMNS
        .iter()
        .filter(|c| seen.iter().any(|k| k == *c))
        .map(|c| (*c).to_string())
        .collect();
    for key in seen {
        if !columns.contains(&key) {
            columns.push(key);
        }
    }
    columns
}

fn render_sequence(index: usize, sequence: &Value) -> String {
    let Some(fields) = sequence.as_object() else {
        return format!(
            "<section class=\"email-sequence\"><h3>Sequence {index}</h3>{}</section>",
            render_markdown(&cell_text(sequence))
        );
    };

    let name = first_str(fields, &["name", "sequence_name", "title"])
        .map(str::to_string)
        .unwrap_or_else(|| format!("Sequence {index}"));

    let mut html = format!(
        "<section class=\"email-sequence\"><h3>{}</h3>",
        escape_html(&name)
    );
    if let Some(goal) = first_str(fields, &["goal", "objective", "description"]) {
        html.push_str(&format!("<p class=\"sequence-goal\">{}</p>", escape_html(goal)));
    }

    let emails = ["emails", "steps", "messages"]
        .iter()
        .find_map(|k| fields.get(*k).and_then(Value::as_array));

    html.push_str("<ol>");
    for email in emails.into_iter().flatten() {
        html.push_str("<li>");
        match email.as_object() {
            Some(email) => {
                if let Some(subject) = first_str(email, &["subject", "title"]) {
                    html.push_str(&format!("<strong>{}</strong>", escape_html(subject)));
                }
                if let Some(timing) = ["day", "delay", "timing"]
                    .iter()
                    .find_map(|k| email.get(*k))
                {
                    html.push_str(&format!(
                        " <span class=\"timing\">{}</span>",
                        escape_html(&timing_label(timing))
                    ));
                }
                if let Some(body) = first_str(email, &["body", "content", "text"]) {
                    html.push_str(&format!(
                        "<div class=\"email-body\">{}</div>",
                        render_markdown(body)
                    ));
                }
            }
            None => html.push_str(&escape_html(&cell_text(email))),
        }
        html.push_str("</li>");
    }
    html.push_str("</ol></section>");
    html
}

fn timing_label(value: &Value) -> String {
    match value {
        Value::Number(n) => format!("Day {n}"),
        other => cell_text(other),
    }
}

fn first_str<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| fields.get(*k).and_then(Value::as_str))
        .filter(|s| !s.trim().is_empty())
}

/// Plain-text rendering of a JSON value for a table cell.
fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(cell_text).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

/// Render Markdown (with tables) to HTML. Raw HTML in the source is emitted
/// as escaped text.
pub(crate) fn render_markdown(md: &str) -> String {
    let parser = Parser::new_ext(md, Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH)
        .map(|event| match event {
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            other => other,
        });
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

/// Escape text for inclusion in HTML element content or attributes.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// `contact_list` / `kpi-targets` → `Contact List` / `Kpi Targets`.
pub fn humanize(key: &str) -> String {
    key.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(c) => {
                    let upper: String = c.to_uppercase().collect();
                    format!("{upper}{}", chars.as_str().to_lowercase())
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
