//! Markup block detection for free-text asset fields.
//!
//! Agents write structured fragments into plain strings: explicit
//! `## CARD:` / `## TIMELINE:` / `## TABLE:` blocks, bare Markdown pipe
//! tables, and ordinary Markdown prose. Each detected block becomes one
//! [`MarkupElement`] with its HTML rendering.

use std::sync::LazyLock;

use regex::Regex;

use crate::{MarkupElement, MarkupKind, humanize, render_markdown};

/// `## CARD: Title`, `## TIMELINE: Title`, `## TABLE: Title`.
static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*##\s*(CARD|TIMELINE|TABLE)\s*:\s*(.*)$").expect("valid regex")
});

/// Markdown table separator row, e.g. `|---|:---:|`.
static SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\|?\s*:?-{3,}:?\s*(\|\s*:?-{3,}:?\s*)*\|?\s*$").expect("valid regex")
});

/// Headings or list items mark prose as structured.
static STRUCTURE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(#{1,6}\s+\S|[-*+]\s+\S|\d+\.\s+\S)").expect("valid regex")
});

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*#{1,6}\s+(.+?)\s*$").expect("valid regex"));

static LIST_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*+]|\d+\.)\s+(.*)$").expect("valid regex"));

/// Split one text field into markup elements.
pub(crate) fn extract_blocks(field: &str, text: &str) -> Vec<MarkupElement> {
    let lines: Vec<&str> = text.lines().collect();
    let mut elements = Vec::new();
    let mut prose: Vec<&str> = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];

        if let Some(caps) = BLOCK_RE.captures(line) {
            let kind = caps[1].to_ascii_uppercase();
            let title = caps[2].trim().to_string();
            let end = block_end(&lines, i + 1);
            let body = lines[i + 1..end].join("\n");
            elements.push(explicit_block(&kind, title, &body, field));
            i = end;
            continue;
        }

        if line.trim_start().starts_with('|') {
            let end = table_end(&lines, i);
            let rows = &lines[i..end];
            if rows.len() >= 2 && SEPARATOR_RE.is_match(rows[1]) {
                elements.push(MarkupElement {
                    kind: MarkupKind::Table,
                    title: humanize(field),
                    html: render_markdown(&rows.join("\n")),
                    source_field: field.to_string(),
                });
            } else {
                prose.extend_from_slice(rows);
            }
            i = end;
            continue;
        }

        prose.push(line);
        i += 1;
    }

    let prose = prose.join("\n");
    if STRUCTURE_RE.is_match(&prose) {
        let title = HEADING_RE
            .captures(&prose)
            .map(|caps| caps[1].to_string())
            .unwrap_or_else(|| humanize(field));
        elements.push(MarkupElement {
            kind: MarkupKind::Section,
            title,
            html: render_markdown(&prose),
            source_field: field.to_string(),
        });
    }

    elements
}

/// An explicit block runs until the next level-2 heading or the end of text.
fn block_end(lines: &[&str], start: usize) -> usize {
    lines[start..]
        .iter()
        .position(|l| l.trim_start().starts_with("## "))
        .map_or(lines.len(), |offset| start + offset)
}

fn table_end(lines: &[&str], start: usize) -> usize {
    lines[start..]
        .iter()
        .position(|l| !l.trim_start().starts_with('|'))
        .map_or(lines.len(), |offset| start + offset)
}

fn explicit_block(kind: &str, title: String, body: &str, field: &str) -> MarkupElement {
    let title = if title.is_empty() { humanize(field) } else { title };

    let (kind, html) = match kind {
        "TIMELINE" => (MarkupKind::Timeline, render_timeline(&title, body)),
        "TABLE" => (MarkupKind::Table, render_markdown(body.trim())),
        _ => (
            MarkupKind::Card,
            format!(
                "<div class=\"card\"><h4>{}</h4>{}</div>",
                crate::escape_html(&title),
                render_markdown(body.trim())
            ),
        ),
    };

    MarkupElement {
        kind,
        title,
        html,
        source_field: field.to_string(),
    }
}

/// Timeline bodies are list items, one milestone each.
fn render_timeline(title: &str, body: &str) -> String {
    let mut html = format!(
        "<div class=\"timeline\"><h4>{}</h4><ol>",
        crate::escape_html(title)
    );
    for line in body.lines() {
        let item = LIST_ITEM_RE
            .captures(line)
            .map(|caps| caps[1].to_string())
            .unwrap_or_else(|| line.trim().to_string());
        if item.is_empty() {
            continue;
        }
        html.push_str("<li>");
        html.push_str(crate::escape_html(&item).as_str());
        html.push_str("</li>");
    }
    html.push_str("</ol></div>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_bare_pipe_table() {
        let text = "Intro line\n\n| Name | Role |\n|------|------|\n| Ada | CTO |\n";
        let elements = extract_blocks("contact_list", text);
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].kind, MarkupKind::Table);
        assert_eq!(elements[0].title, "Contact List");
        assert!(elements[0].html.contains("<table>"));
        assert!(elements[0].html.contains("Ada"));
    }

    #[test]
    fn pipe_lines_without_separator_are_prose() {
        let elements = extract_blocks("notes", "| just a pipe\n| another pipe");
        assert!(elements.is_empty());
    }

    #[test]
    fn detects_card_and_timeline_blocks() {
        let text = "## CARD: Quick Win\nSend the **first** email today.\n\
                    ## TIMELINE: Rollout\n- Week 1: research\n- Week 2: outreach\n";
        let elements = extract_blocks("plan", text);
        assert_eq!(elements.len(), 2);

        assert_eq!(elements[0].kind, MarkupKind::Card);
        assert_eq!(elements[0].title, "Quick Win");
        assert!(elements[0].html.contains("<strong>first</strong>"));

        assert_eq!(elements[1].kind, MarkupKind::Timeline);
        assert!(elements[1].html.contains("<li>Week 1: research</li>"));
        assert!(elements[1].html.contains("<li>Week 2: outreach</li>"));
    }

    #[test]
    fn explicit_table_block_without_title_uses_field() {
        let text = "## TABLE:\n| KPI | Target |\n|---|---|\n| Replies | 10% |";
        let elements = extract_blocks("kpi_targets", text);
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].kind, MarkupKind::Table);
        assert_eq!(elements[0].title, "Kpi Targets");
    }

    #[test]
    fn structured_prose_becomes_section() {
        let text = "# Launch Plan\n- Define ICP\n- Build list";
        let elements = extract_blocks("summary", text);
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].kind, MarkupKind::Section);
        assert_eq!(elements[0].title, "Launch Plan");
        assert!(elements[0].html.contains("<li>Define ICP</li>"));
    }

    #[test]
    fn plain_sentence_yields_nothing() {
        assert!(extract_blocks("summary", "Just one plain sentence.").is_empty());
    }
}
