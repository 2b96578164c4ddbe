//! Grouping classifier: raw asset type + task name → canonical group key.
//!
//! Classification is an ordered rule table evaluated top to bottom, first
//! match wins. Type rules come before task-name rules, compound name rules
//! before single-keyword rules, and single-keyword rules are ordered from the
//! most specific domain to the most generic. Reordering [`RULES`] changes
//! results.

use std::sync::LazyLock;

use regex::Regex;

/// How a rule inspects the asset type and the lowercased task name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    /// Asset type equals the value.
    TypeIs(&'static str),
    /// Asset type is one of the synonyms.
    TypeIn(&'static [&'static str]),
    /// Task name contains the first keyword and any of the others.
    NameContainsBoth(&'static str, &'static [&'static str]),
    /// Task name contains any of the keywords.
    NameContainsAny(&'static [&'static str]),
}

impl Predicate {
    fn matches(&self, asset_type: &str, task_name: &str) -> bool {
        match self {
            Self::TypeIs(t) => asset_type == *t,
            Self::TypeIn(types) => types.contains(&asset_type),
            Self::NameContainsBoth(first, others) => {
                task_name.contains(first) && others.iter().any(|k| task_name.contains(k))
            }
            Self::NameContainsAny(keywords) => keywords.iter().any(|k| task_name.contains(k)),
        }
    }
}

/// One classification rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub predicate: Predicate,
    pub group_key: &'static str,
}

const fn rule(predicate: Predicate, group_key: &'static str) -> Rule {
    Rule {
        predicate,
        group_key,
    }
}

const METRICS_TYPES: &[&str] = &[
    "metrics_tracking_dashboard",
    "tracking_dashboard",
    "dashboard",
    "kpi_dashboard",
    "analytics_dashboard",
    "performance_dashboard",
];

const SEGMENTATION_TYPES: &[&str] = &[
    "segmentation_guidelines",
    "contact_segmentation",
    "audience_segmentation",
    "segmentation",
    "targeting_guidelines",
    "guidelines",
];

const STRATEGY_TYPES: &[&str] = &[
    "strategy_framework",
    "strategic_framework",
    "framework",
    "strategy",
    "playbook",
    "process_framework",
];

/// The classification table, in evaluation order.
pub static RULES: &[Rule] = &[
    // Exact type equality
    rule(Predicate::TypeIs("contact_database"), "contact_database"),
    rule(Predicate::TypeIs("email_templates"), "email_sequences"),
    rule(Predicate::TypeIs("email_sequence_strategy"), "email_sequences"),
    // Type synonym sets
    rule(Predicate::TypeIn(METRICS_TYPES), "metrics_dashboard"),
    rule(Predicate::TypeIn(SEGMENTATION_TYPES), "segmentation_guidelines"),
    rule(Predicate::TypeIn(STRATEGY_TYPES), "strategy_framework"),
    // Compound task-name concepts
    rule(
        Predicate::NameContainsBoth("content", &["strategy", "plan"]),
        "content_strategy",
    ),
    rule(
        Predicate::NameContainsBoth("content", &["calendar", "editorial"]),
        "content_calendar",
    ),
    // Single keyword sets, most specific domain first
    rule(
        Predicate::NameContainsAny(&["metrics", "tracking", "dashboard", "kpi", "analytics"]),
        "metrics_dashboard",
    ),
    rule(
        Predicate::NameContainsAny(&["segmentation", "guidelines", "targeting", "persona"]),
        "segmentation_guidelines",
    ),
    rule(
        Predicate::NameContainsAny(&["strategy", "framework", "playbook", "process", "workflow"]),
        "strategy_framework",
    ),
    rule(
        Predicate::NameContainsAny(&["contact", "lead", "database", "prospect", "icp"]),
        "contact_database",
    ),
    rule(
        Predicate::NameContainsAny(&["email", "sequence", "outreach", "campaign"]),
        "email_sequences",
    ),
    rule(
        Predicate::NameContainsAny(&["analysis", "research", "competitor"]),
        "analysis_report",
    ),
];

/// Display names for the keys the rule table can produce.
const GROUP_NAMES: &[(&str, &str)] = &[
    ("contact_database", "ICP Contact Database"),
    ("email_sequences", "Email Sequences"),
    ("metrics_dashboard", "Metrics Tracking Dashboard"),
    ("segmentation_guidelines", "Contact Segmentation Guidelines"),
    ("strategy_framework", "Strategy Framework"),
    ("content_strategy", "Content Strategy"),
    ("content_calendar", "Content Calendar"),
    ("analysis_report", "Analysis Report"),
];

const DELIVERABLE_PREFIX: &str = "ai intelligent deliverable:";

/// Emoji and other pictographic markers agents prepend to task names.
static DECORATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{So}\p{Sk}\u{FE0F}\u{200D}]").expect("valid regex"));

/// The first rule matching the inputs, if any.
pub fn matching_rule(asset_type: &str, task_name: &str) -> Option<&'static Rule> {
    let asset_type = asset_type.to_lowercase();
    let task_name = task_name.to_lowercase();
    RULES
        .iter()
        .find(|r| r.predicate.matches(&asset_type, &task_name))
}

/// Map an asset to its canonical group key. Always returns a key.
pub fn classify(asset_type: &str, task_name: &str) -> String {
    match matching_rule(asset_type, task_name) {
        Some(rule) => rule.group_key.to_string(),
        None => fallback_key(asset_type, task_name),
    }
}

/// `{asset_type}_{task name with spaces/hyphens as underscores, lowercased}`.
fn fallback_key(asset_type: &str, task_name: &str) -> String {
    let normalized = task_name.trim().replace([' ', '-'], "_").to_lowercase();
    if normalized.is_empty() {
        asset_type.to_string()
    } else {
        format!("{asset_type}_{normalized}")
    }
}

/// Human display name for a group.
pub fn group_name(group_key: &str, asset_type: &str, task_name: &str) -> String {
    if let Some((_, name)) = GROUP_NAMES.iter().find(|(key, _)| *key == group_key) {
        return (*name).to_string();
    }

    let lower = task_name.to_lowercase();
    if lower.contains("contact") && lower.contains("research") {
        return "ICP Contact Database".to_string();
    }
    if lower.contains("email") && lower.contains("sequence") {
        return "Email Sequences".to_string();
    }

    let cleaned = clean_task_name(task_name);
    if cleaned.is_empty() {
        title_case(&asset_type.replace('_', " "))
    } else {
        title_case(&cleaned)
    }
}

/// Strip decorative markers and the deliverable prefix from a task name.
pub fn clean_task_name(task_name: &str) -> String {
    let stripped = DECORATION_RE.replace_all(task_name, "");
    let stripped = stripped.trim();
    let stripped = match stripped.get(..DELIVERABLE_PREFIX.len()) {
        Some(head) if head.eq_ignore_ascii_case(DELIVERABLE_PREFIX) => {
            &stripped[DELIVERABLE_PREFIX.len()..]
        }
        _ => stripped,
    };
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Capitalize each word; all-caps words (acronyms) are kept.
fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            if word.len() > 1 && word.chars().all(|c| !c.is_lowercase()) {
                return word.to_string();
            }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_type_rules_win_over_names() {
        assert_eq!(classify("contact_database", "Email outreach plan"), "contact_database");
        assert_eq!(classify("email_templates", "Initial Email Sequences"), "email_sequences");
        assert_eq!(classify("email_templates", "Lead list"), "email_sequences");
    }

    #[test]
    fn type_synonyms() {
        assert_eq!(classify("kpi_dashboard", "anything"), "metrics_dashboard");
        assert_eq!(classify("audience_segmentation", ""), "segmentation_guidelines");
        assert_eq!(classify("playbook", "Contact list"), "strategy_framework");
    }

    #[test]
    fn dashboard_type_beats_name_keywords() {
        assert_eq!(
            classify("dashboard", "Contact segmentation tracking"),
            "metrics_dashboard"
        );
    }

    #[test]
    fn segmentation_precedes_contact_in_name_rules() {
        assert_eq!(
            classify("business_asset", "Contact segmentation rules"),
            "segmentation_guidelines"
        );
        assert_eq!(
            classify("business_asset", "Contact segmentation tracking"),
            "metrics_dashboard"
        );
    }

    #[test]
    fn compound_content_rules_precede_strategy() {
        assert_eq!(classify("document", "Content Strategy for Q3"), "content_strategy");
        assert_eq!(classify("document", "Content plan"), "content_strategy");
        assert_eq!(classify("document", "Editorial content calendar"), "content_calendar");
        assert_eq!(classify("document", "Sales strategy"), "strategy_framework");
    }

    #[test]
    fn generic_keyword_order() {
        assert_eq!(classify("doc", "Prospect list for ICP"), "contact_database");
        assert_eq!(classify("doc", "Outreach campaign copy"), "email_sequences");
        assert_eq!(classify("doc", "Competitor research"), "analysis_report");
        // "lead" (contact) outranks "email"
        assert_eq!(classify("doc", "Lead email list"), "contact_database");
    }

    #[test]
    fn fallback_key_normalizes_task_name() {
        assert_eq!(
            classify("business_asset", "Pricing Page-Copy draft"),
            "business_asset_pricing_page_copy_draft"
        );
        assert_eq!(classify("business_asset", "   "), "business_asset");
    }

    #[test]
    fn matching_rule_exposes_the_winner() {
        let rule = matching_rule("doc", "Persona targeting").expect("rule");
        assert_eq!(rule.group_key, "segmentation_guidelines");
        assert!(matching_rule("doc", "Pricing page").is_none());
    }

    #[test]
    fn classification_is_deterministic() {
        for _ in 0..3 {
            assert_eq!(classify("doc", "Customer KPI analytics"), "metrics_dashboard");
        }
    }

    #[test]
    fn group_name_lookup_and_overrides() {
        assert_eq!(group_name("email_sequences", "email_templates", "x"), "Email Sequences");
        assert_eq!(
            group_name("report_contact_research_notes", "report", "Contact research notes"),
            "ICP Contact Database"
        );
        assert_eq!(
            group_name("doc_email_sequence_review", "doc", "Email sequence review"),
            "Email Sequences"
        );
    }

    #[test]
    fn group_name_cleans_task_name() {
        assert_eq!(
            group_name(
                "business_asset_x",
                "business_asset",
                "🤖 AI INTELLIGENT DELIVERABLE: pricing page copy"
            ),
            "Pricing Page Copy"
        );
        assert_eq!(group_name("pricing_sheet", "pricing_sheet", ""), "Pricing Sheet");
        assert_eq!(group_name("doc_x", "doc", "SEO audit"), "SEO Audit");
    }
}
