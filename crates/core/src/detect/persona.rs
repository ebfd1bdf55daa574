//! Persona detection.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sc_protocol::{DetectorSettings, FeatureKind, IssueKind, Persona, PipelineIssue, Stage};
use tracing::{debug, info, instrument, warn};

use super::{
    cancelled_issue, document_issues, first_matching, parse_issue, DetectionContext, Detector,
    DetectorOutput, Features,
};
use crate::parser::ConfigNode;

/// Candidate locations, most specific first. The first pattern that matches
/// any file decides the persona source for the whole repository.
pub const PERSONA_CANDIDATES: [&str; 4] = [
    ".claude/shared/superclaude-personas.yml",
    "shared/superclaude-personas.yml",
    "superclaude-personas.yml",
    ".claude/personas/*.yml",
];

/// Prompt fields in composition order, with their labels.
const PROMPT_FIELDS: [(&str, &str); 6] = [
    ("Identity", "You are"),
    ("Core_Belief", "Core Belief"),
    ("Primary_Question", "Primary Question"),
    ("Decision_Framework", "Decision Framework"),
    ("Problem_Solving", "Problem Solving"),
    ("Focus", "Focus"),
];

/// Keyword to tool name, in the order tools are listed.
const TOOL_VOCABULARY: [(&str, &str); 5] = [
    ("sequential", "sequential"),
    ("context7", "research"),
    ("c7", "research"),
    ("magic", "magic"),
    ("puppeteer", "browser"),
];

pub struct PersonaDetector;

#[async_trait]
impl Detector for PersonaDetector {
    fn kind(&self) -> FeatureKind {
        FeatureKind::Personas
    }

    #[instrument(skip_all, fields(root = %ctx.repo_root.display()))]
    async fn detect(&self, ctx: &DetectionContext) -> DetectorOutput {
        let mut personas: BTreeMap<String, Persona> = BTreeMap::new();
        let mut issues = Vec::new();
        let mut cancelled = false;

        for path in first_matching(&ctx.repo_root, &PERSONA_CANDIDATES) {
            if ctx.is_cancelled() {
                cancelled = true;
                issues.push(cancelled_issue(FeatureKind::Personas));
                break;
            }
            let source = ctx.display_path(&path);
            let document = match ctx.cache.get_parsed(&path).await {
                Ok(document) => document,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "persona source unusable");
                    issues.push(parse_issue(&err, FeatureKind::Personas));
                    continue;
                }
            };
            issues.extend(document_issues(&document, FeatureKind::Personas));

            for (name, entry) in persona_entries(&document.root) {
                let Some(name) = name.filter(|name| !name.trim().is_empty()) else {
                    issues.push(
                        PipelineIssue::new(IssueKind::Skipped, Stage::Detect, "persona entry without a name skipped")
                            .with_feature(FeatureKind::Personas)
                            .with_path(source.clone()),
                    );
                    continue;
                };
                let persona = build_persona(name.trim(), entry, &ctx.settings, &source);
                if personas.insert(persona.name.clone(), persona).is_some() {
                    debug!(persona = name.trim(), "duplicate persona, keeping the later definition");
                    issues.push(
                        PipelineIssue::new(
                            IssueKind::DuplicateName,
                            Stage::Detect,
                            format!("duplicate persona `{}`; the later definition wins", name.trim()),
                        )
                        .with_feature(FeatureKind::Personas)
                        .with_path(source.clone()),
                    );
                }
            }
        }

        info!(count = personas.len(), "personas detected");
        DetectorOutput {
            features: Features::Personas(personas.into_values().collect()),
            issues,
            cancelled,
        }
    }
}

/// Persona entries of a document as `(name, definition)` pairs.
///
/// Entries live under `All_Personas` or `personas` (a map keyed by name or a
/// sequence of maps with a `name` field). A document with a top-level `name`
/// is a single persona, and any other document is read as a map of personas.
fn persona_entries(root: &ConfigNode) -> Vec<(Option<String>, &ConfigNode)> {
    let container = root
        .find_section("All_Personas")
        .or_else(|| root.find_section("personas"));

    let container = match container {
        Some(container) => container,
        None if root.get("name").is_some() => return vec![(named(root), root)],
        None => root,
    };

    match container {
        ConfigNode::Map(map) => map
            .iter()
            .filter(|(_, entry)| entry.as_map().is_some())
            .map(|(key, entry)| (named(entry).or_else(|| Some(key.to_string())), entry))
            .collect(),
        ConfigNode::Sequence(items) => items
            .iter()
            .filter(|entry| entry.as_map().is_some())
            .map(|entry| (named(entry), entry))
            .collect(),
        _ => Vec::new(),
    }
}

fn named(entry: &ConfigNode) -> Option<String> {
    entry.get("name").and_then(ConfigNode::scalar_text)
}

fn field_text(entry: &ConfigNode, key: &str) -> Option<String> {
    entry
        .get_loose(key)
        .and_then(|value| value.joined_text(", "))
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

pub(crate) fn build_persona(
    name: &str,
    entry: &ConfigNode,
    settings: &DetectorSettings,
    source: &str,
) -> Persona {
    let identity = field_text(entry, "Identity");
    let system_prompt = field_text(entry, "systemPrompt").unwrap_or_else(|| {
        let lines: Vec<String> = PROMPT_FIELDS
            .iter()
            .filter_map(|(key, label)| field_text(entry, key).map(|value| format!("{label}: {value}")))
            .collect();
        if lines.is_empty() {
            format!("You are: {name}")
        } else {
            lines.join("\n")
        }
    });

    let description = field_text(entry, "description")
        .or(identity)
        .unwrap_or_else(|| name.to_string());

    Persona {
        name: name.to_string(),
        description,
        system_prompt,
        model: field_text(entry, "model").unwrap_or_else(|| settings.default_model.clone()),
        temperature: entry
            .get_loose("temperature")
            .and_then(ConfigNode::as_f64)
            .unwrap_or(settings.default_temperature),
        tools: persona_tools(entry),
        auto_activate: entry
            .get_loose("auto_activate")
            .map(|value| value.string_list(&[" | "]))
            .unwrap_or_default(),
        source: source.to_string(),
    }
}

/// Explicit `tools` win; otherwise the preference text is matched against
/// the tool vocabulary.
fn persona_tools(entry: &ConfigNode) -> Vec<String> {
    if let Some(tools) = entry.get_loose("tools") {
        let tools = tools.string_list(&[",", "|"]);
        if !tools.is_empty() {
            return tools;
        }
    }

    let Some(preferences) = field_text(entry, "MCP_Preferences") else {
        return Vec::new();
    };
    let preferences = preferences.to_lowercase();
    let mut tools: Vec<String> = Vec::new();
    for (keyword, tool) in TOOL_VOCABULARY {
        if preferences.contains(keyword) && !tools.iter().any(|t| t == tool) {
            tools.push(tool.to_string());
        }
    }
    tools
}
