//! Protocol-server detection.
//!
//! Server knowledge is spread over three documents in three encodings:
//! execution patterns (fenced YAML), the MCP reference (header sections) and
//! cache patterns (plain YAML). Each may describe part of the same server,
//! so fragments are merged field by field: scalars fill only when empty,
//! lists union in first-seen order and maps keep existing keys.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sc_protocol::{
    CommandDefault, ContextTrigger, FeatureKind, QualityCheck, ServerCatalog, ServerSpec,
    ServerWorkflow, TokenEconomics,
};
use tracing::{debug, info, instrument, warn};

use super::{
    cancelled_issue, document_issues, parse_issue, DetectionContext, Detector, DetectorOutput,
    Features,
};
use crate::parser::ConfigNode;

pub const SERVER_SOURCES: [&str; 3] = [
    ".claude/commands/shared/execution-patterns.yml",
    ".claude/shared/superclaude-mcp.yml",
    ".claude/commands/shared/mcp-cache-patterns.yml",
];

/// Known servers: canonical name, control flag, and the words that mention it.
const KNOWN_SERVERS: [(&str, &str, &[&str]); 4] = [
    ("Magic", "--magic", &["magic"]),
    ("Context7", "--c7", &["c7", "context7"]),
    ("Sequential", "--seq", &["sequential", "seq"]),
    ("Puppeteer", "--pup", &["puppeteer", "pup"]),
];

/// Workflow name keywords to the server that runs the workflow.
const WORKFLOW_SERVERS: [(&[&str], &str); 4] = [
    (&["library", "research"], "Context7"),
    (&["complex", "analysis"], "Sequential"),
    (&["ui", "component"], "Magic"),
    (&["test", "browser"], "Puppeteer"),
];

const SEGMENT: &[&str] = &[" | "];

pub struct ServerDetector;

#[async_trait]
impl Detector for ServerDetector {
    fn kind(&self) -> FeatureKind {
        FeatureKind::Servers
    }

    #[instrument(skip_all, fields(root = %ctx.repo_root.display()))]
    async fn detect(&self, ctx: &DetectionContext) -> DetectorOutput {
        let mut catalog = ServerCatalog::default();
        let mut issues = Vec::new();
        let mut cancelled = false;

        for relative in SERVER_SOURCES {
            if ctx.is_cancelled() {
                cancelled = true;
                issues.push(cancelled_issue(FeatureKind::Servers));
                break;
            }
            let path = ctx.repo_root.join(relative);
            if !path.is_file() {
                debug!(path = %path.display(), "server source absent");
                continue;
            }
            match ctx.cache.get_parsed(&path).await {
                Ok(document) => {
                    issues.extend(document_issues(&document, FeatureKind::Servers));
                    extract_catalog(&document.root, &mut catalog);
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "server source unusable");
                    issues.push(parse_issue(&err, FeatureKind::Servers));
                }
            }
        }

        info!(count = catalog.servers.len(), "servers detected");
        DetectorOutput {
            features: Features::Servers(catalog),
            issues,
            cancelled,
        }
    }
}

/// Top-level entries followed by the entries of each top-level map.
fn candidate_entries(root: &ConfigNode) -> Vec<(&str, &ConfigNode)> {
    let Some(map) = root.as_map() else {
        return Vec::new();
    };
    let nested = map
        .iter()
        .filter_map(|(_, value)| value.as_map())
        .flat_map(|section| section.iter());
    map.iter().chain(nested).collect()
}

/// Merges everything server-related found in `root` into `catalog`.
pub(crate) fn extract_catalog(root: &ConfigNode, catalog: &mut ServerCatalog) {
    for (key, value) in candidate_entries(root) {
        match key {
            "Servers" => extract_servers(value, catalog),
            "Server_Capabilities_Extended" => extract_extended(value, catalog),
            "Command_Integration" => extract_command_integration(value, catalog),
            "Token_Economics" => extract_token_economics(value, &mut catalog.token_economics),
            "Workflows" | "MCP_Workflows" => extract_workflows(value, catalog),
            "Quality_Control" => extract_quality_control(value, catalog),
            "Context_Detection_Patterns" => extract_context_triggers(value, catalog),
            key if key.ends_with("_Commands") => extract_command_usages(value, catalog),
            _ => {}
        }
    }
}

fn text(node: &ConfigNode, key: &str) -> Option<String> {
    node.get_loose(key)
        .and_then(|value| value.joined_text(", "))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Text of the first of `keys` present in `node`.
fn first_text(node: &ConfigNode, keys: &[&str]) -> Option<String> {
    node.as_map()
        .and_then(|map| map.get_any(keys))
        .and_then(|value| value.joined_text(", "))
}

fn canonical_server_name(name: &str) -> String {
    let lower = name.to_lowercase();
    KNOWN_SERVERS
        .iter()
        .find(|(canonical, _, aliases)| canonical.to_lowercase() == lower || aliases.contains(&lower.as_str()))
        .map_or_else(|| name.to_string(), |(canonical, _, _)| canonical.to_string())
}

/// Servers mentioned in a usage fragment, in table order.
fn mentioned_servers(fragment: &str) -> Vec<(&'static str, &'static str)> {
    let words: Vec<String> = fragment
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect();
    KNOWN_SERVERS
        .iter()
        .filter(|(_, _, aliases)| words.iter().any(|word| aliases.contains(&word.as_str())))
        .map(|(name, flag, _)| (*name, *flag))
        .collect()
}

fn server_capabilities(node: &ConfigNode) -> Vec<String> {
    match node {
        ConfigNode::Sequence(items) => items
            .iter()
            .flat_map(|item| match item {
                ConfigNode::Map(map) => map.keys().map(str::to_string).collect::<Vec<_>>(),
                other => other
                    .scalar_text()
                    .and_then(|text| text.split(':').next().map(|name| name.trim().to_string()))
                    .into_iter()
                    .collect(),
            })
            .filter(|capability| !capability.is_empty())
            .collect(),
        ConfigNode::Map(map) => map.keys().map(str::to_string).collect(),
        other => other.string_list(SEGMENT),
    }
}

fn extract_servers(section: &ConfigNode, catalog: &mut ServerCatalog) {
    let Some(servers) = section.as_map() else {
        return;
    };
    for (name, definition) in servers.iter() {
        if definition.as_map().is_none() {
            continue;
        }
        let fragment = ServerSpec {
            name: canonical_server_name(name),
            purpose: text(definition, "Purpose").unwrap_or_default(),
            capabilities: definition
                .get_loose("Capabilities")
                .map(server_capabilities)
                .unwrap_or_default(),
            best_for: definition
                .get_loose("Best_For")
                .map(|value| value.string_list(SEGMENT))
                .unwrap_or_default(),
            token_cost: text(definition, "Token_Cost"),
            success_rate: text(definition, "Success_Rate"),
            fallback: text(definition, "Fallback"),
            ..ServerSpec::default()
        };
        merge_server(catalog, fragment);
    }
}

fn extract_extended(section: &ConfigNode, catalog: &mut ServerCatalog) {
    let Some(servers) = section.as_map() else {
        return;
    };
    for (name, definition) in servers.iter() {
        if definition.as_map().is_none() {
            continue;
        }
        let name = canonical_server_name(name);
        let mut capabilities = definition
            .get_loose("Capabilities")
            .map(server_capabilities)
            .unwrap_or_default();
        capabilities.extend(text(definition, "Use"));

        let mut workflows = BTreeMap::new();
        if let Some(steps) = definition.get_loose("Workflows").map(workflow_steps) {
            if !steps.is_empty() {
                workflows.insert(
                    "default".to_string(),
                    ServerWorkflow {
                        name: "default".to_string(),
                        steps,
                    },
                );
            }
        }

        merge_server(
            catalog,
            ServerSpec {
                name,
                purpose: text(definition, "Purpose").unwrap_or_default(),
                capabilities,
                best_for: definition
                    .get_loose("Best_For")
                    .map(|value| value.string_list(SEGMENT))
                    .unwrap_or_default(),
                token_cost: text(definition, "Token_Cost"),
                workflows,
                ..ServerSpec::default()
            },
        );
    }
}

fn extract_command_integration(section: &ConfigNode, catalog: &mut ServerCatalog) {
    let Some(entries) = section.as_map() else {
        return;
    };
    for (key, value) in entries.iter() {
        match value {
            ConfigNode::Map(_) => extract_command_usages(value, catalog),
            other => {
                if let Some(usage) = other.scalar_text() {
                    add_command_usage(catalog, key, &usage);
                }
            }
        }
    }
}

fn extract_command_usages(section: &ConfigNode, catalog: &mut ServerCatalog) {
    let Some(commands) = section.as_map() else {
        return;
    };
    for (command, usage) in commands.iter() {
        if let Some(usage) = usage.joined_text(" | ") {
            add_command_usage(catalog, command, &usage);
        }
    }
}

/// Records every `|`-segment of `usage` that mentions a server as that
/// server's default for `command`.
fn add_command_usage(catalog: &mut ServerCatalog, command: &str, usage: &str) {
    for segment in usage.split('|').map(str::trim).filter(|s| !s.is_empty()) {
        for (server, flag) in mentioned_servers(segment) {
            let mut fragment = ServerSpec {
                name: server.to_string(),
                ..ServerSpec::default()
            };
            fragment.command_defaults.insert(
                command.to_string(),
                CommandDefault {
                    note: segment.to_string(),
                    flag: Some(flag.to_string()),
                },
            );
            merge_server(catalog, fragment);
        }
    }
}

fn extract_token_economics(section: &ConfigNode, economics: &mut TokenEconomics) {
    let list = |key: &str| {
        section
            .get_loose(key)
            .map(|value| value.string_list(SEGMENT))
            .unwrap_or_default()
    };
    union(&mut economics.budget_allocation, list("Budget_Allocation"));
    union(&mut economics.intelligent_escalation, list("Intelligent_Escalation"));
    union(&mut economics.abort_conditions, list("Abort_Conditions"));
    union(&mut economics.efficiency_patterns, list("Efficiency_Patterns"));
}

fn workflow_steps(node: &ConfigNode) -> Vec<String> {
    match node {
        ConfigNode::Map(_) => {
            let mut steps = node
                .get_loose("Process")
                .map(workflow_steps)
                .unwrap_or_default();
            if steps.is_empty() {
                steps = node
                    .get_loose("Trigger")
                    .map(|value| value.string_list(SEGMENT))
                    .unwrap_or_default();
            }
            steps
        }
        other => other.string_list(&["→", "->", " | "]),
    }
}

fn workflow_server(workflow: &str) -> Option<&'static str> {
    let lower = workflow.to_lowercase();
    WORKFLOW_SERVERS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|keyword| lower.contains(keyword)))
        .map(|(_, server)| *server)
}

fn extract_workflows(section: &ConfigNode, catalog: &mut ServerCatalog) {
    let Some(workflows) = section.as_map() else {
        return;
    };
    for (name, definition) in workflows.iter() {
        let Some(server) = workflow_server(name) else {
            debug!(workflow = name, "workflow does not name a known server");
            continue;
        };
        let steps = workflow_steps(definition);
        if steps.is_empty() {
            continue;
        }
        let mut fragment = ServerSpec {
            name: server.to_string(),
            ..ServerSpec::default()
        };
        fragment.workflows.insert(
            name.to_string(),
            ServerWorkflow {
                name: name.to_string(),
                steps,
            },
        );
        merge_server(catalog, fragment);
    }
}

fn extract_quality_control(section: &ConfigNode, catalog: &mut ServerCatalog) {
    let Some(entries) = section.as_map() else {
        return;
    };
    for (name, checks) in entries.iter() {
        let Some(checks) = checks.as_map() else {
            continue;
        };
        let server = canonical_server_name(name.trim_end_matches("_Validation"));
        let checks: BTreeMap<String, String> = checks
            .iter()
            .filter_map(|(key, value)| value.joined_text(" | ").map(|text| (key.to_string(), text)))
            .collect();
        let entry = catalog
            .quality_checks
            .entry(server.clone())
            .or_insert_with(|| QualityCheck {
                server,
                checks: BTreeMap::new(),
            });
        for (key, value) in checks {
            entry.checks.entry(key).or_insert(value);
        }
    }
}

fn extract_context_triggers(section: &ConfigNode, catalog: &mut ServerCatalog) {
    let Some(entries) = section.as_map() else {
        return;
    };
    for (name, definition) in entries.iter() {
        let (pattern, action) = match definition {
            ConfigNode::Map(_) => (
                first_text(definition, &["Triggers", "Keywords", "Pattern"])
                    .unwrap_or_else(|| name.to_string()),
                text(definition, "Action").unwrap_or_default(),
            ),
            other => (name.to_string(), other.scalar_text().unwrap_or_default()),
        };
        if action.is_empty() {
            continue;
        }
        catalog
            .context_triggers
            .entry(name.to_string())
            .or_insert_with(|| ContextTrigger {
                pattern,
                required: action.contains("REQUIRED"),
                action,
            });
    }
}

fn union(target: &mut Vec<String>, items: Vec<String>) {
    for item in items {
        if !target.contains(&item) {
            target.push(item);
        }
    }
}

/// Folds `fragment` into the catalog without blanking populated fields.
pub(crate) fn merge_server(catalog: &mut ServerCatalog, fragment: ServerSpec) {
    let server = catalog
        .servers
        .entry(fragment.name.clone())
        .or_insert_with(|| ServerSpec {
            name: fragment.name.clone(),
            ..ServerSpec::default()
        });

    if server.purpose.is_empty() {
        server.purpose = fragment.purpose;
    }
    union(&mut server.capabilities, fragment.capabilities);
    union(&mut server.best_for, fragment.best_for);
    if server.token_cost.is_none() {
        server.token_cost = fragment.token_cost;
    }
    if server.success_rate.is_none() {
        server.success_rate = fragment.success_rate;
    }
    if server.fallback.is_none() {
        server.fallback = fragment.fallback;
    }
    for (command, default) in fragment.command_defaults {
        server.command_defaults.entry(command).or_insert(default);
    }
    for (name, workflow) in fragment.workflows {
        server.workflows.entry(name).or_insert(workflow);
    }
}
