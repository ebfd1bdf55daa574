//! Protocol-server catalog to server bundles and integration descriptors.
//!
//! Each server yields a definition module, a README that is only created
//! once, and a JSON integration snippet. The catalog as a whole yields the
//! combined server configuration and the command integration helper.

use std::collections::BTreeMap;

use sc_protocol::{FeatureKind, ServerCatalog, ServerSpec, WritePolicy};
use serde_json::{json, Map, Value};

use super::{descriptor, file_stem, json_descriptor, literal, one_line, pretty, template, Emitter};

const KIND: FeatureKind = FeatureKind::Servers;

fn launch_command(id: &str) -> Value {
    json!(["node", format!("./mcp-servers/{id}/dist/index.js")])
}

fn tool_definitions(spec: &ServerSpec) -> Value {
    Value::Array(
        spec.capabilities
            .iter()
            .map(|capability| {
                json!({
                    "name": file_stem(capability),
                    "description": capability,
                    "inputSchema": { "type": "object", "properties": {} },
                })
            })
            .collect(),
    )
}

fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return "- _None listed_".to_string();
    }
    items
        .iter()
        .map(|item| format!("- {}", one_line(item)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn overview(spec: &ServerSpec) -> String {
    let rows = [
        ("Token Cost", &spec.token_cost),
        ("Success Rate", &spec.success_rate),
        ("Fallback", &spec.fallback),
    ];
    let lines: Vec<String> = rows
        .iter()
        .filter_map(|(label, value)| value.as_ref().map(|value| format!("- **{label}**: {}", one_line(value))))
        .collect();
    if lines.is_empty() {
        "- _No operating notes_".to_string()
    } else {
        lines.join("\n")
    }
}

fn workflow_section(spec: &ServerSpec) -> String {
    spec.workflows
        .values()
        .map(|workflow| {
            let steps: Vec<String> = workflow
                .steps
                .iter()
                .enumerate()
                .map(|(index, step)| format!("{}. {}", index + 1, one_line(step)))
                .collect();
            format!("### {}\n\n{}\n", workflow.name, steps.join("\n"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn command_section(spec: &ServerSpec) -> String {
    spec.command_defaults
        .iter()
        .map(|(command, default)| match &default.flag {
            Some(flag) => format!("- `/{command}` ({flag}): {}", one_line(&default.note)),
            None => format!("- `/{command}`: {}", one_line(&default.note)),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn optional_section(title: &str, body: String) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!("\n## {title}\n\n{body}\n")
    }
}

fn server_bundle(name: &str, spec: &ServerSpec, out: &mut Emitter<'_>) -> Option<(String, Value)> {
    let id = file_stem(name);
    let purpose = if spec.purpose.is_empty() {
        format!("{name} protocol server")
    } else {
        spec.purpose.clone()
    };

    let planned = out.emit(
        Some(KIND),
        descriptor(
            format!("mcp-servers/{id}/index.ts"),
            template::MCP_SERVER,
            Some(KIND),
            [
                ("name", one_line(name)),
                ("purpose", one_line(&purpose)),
                ("id_literal", literal(&id)),
                ("tools_literal", pretty(&tool_definitions(spec))),
            ],
        ),
    );
    if !planned {
        out.skip(KIND, name);
        return None;
    }

    let mut readme = descriptor(
        format!("mcp-servers/{id}/README.md"),
        template::MCP_README,
        Some(KIND),
        [
            ("name", one_line(name)),
            ("id", id.clone()),
            ("purpose", one_line(&purpose)),
            ("overview", overview(spec)),
            ("best_for", bullet_list(&spec.best_for)),
            ("capabilities", bullet_list(&spec.capabilities)),
            ("workflows", optional_section("Workflows", workflow_section(spec))),
            ("commands", optional_section("Command Defaults", command_section(spec))),
        ],
    );
    readme.policy = WritePolicy::Create;
    out.emit(Some(KIND), readme);

    let commands: Map<String, Value> = spec
        .command_defaults
        .iter()
        .map(|(command, default)| (command.clone(), json!({ "flag": default.flag, "note": default.note })))
        .collect();
    let mut snippet = json!({
        "name": id,
        "type": "local",
        "command": launch_command(&id),
        "enabled": true,
        "description": purpose,
        "capabilities": spec.capabilities,
        "commands": commands,
    });
    if let (Some(fallback), Value::Object(map)) = (&spec.fallback, &mut snippet) {
        map.insert("fallback".to_string(), json!(fallback));
    }
    out.emit(
        Some(KIND),
        json_descriptor(format!("config/mcp/{id}.json"), Some(KIND), &snippet),
    );

    Some((
        id.clone(),
        json!({ "type": "local", "command": launch_command(&id), "enabled": true }),
    ))
}

pub(crate) fn transform(catalog: &ServerCatalog, out: &mut Emitter<'_>) {
    if catalog.is_empty() {
        return;
    }

    let mut servers = Map::new();
    let mut command_servers: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut command_flags: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for (name, spec) in &catalog.servers {
        let Some((id, entry)) = server_bundle(name, spec, out) else {
            continue;
        };
        for (command, default) in &spec.command_defaults {
            command_servers.entry(command.clone()).or_default().push(id.clone());
            if let Some(flag) = &default.flag {
                let flags = command_flags.entry(command.clone()).or_default();
                if !flags.contains(flag) {
                    flags.push(flag.clone());
                }
            }
        }
        servers.insert(id, entry);
    }

    let economics = &catalog.token_economics;
    out.emit(
        Some(KIND),
        json_descriptor(
            "config/mcp-config.json".to_string(),
            Some(KIND),
            &json!({
                "$schema": "https://opencode.ai/config.json",
                "mcp": Value::Object(servers),
                "tokenEconomics": {
                    "budgetAllocation": economics.budget_allocation,
                    "intelligentEscalation": economics.intelligent_escalation,
                    "abortConditions": economics.abort_conditions,
                    "efficiencyPatterns": economics.efficiency_patterns,
                },
            }),
        ),
    );

    let triggers: Vec<Value> = catalog
        .context_triggers
        .iter()
        .map(|(name, trigger)| {
            json!({
                "name": name,
                "pattern": trigger.pattern,
                "action": trigger.action,
                "required": trigger.required,
            })
        })
        .collect();
    let quality: Map<String, Value> = catalog
        .quality_checks
        .values()
        .map(|check| (file_stem(&check.server), json!(check.checks)))
        .collect();

    out.emit(
        Some(KIND),
        descriptor(
            "commands/mcp-integrations/command-mcp.ts".to_string(),
            template::COMMAND_MCP,
            Some(KIND),
            [
                ("defaults_literal", pretty(&json!(command_servers))),
                ("flags_literal", pretty(&json!(command_flags))),
                ("triggers_literal", pretty(&Value::Array(triggers))),
                ("quality_literal", pretty(&Value::Object(quality))),
            ],
        ),
    );
}
