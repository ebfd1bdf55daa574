//! Command to command-module descriptors.

use std::collections::BTreeSet;

use sc_protocol::{Command, CommandFlag, FeatureKind};
use serde_json::{json, Map, Value};

use super::{
    descriptor, file_stem, json_descriptor, literal, one_line, pascal_case, pretty, template,
    Emitter, FlagType,
};

const KIND: FeatureKind = FeatureKind::Commands;

struct MappedFlag<'f> {
    flag: &'f CommandFlag,
    flag_type: FlagType,
}

impl MappedFlag<'_> {
    /// Property name: the flag without its leading dashes.
    fn key(&self) -> &str {
        self.flag.name.trim_start_matches('-')
    }

    fn default_value(&self) -> Option<Value> {
        let raw = self.flag.default.as_deref()?.trim();
        Some(match self.flag_type {
            FlagType::Boolean => match raw.to_lowercase().as_str() {
                "true" | "yes" | "on" => Value::Bool(true),
                "false" | "no" | "off" => Value::Bool(false),
                _ => Value::String(raw.to_string()),
            },
            FlagType::Number => raw
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(raw.to_string())),
            FlagType::String => Value::String(raw.to_string()),
        })
    }

    fn describe(&self) -> Value {
        let mut entry = Map::new();
        entry.insert("name".to_string(), json!(self.flag.name));
        entry.insert("type".to_string(), json!(self.flag_type.as_str()));
        entry.insert("description".to_string(), json!(self.flag.description));
        if let Some(default) = self.default_value() {
            entry.insert("default".to_string(), default);
        }
        if !self.flag.choices.is_empty() {
            entry.insert("choices".to_string(), json!(self.flag.choices));
        }
        Value::Object(entry)
    }
}

fn map_flags<'f>(command: &'f Command, out: &mut Emitter<'_>) -> Vec<MappedFlag<'f>> {
    command
        .flags
        .iter()
        .map(|flag| {
            let (flag_type, unknown) = out.tables().flag_type(&flag.flag_type);
            if unknown {
                out.warn(
                    Some(KIND),
                    Some(&command.source),
                    format!(
                        "unknown flag type `{}` for `{}` in command `{}`; using string",
                        flag.flag_type, flag.name, command.name
                    ),
                );
            }
            MappedFlag { flag, flag_type }
        })
        .collect()
}

fn flags_interface(flags: &[MappedFlag<'_>]) -> String {
    if flags.is_empty() {
        return "export interface Flags {}".to_string();
    }
    let fields: Vec<String> = flags
        .iter()
        .map(|flag| format!("  {}?: {};", literal(flag.key()), flag.flag_type.as_str()))
        .collect();
    format!("export interface Flags {{\n{}\n}}", fields.join("\n"))
}

pub(crate) fn transform(commands: &[Command], out: &mut Emitter<'_>) {
    let mut imports = Vec::new();
    let mut entries = Vec::new();
    let mut configs = Vec::new();
    let mut categories = BTreeSet::new();

    for command in commands {
        let category = out.category(KIND, &command.source, &command.name, &command.category);
        let flags = map_flags(command, out);
        let stem = file_stem(&command.name);
        let ident = format!("{}Command", pascal_case(&command.name));

        let defaults: Map<String, Value> = flags
            .iter()
            .filter_map(|flag| flag.default_value().map(|value| (flag.key().to_string(), value)))
            .collect();
        let examples: Vec<Value> = command
            .examples
            .iter()
            .map(|example| json!({ "command": example.command, "description": example.description }))
            .collect();

        let planned = out.emit_module(
            KIND,
            &ident,
            descriptor(
                format!("commands/{stem}.ts"),
                template::COMMAND,
                Some(KIND),
                [
                    ("name", one_line(&command.name)),
                    ("ident", ident.clone()),
                    ("source", command.source.clone()),
                    ("flags_interface", flags_interface(&flags)),
                    ("name_literal", literal(&command.name)),
                    ("purpose_literal", literal(&command.purpose)),
                    ("category_literal", literal(&category)),
                    (
                        "flags_literal",
                        pretty(&Value::Array(flags.iter().map(MappedFlag::describe).collect())),
                    ),
                    ("defaults_literal", pretty(&Value::Object(defaults))),
                    ("examples_literal", pretty(&Value::Array(examples))),
                    ("body_literal", literal(&command.body)),
                ],
            ),
        );
        if !planned {
            out.skip(KIND, &command.name);
            continue;
        }

        imports.push(format!("import {{ {ident} }} from \"./{stem}\";"));
        entries.push(format!("  {}: {ident},", literal(&command.name)));
        configs.push(json!({
            "name": command.name,
            "purpose": command.purpose,
            "category": category,
            "enabled": true,
            "flagCount": flags.len(),
        }));
        categories.insert(category);
    }

    if configs.is_empty() {
        return;
    }

    out.emit(
        Some(KIND),
        descriptor(
            "commands/index.ts".to_string(),
            template::COMMANDS_INDEX,
            Some(KIND),
            [("imports", imports.join("\n")), ("entries", entries.join("\n"))],
        ),
    );
    out.emit(
        Some(KIND),
        json_descriptor(
            "config/commands.json".to_string(),
            Some(KIND),
            &json!({
                "$schema": "https://opencode.ai/config.json",
                "commands": Value::Array(configs),
                "categories": categories.into_iter().collect::<Vec<_>>(),
            }),
        ),
    );
}
