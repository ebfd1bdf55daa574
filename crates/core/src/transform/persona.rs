//! Persona to agent descriptors.

use sc_protocol::{FeatureKind, Persona};
use serde_json::{json, Value};

use super::{
    descriptor, file_stem, json_descriptor, literal, literal_list, number, one_line, pascal_case,
    template, Emitter,
};

const KIND: FeatureKind = FeatureKind::Personas;

pub(crate) fn transform(personas: &[Persona], out: &mut Emitter<'_>) {
    let mut imports = Vec::new();
    let mut entries = Vec::new();
    let mut configs = Vec::new();

    for persona in personas {
        let model = out.model(KIND, &persona.source, &persona.name, &persona.model);
        let tools = out.tools(KIND, &persona.source, &persona.name, &persona.tools);
        let stem = file_stem(&persona.name);
        let ident = format!("{}Agent", pascal_case(&persona.name));

        let planned = out.emit_module(
            KIND,
            &ident,
            descriptor(
                format!("agents/{stem}.ts"),
                template::AGENT,
                Some(KIND),
                [
                    ("name", one_line(&persona.name)),
                    ("ident", ident.clone()),
                    ("source", persona.source.clone()),
                    ("name_literal", literal(&persona.name)),
                    ("description_literal", literal(&persona.description)),
                    ("system_prompt_literal", literal(&persona.system_prompt)),
                    ("model_literal", literal(&model)),
                    ("temperature", number(persona.temperature)),
                    ("tools_literal", literal_list(&tools)),
                    ("auto_activate_literal", literal_list(&persona.auto_activate)),
                ],
            ),
        );
        if !planned {
            out.skip(KIND, &persona.name);
            continue;
        }

        imports.push(format!("import {{ {ident} }} from \"./{stem}\";"));
        entries.push(format!("  {}: {ident},", literal(&persona.name)));
        configs.push(json!({
            "name": persona.name,
            "description": persona.description,
            "model": model,
            "temperature": persona.temperature,
            "tools": tools,
            "enabled": true,
        }));
    }

    if configs.is_empty() {
        return;
    }

    out.emit(
        Some(KIND),
        descriptor(
            "agents/index.ts".to_string(),
            template::AGENTS_INDEX,
            Some(KIND),
            [("imports", imports.join("\n")), ("entries", entries.join("\n"))],
        ),
    );
    out.emit(
        Some(KIND),
        json_descriptor(
            "config/agents.json".to_string(),
            Some(KIND),
            &json!({
                "$schema": "https://opencode.ai/config.json",
                "agents": Value::Array(configs),
            }),
        ),
    );
}
