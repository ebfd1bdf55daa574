//! Compression rule set to processor descriptors.

use sc_protocol::{CompressionSpec, FeatureKind};
use serde_json::json;

use super::{descriptor, json_descriptor, literal, number, pretty, template, Emitter};

const KIND: FeatureKind = FeatureKind::Compression;

pub(crate) fn transform(spec: &CompressionSpec, out: &mut Emitter<'_>) {
    out.emit(
        Some(KIND),
        descriptor(
            "compression/rules.ts".to_string(),
            template::COMPRESSION_RULES,
            Some(KIND),
            [
                ("source", spec.source.clone()),
                ("symbols_literal", pretty(&json!(spec.symbols))),
                ("abbreviations_literal", pretty(&json!(spec.abbreviations))),
                ("word_removal_literal", pretty(&json!(spec.word_removal))),
                ("triggers_literal", pretty(&json!(spec.triggers))),
                ("flags_literal", pretty(&json!(spec.flags))),
                ("target_ratio", number(spec.target_ratio)),
                ("target_percent", format!("{:.0}", spec.target_ratio * 100.0)),
                ("source_literal", literal(&spec.source)),
            ],
        ),
    );
    out.emit(
        Some(KIND),
        json_descriptor(
            "config/compression.json".to_string(),
            Some(KIND),
            &json!({
                "enabled": true,
                "flags": spec.flags,
                "triggers": spec.triggers,
                "targetRatio": spec.target_ratio,
                "symbolCount": spec.symbols.len(),
                "abbreviationCount": spec.abbreviations.len(),
                "source": spec.source,
            }),
        ),
    );
}
