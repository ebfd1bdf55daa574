//! The run summary document.

use sc_protocol::{ArtifactDescriptor, DetectionResult, FeatureKind, WritePolicy};

use super::{descriptor, one_line, template, Emitter, SUMMARY_PATH};

fn section(title: &str, lines: Vec<String>) -> String {
    let body = if lines.is_empty() {
        "_None detected._".to_string()
    } else {
        lines.join("\n")
    };
    format!("### {title}\n\n{body}\n")
}

fn feature_sections(detection: &DetectionResult, kinds: &[FeatureKind]) -> String {
    let mut sections = Vec::new();
    for kind in FeatureKind::ALL.into_iter().filter(|kind| kinds.contains(kind)) {
        let count = detection.count(kind);
        sections.push(match kind {
            FeatureKind::Personas => section(
                &format!("Personas ({count})"),
                detection
                    .personas
                    .iter()
                    .map(|p| format!("- **{}**: {}", p.name, one_line(&p.description)))
                    .collect(),
            ),
            FeatureKind::Commands => section(
                &format!("Commands ({count})"),
                detection
                    .commands
                    .iter()
                    .map(|c| format!("- **/{}** ({}): {}", c.name, c.category, one_line(&c.purpose)))
                    .collect(),
            ),
            FeatureKind::Servers => section(
                &format!("MCP Servers ({count})"),
                detection
                    .servers
                    .servers
                    .values()
                    .map(|s| format!("- **{}**: {}", s.name, one_line(&s.purpose)))
                    .collect(),
            ),
            FeatureKind::Compression => section(
                "Compression",
                detection
                    .compression
                    .iter()
                    .flat_map(|spec| {
                        [
                            format!("- **Flags**: {}", spec.flags.join(", ")),
                            format!("- **Target**: {:.0}% token reduction", spec.target_ratio * 100.0),
                            format!("- **Triggers**: {}", spec.triggers.join(", ")),
                            format!(
                                "- **Rules**: {} symbols, {} abbreviations",
                                spec.symbols.len(),
                                spec.abbreviations.len()
                            ),
                        ]
                    })
                    .collect(),
            ),
        });
    }
    sections.join("\n")
}

fn artifact_table(out: &Emitter<'_>) -> String {
    let mut rows = vec!["| Category | Features | Artifacts |".to_string(), "|---|---|---|".to_string()];
    for (kind, counts) in &out.metadata.categories {
        rows.push(format!("| {kind} | {} | {} |", counts.features, counts.artifacts));
    }
    rows.join("\n")
}

pub(crate) fn artifact(detection: &DetectionResult, kinds: &[FeatureKind], out: &Emitter<'_>) -> ArtifactDescriptor {
    let mut summary = descriptor(
        SUMMARY_PATH.to_string(),
        template::SUMMARY,
        None,
        [
            ("features", feature_sections(detection, kinds)),
            ("artifacts", artifact_table(out)),
            ("issue_count", (detection.errors.len() + detection.warnings.len()).to_string()),
            ("mapping_warnings", out.metadata.warnings.len().to_string()),
        ],
    );
    summary.policy = WritePolicy::Overwrite;
    summary
}
