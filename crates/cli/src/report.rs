//! Printing run reports and detection results.

use std::fmt::Write as _;

use color_eyre::eyre::Result;
use colored::Colorize;
use sc_protocol::{DetectionResult, FeatureKind, FileAction, PipelineIssue, RunReport};
use serde::Serialize;

use crate::commands::OutputFormat;

fn print_structured<T: Serialize>(value: &T, format: OutputFormat) -> Result<bool> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
        OutputFormat::Text => return Ok(false),
    }
    Ok(true)
}

fn issue_lines(out: &mut String, title: &str, issues: &[PipelineIssue]) {
    if issues.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{} ({})", title.bold(), issues.len());
    for issue in issues {
        let _ = writeln!(out, "  {issue}");
    }
}

pub(crate) fn print_run(report: &RunReport, format: OutputFormat) -> Result<()> {
    if print_structured(report, format)? {
        return Ok(());
    }
    print!("{}", render_run(report));
    Ok(())
}

pub(crate) fn render_run(report: &RunReport) -> String {
    let generation = &report.generation;
    let mut out = String::new();

    let mode = if generation.dry_run { " (dry run)" } else { "" };
    let _ = writeln!(out, "{}{mode}", "SuperCode conversion".green().bold());
    let _ = writeln!(out, "Output: {}", generation.output_root);
    if report.cancelled {
        let _ = writeln!(out, "{}", "Run was cancelled; results are partial".yellow());
    }

    let _ = writeln!(
        out,
        "\n{:<12} {:>8} {:>11} {:>7} {:>7} {:>9} {:>9} {:>6}",
        "category", "detected", "transformed", "written", "skipped", "backed-up", "conflicts", "failed"
    );
    for (category, counts) in &generation.categories {
        let _ = writeln!(
            out,
            "{:<12} {:>8} {:>11} {:>7} {:>7} {:>9} {:>9} {:>6}",
            category,
            counts.detected,
            counts.transformed,
            counts.written,
            counts.skipped,
            counts.backed_up,
            counts.conflicts,
            counts.failed
        );
    }

    let conflicts: Vec<&str> = generation.conflicts().map(|f| f.path.as_str()).collect();
    if !conflicts.is_empty() {
        let _ = writeln!(
            out,
            "\n{} ({}), rerun with --force to overwrite:",
            "Conflicts".yellow().bold(),
            conflicts.len()
        );
        for path in conflicts {
            let _ = writeln!(out, "  {path}");
        }
    }
    for file in &generation.files {
        if let FileAction::Overwrite { backup: Some(backup) } = &file.action {
            let _ = writeln!(out, "  backed up {} to {backup}", file.path);
        }
    }

    issue_lines(&mut out, "Errors", &generation.errors);
    issue_lines(&mut out, "Warnings", &generation.warnings);
    out
}

pub(crate) fn print_detection(detection: &DetectionResult, kinds: &[FeatureKind], format: OutputFormat) -> Result<()> {
    if print_structured(detection, format)? {
        return Ok(());
    }
    print!("{}", render_detection(detection, kinds));
    Ok(())
}

pub(crate) fn render_detection(detection: &DetectionResult, kinds: &[FeatureKind]) -> String {
    let mut out = String::new();
    for kind in kinds {
        let names: Vec<String> = match kind {
            FeatureKind::Personas => detection.personas.iter().map(|p| p.name.clone()).collect(),
            FeatureKind::Commands => detection
                .commands
                .iter()
                .map(|c| format!("{} [{}]", c.name, c.category))
                .collect(),
            FeatureKind::Servers => detection.servers.servers.keys().cloned().collect(),
            FeatureKind::Compression => detection
                .compression
                .iter()
                .map(|spec| format!("{} ({:.0}% target)", spec.source, spec.target_ratio * 100.0))
                .collect(),
        };
        let _ = writeln!(out, "{} {}", format!("{kind}:").bold(), detection.count(*kind));
        for name in names {
            let _ = writeln!(out, "  {name}");
        }
    }
    if detection.cancelled {
        let _ = writeln!(out, "{}", "Detection was cancelled; results are partial".yellow());
    }
    issue_lines(&mut out, "Errors", &detection.errors);
    issue_lines(&mut out, "Warnings", &detection.warnings);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sc_protocol::Command;

    #[test]
    fn test_detection_text_lists_features() {
        colored::control::set_override(false);
        let detection = DetectionResult {
            commands: vec![Command {
                name: "fix".to_string(),
                purpose: "Fix bugs".to_string(),
                category: "Debugging".to_string(),
                category_inferred: true,
                flags: Vec::new(),
                examples: Vec::new(),
                body: String::new(),
                source: ".claude/commands/fix.md".to_string(),
            }],
            ..DetectionResult::default()
        };

        let text = render_detection(&detection, &[FeatureKind::Personas, FeatureKind::Commands]);

        assert_eq!(text, "personas: 0\ncommands: 1\n  fix [Debugging]\n");
    }
}
