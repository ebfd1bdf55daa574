//! Compression rule detection.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use sc_protocol::{CompressionSpec, FeatureKind, PipelineIssue};
use tracing::{debug, info, instrument, warn};

use super::{
    cancelled_issue, document_issues, parse_issue, DetectResult, DetectionContext, DetectionError,
    Detector, DetectorOutput, Features,
};
use crate::cache::SharedCache;
use crate::parser::ConfigNode;

pub const COMPRESSION_SOURCES: [&str; 4] = [
    ".claude/commands/shared/compression-performance-patterns.yml",
    ".claude/shared/superclaude-core.yml",
    ".claude/CLAUDE.md",
    "commands/shared/compression-performance-patterns.yml",
];

/// Section name keywords. The specific ones are tried before the generic
/// ones so that a `Token_Economics` section does not shadow the rule set.
const SPECIFIC_KEYWORDS: [&str; 4] = ["compression", "ultracompressed", "ultra_compressed", "uc_mode"];
const GENERIC_KEYWORDS: [&str; 2] = ["token", "reduction"];

pub const DEFAULT_FLAGS: [&str; 2] = ["--uc", "--ultracompressed"];
pub const DEFAULT_TARGET_RATIO: f64 = 0.7;

const RATIO_PATTERN: &str = r"(\d+(?:\.\d+)?)\s*(%)?";

pub struct CompressionDetector;

#[async_trait]
impl Detector for CompressionDetector {
    fn kind(&self) -> FeatureKind {
        FeatureKind::Compression
    }

    #[instrument(skip_all, fields(root = %ctx.repo_root.display()))]
    async fn detect(&self, ctx: &DetectionContext) -> DetectorOutput {
        let mut issues: Vec<PipelineIssue> = Vec::new();
        let mut spec = None;
        let mut cancelled = false;

        for relative in COMPRESSION_SOURCES {
            if ctx.is_cancelled() {
                cancelled = true;
                issues.push(cancelled_issue(FeatureKind::Compression));
                break;
            }
            let path = ctx.repo_root.join(relative);
            if !path.is_file() {
                debug!(path = %path.display(), "compression source absent");
                continue;
            }
            let document = match ctx.cache.get_parsed(&path).await {
                Ok(document) => document,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "compression source unusable");
                    issues.push(parse_issue(&err, FeatureKind::Compression));
                    continue;
                }
            };
            issues.extend(document_issues(&document, FeatureKind::Compression));
            let Some((section, rules)) = compression_section(&document.root) else {
                debug!(path = %path.display(), "no compression section");
                continue;
            };

            debug!(section, "compression section found");
            match extract_spec(rules, &path, &ctx.display_path(&path), &ctx.cache) {
                Ok(found) => spec = Some(found),
                Err(err) => {
                    warn!(error = %err, "compression rules rejected");
                    issues.push(err.to_issue(FeatureKind::Compression));
                }
            }
            break;
        }

        info!(found = spec.is_some(), "compression detection finished");
        DetectorOutput {
            features: Features::Compression(spec),
            issues,
            cancelled,
        }
    }
}

/// The first top-level or header-section key naming a compression section.
fn compression_section(root: &ConfigNode) -> Option<(&str, &ConfigNode)> {
    let map = root.as_map()?;
    let entries: Vec<(&str, &ConfigNode)> = map
        .iter()
        .chain(
            map.iter()
                .filter_map(|(_, value)| value.as_map())
                .flat_map(|section| section.iter()),
        )
        .filter(|(_, value)| value.as_map().is_some())
        .collect();

    [&SPECIFIC_KEYWORDS[..], &GENERIC_KEYWORDS[..]]
        .iter()
        .find_map(|keywords| {
            entries.iter().copied().find(|(key, _)| {
                let lower = key.to_lowercase();
                keywords.iter().any(|keyword| lower.contains(keyword))
            })
        })
}

fn normalize_key(key: &str) -> String {
    key.to_lowercase().replace(['-', ' '], "_")
}

/// Depth-first lookup of the first key matching any of `names`, in the
/// order the names are given.
fn find_rule<'a>(rules: &'a ConfigNode, names: &[&str]) -> Option<&'a ConfigNode> {
    names.iter().find_map(|name| {
        rules
            .find_key_where(&|key: &str| normalize_key(key) == *name)
            .map(|(_, value)| value)
    })
}

fn dictionary(node: Option<&ConfigNode>) -> BTreeMap<String, String> {
    node.and_then(ConfigNode::as_map)
        .map(|map| {
            map.iter()
                .filter_map(|(key, value)| value.scalar_text().map(|text| (key.to_string(), text)))
                .collect()
        })
        .unwrap_or_default()
}

fn list(node: Option<&ConfigNode>) -> Vec<String> {
    match node {
        Some(ConfigNode::Map(map)) => map
            .iter()
            .flat_map(|(_, value)| value.string_list(&[" | ", ","]))
            .collect(),
        Some(other) => other.string_list(&[" | ", ","]),
        None => Vec::new(),
    }
}

/// Parses `0.7`, `70%` or `~70% reduction` into a ratio.
fn parse_ratio(node: &ConfigNode, cache: &SharedCache) -> DetectResult<Option<f64>> {
    if let ConfigNode::Integer(_) | ConfigNode::Float(_) = node {
        return Ok(node.as_f64());
    }
    let Some(text) = node.scalar_text() else {
        return Ok(None);
    };
    let pattern = cache.get_pattern(RATIO_PATTERN)?;
    Ok(pattern.captures(&text).and_then(|caps| {
        let value: f64 = caps[1].parse().ok()?;
        Some(if caps.get(2).is_some() { value / 100.0 } else { value })
    }))
}

pub(crate) fn extract_spec(
    rules: &ConfigNode,
    path: &Path,
    source: &str,
    cache: &SharedCache,
) -> DetectResult<CompressionSpec> {
    let invalid = |reason: String| DetectionError::Validation {
        feature: FeatureKind::Compression,
        path: path.to_path_buf(),
        reason,
    };

    let target_ratio = match find_rule(
        rules,
        &["target_ratio", "target_reduction", "performance_target", "reduction"],
    ) {
        Some(node) => parse_ratio(node, cache)?
            .ok_or_else(|| invalid("target ratio is not a number".to_string()))?,
        None => DEFAULT_TARGET_RATIO,
    };
    if !(0.0..=1.0).contains(&target_ratio) {
        return Err(invalid(format!("target ratio {target_ratio} is outside [0, 1]")));
    }

    let symbols = dictionary(find_rule(rules, &["symbols"]));
    let abbreviations = dictionary(find_rule(rules, &["abbreviations"]));
    if symbols.is_empty() {
        return Err(invalid("symbol dictionary is empty".to_string()));
    }
    if abbreviations.is_empty() {
        return Err(invalid("abbreviation dictionary is empty".to_string()));
    }

    let mut flags = list(find_rule(rules, &["flags"]));
    if flags.is_empty() {
        flags = DEFAULT_FLAGS.iter().map(|flag| flag.to_string()).collect();
    }

    Ok(CompressionSpec {
        symbols,
        abbreviations,
        triggers: list(find_rule(rules, &["natural_language", "triggers", "activation"])),
        flags,
        word_removal: list(find_rule(rules, &["word_removal", "remove_words"])),
        target_ratio,
        source: source.to_string(),
    })
}
