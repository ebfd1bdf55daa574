//! Hybrid YAML/Markdown configuration parser.
//!
//! Source repositories describe configuration in three physical encodings:
//! plain YAML, YAML placed under `##` Markdown headers, and YAML inside
//! fenced code blocks surrounded by prose. This module sniffs the encoding,
//! normalizes every variant into one [`ConfigNode`] tree, merges duplicate
//! top-level keys (last occurrence wins, recorded as a warning) and expands
//! `@include` directives.
//!
//! ## Encoding sniff
//!
//! 1. Header sections whose bodies (or their fenced blocks) parse as a YAML
//!    mapping make the document *markdown-hybrid*; each section becomes an
//!    independent sub-document keyed by its header text.
//! 2. Otherwise the whole text is parsed as YAML (*plain-yaml*).
//! 3. If that fails, fenced blocks are parsed and merged (*fenced-yaml*).
//!
//! Malformed-but-tolerated input is recorded, never raised: only a document
//! with no usable YAML at all is a [`ParseError`].

pub mod error;
mod include;
mod markdown;
pub mod node;
mod yaml;

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use sc_protocol::{IssueKind, PipelineIssue, Stage};
use serde::Serialize;

pub use error::IncludeError;
pub use error::ParseError;
pub use error::ParseResult;
pub use include::HybridParser;
pub use node::ConfigMap;
pub use node::ConfigNode;

use markdown::{fenced_yaml_blocks, header_name, split_sections};
use yaml::{merge_bodies, parse_body, BodyParse};

/// Physical encoding of a configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentEncoding {
    PlainYaml,
    MarkdownHybrid,
    FencedYaml,
}

/// A fully parsed logical document.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub path: PathBuf,
    pub encoding: DocumentEncoding,
    /// Include directives fully expanded.
    pub root: ConfigNode,
    /// Duplicate-key notes.
    pub warnings: Vec<PipelineIssue>,
    /// Tolerated parse failures and include failures.
    pub errors: Vec<PipelineIssue>,
    /// The document itself followed by every included document, with the
    /// modification time each had when it was read.
    pub sources: Vec<(PathBuf, SystemTime)>,
}

impl ParsedDocument {
    /// All recorded issues, warnings first.
    pub fn issues(&self) -> impl Iterator<Item = &PipelineIssue> {
        self.warnings.iter().chain(self.errors.iter())
    }
}

/// Cheap structural guess used when a file is first read.
pub fn sniff_encoding(text: &str) -> DocumentEncoding {
    if text.lines().any(|line| header_name(line).is_some()) {
        DocumentEncoding::MarkdownHybrid
    } else if !fenced_yaml_blocks(text, 0).is_empty() {
        DocumentEncoding::FencedYaml
    } else {
        DocumentEncoding::PlainYaml
    }
}

/// Result of parsing one text without include expansion.
#[derive(Debug)]
pub(crate) struct TextParse {
    pub root: ConfigNode,
    pub encoding: DocumentEncoding,
    pub warnings: Vec<PipelineIssue>,
    pub errors: Vec<PipelineIssue>,
}

/// Parses `text` into a tree, trying the encodings in sniff order.
pub(crate) fn parse_text(text: &str, path: &Path) -> ParseResult<TextParse> {
    if let Some(hybrid) = parse_hybrid(text, path) {
        return Ok(hybrid);
    }

    let plain = parse_body(text, 0);
    if plain.failures.is_empty() && plain.has_content() {
        return Ok(finish(plain, DocumentEncoding::PlainYaml, path));
    }

    let blocks = fenced_yaml_blocks(text, 0);
    if !blocks.is_empty() {
        let fenced = merge_bodies(
            blocks
                .iter()
                .map(|block| parse_body(&block.content, block.offset))
                .collect(),
        );
        if fenced.has_content() {
            return Ok(finish(fenced, DocumentEncoding::FencedYaml, path));
        }
    }

    if plain.has_content() {
        return Ok(finish(plain, DocumentEncoding::PlainYaml, path));
    }

    let first = plain.failures.into_iter().next();
    Err(ParseError::NoYaml {
        path: path.to_path_buf(),
        line: first.as_ref().and_then(|failure| failure.line),
        reason: first.map_or_else(|| "document holds no YAML mapping".to_string(), |f| f.reason),
    })
}

fn parse_hybrid(text: &str, path: &Path) -> Option<TextParse> {
    let (preamble, sections) = split_sections(text);
    if sections.is_empty() {
        return None;
    }

    let mut root = ConfigMap::new();
    let mut warnings = Vec::new();
    let mut errors = Vec::new();
    let mut found = false;

    let preamble = parse_body(&preamble, 0);
    if preamble.keyed {
        errors.extend(failure_issues(&preamble, path));
        warnings.extend(duplicate_issues(&preamble, path));
        if let Some(ConfigNode::Map(map)) = preamble.node {
            found |= !map.is_empty();
            for (key, value) in map {
                root.push_raw(key, value);
            }
        }
    }

    for section in sections {
        let blocks = fenced_yaml_blocks(&section.body, section.body_offset);
        let fenced = !blocks.is_empty();
        let body = if fenced {
            merge_bodies(
                blocks
                    .iter()
                    .map(|block| parse_body(&block.content, block.offset))
                    .collect(),
            )
        } else {
            parse_body(&section.body, section.body_offset)
        };

        if body.keyed || fenced {
            errors.extend(failure_issues(&body, path));
        }
        if !body.has_content() {
            continue;
        }
        warnings.extend(duplicate_issues(&body, path));
        found = true;
        let node = unwrap_named(body.node.unwrap_or_default(), &section.name);
        if root.insert(section.name.clone(), node).is_some() {
            warnings.push(duplicate_issue(&section.name, section.header_line, path));
        }
    }

    found.then(|| TextParse {
        root: ConfigNode::Map(root),
        encoding: DocumentEncoding::MarkdownHybrid,
        warnings,
        errors,
    })
}

/// `## Servers` followed by `Servers: {..}` holds the inner value once.
fn unwrap_named(node: ConfigNode, name: &str) -> ConfigNode {
    match node {
        ConfigNode::Map(map) if map.len() == 1 && map.get(name).is_some() => {
            map.into_iter().next().map(|(_, value)| value).unwrap_or_default()
        }
        other => other,
    }
}

fn finish(body: BodyParse, encoding: DocumentEncoding, path: &Path) -> TextParse {
    TextParse {
        warnings: duplicate_issues(&body, path),
        errors: failure_issues(&body, path),
        root: body.node.unwrap_or_default(),
        encoding,
    }
}

fn duplicate_issues(body: &BodyParse, path: &Path) -> Vec<PipelineIssue> {
    body.duplicates
        .iter()
        .map(|duplicate| duplicate_issue(&duplicate.key, duplicate.line, path))
        .collect()
}

fn duplicate_issue(key: &str, line: usize, path: &Path) -> PipelineIssue {
    PipelineIssue::new(
        IssueKind::DuplicateKey,
        Stage::Parse,
        format!("duplicate key `{key}`; the later value wins"),
    )
    .with_path(path.display().to_string())
    .with_line((line > 0).then_some(line))
}

fn failure_issues(body: &BodyParse, path: &Path) -> Vec<PipelineIssue> {
    body.failures
        .iter()
        .map(|failure| {
            PipelineIssue::new(IssueKind::Parse, Stage::Parse, failure.reason.clone())
                .with_path(path.display().to_string())
                .with_line(failure.line)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> TextParse {
        parse_text(text, Path::new("doc.yml")).expect("Failed to parse")
    }

    #[test]
    fn test_duplicate_top_level_key_records_one_warning() {
        let parsed = parse("name: a\nname: b\n");

        assert_eq!(parsed.encoding, DocumentEncoding::PlainYaml);
        assert_eq!(parsed.root.get("name").and_then(ConfigNode::as_str), Some("b"));
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].kind, IssueKind::DuplicateKey);
        assert_eq!(parsed.warnings[0].line, Some(2));
        assert!(parsed.errors.is_empty());
    }

    #[test]
    fn test_header_sections_become_sub_documents() {
        let text = "# SuperClaude Personas\n\n## All_Personas\narchitect:\n  Identity: Systems architect\n\n## Notes\nJust prose here.\n";
        let parsed = parse(text);

        assert_eq!(parsed.encoding, DocumentEncoding::MarkdownHybrid);
        let personas = parsed.root.find_section("All_Personas").expect("Missing section");
        assert_eq!(
            personas
                .get("architect")
                .and_then(|p| p.get("Identity"))
                .and_then(ConfigNode::as_str),
            Some("Systems architect")
        );
        assert!(parsed.root.get("Notes").is_none());
    }

    #[test]
    fn test_section_with_fenced_block() {
        let text = "## Servers\nSome prose.\n```yaml\nServers:\n  Context7:\n    Purpose: docs\n```\n";
        let parsed = parse(text);

        assert_eq!(parsed.encoding, DocumentEncoding::MarkdownHybrid);
        let servers = parsed.root.find_section("Servers").expect("Missing Servers");
        assert!(servers.get("Context7").is_some());
    }

    #[test]
    fn test_fenced_blocks_in_prose() {
        let text = "Execution patterns for servers.\nMore prose: with a colon.\n```yaml\nServers:\n  Magic:\n    Purpose: ui\n```\nClosing prose.\n```yaml\nCommand_Integration:\n  build: Magic for UI\n```\n";
        let parsed = parse(text);

        assert_eq!(parsed.encoding, DocumentEncoding::FencedYaml);
        assert!(parsed.root.get("Servers").is_some());
        assert!(parsed.root.get("Command_Integration").is_some());
    }

    #[test]
    fn test_duplicate_section_names_last_wins() {
        let parsed = parse("## Config\na: 1\n## Config\na: 2\n");

        assert_eq!(
            parsed.root.get("Config").and_then(|c| c.get("a")).and_then(ConfigNode::as_i64),
            Some(2)
        );
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].line, Some(3));
    }

    #[test]
    fn test_partial_plain_yaml_keeps_good_keys() {
        let parsed = parse("good: 1\nbad: {unclosed\n");

        assert_eq!(parsed.encoding, DocumentEncoding::PlainYaml);
        assert_eq!(parsed.root.get("good").and_then(ConfigNode::as_i64), Some(1));
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(parsed.errors[0].kind, IssueKind::Parse);
    }

    #[test]
    fn test_prose_only_document_is_an_error() {
        let result = parse_text("Only prose, no configuration.\n", Path::new("notes.md"));
        assert!(matches!(result, Err(ParseError::NoYaml { .. })));
    }

    #[test]
    fn test_sniff_encoding() {
        assert_eq!(sniff_encoding("a: 1\n"), DocumentEncoding::PlainYaml);
        assert_eq!(sniff_encoding("## Section\na: 1\n"), DocumentEncoding::MarkdownHybrid);
        assert_eq!(sniff_encoding("```yaml\na: 1\n```\n"), DocumentEncoding::FencedYaml);
    }
}
