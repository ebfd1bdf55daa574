//! Tolerant YAML body parsing.
//!
//! A body is split at column-0 `key:` lines and every chunk is parsed on its
//! own. Chunks are merged in order with the later duplicate winning, and a
//! malformed chunk only loses itself.

use std::collections::HashMap;

use serde_yaml::Value;

use super::node::{ConfigMap, ConfigNode, SPLICE_KEY};

/// A top-level key that appeared more than once.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DuplicateKey {
    pub key: String,
    /// 1-based physical line of the later occurrence.
    pub line: usize,
}

/// A chunk that failed to parse.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct YamlFailure {
    pub line: Option<usize>,
    pub reason: String,
}

#[derive(Debug, Default)]
pub(crate) struct BodyParse {
    pub node: Option<ConfigNode>,
    pub duplicates: Vec<DuplicateKey>,
    pub failures: Vec<YamlFailure>,
    /// Whether the body looked like a keyed YAML mapping.
    pub keyed: bool,
    /// Physical line of the last occurrence of each top-level key.
    pub key_lines: HashMap<String, usize>,
}

impl BodyParse {
    pub fn has_content(&self) -> bool {
        match &self.node {
            Some(ConfigNode::Map(map)) => !map.is_empty(),
            Some(ConfigNode::Sequence(items)) => !items.is_empty(),
            Some(node) => node.include_target().is_some(),
            None => false,
        }
    }
}

/// Parses `text`, whose first line is physical line `line_offset + 1`.
pub(crate) fn parse_body(text: &str, line_offset: usize) -> BodyParse {
    let text = normalize_lines(text);
    let lines: Vec<&str> = text.lines().collect();

    let first_significant = lines.iter().find(|line| is_significant(line));
    let keyed = first_significant.is_some_and(|line| is_key_line(line) || is_splice_line(line));
    if !keyed {
        return parse_whole(&text, line_offset);
    }

    let mut result = BodyParse {
        keyed: true,
        ..BodyParse::default()
    };
    let mut map = ConfigMap::new();

    for chunk in split_chunks(&lines) {
        let physical_line = line_offset + chunk.start + 1;
        if let Some(target) = chunk.splice {
            map.push_raw(SPLICE_KEY, ConfigNode::String(target));
            continue;
        }
        match serde_yaml::from_str::<Value>(&chunk.text) {
            Ok(value @ Value::Mapping(_)) => {
                if let ConfigNode::Map(chunk_map) = ConfigNode::from(value) {
                    for (key, value) in chunk_map {
                        if map.insert(key.clone(), value).is_some() {
                            result.duplicates.push(DuplicateKey {
                                key: key.clone(),
                                line: physical_line,
                            });
                        }
                        result.key_lines.insert(key, physical_line);
                    }
                }
            }
            Ok(_) => {}
            Err(err) => result.failures.push(YamlFailure {
                line: Some(
                    err.location()
                        .map_or(physical_line, |loc| line_offset + chunk.start + loc.line()),
                ),
                reason: err.to_string(),
            }),
        }
    }

    if !map.is_empty() {
        result.node = Some(ConfigNode::Map(map));
    }
    result
}

/// Merges several bodies (fenced blocks) into one map, later keys winning.
pub(crate) fn merge_bodies(parts: Vec<BodyParse>) -> BodyParse {
    let mut merged = BodyParse::default();
    let mut map = ConfigMap::new();

    for part in parts {
        merged.keyed |= part.keyed;
        merged.duplicates.extend(part.duplicates);
        merged.failures.extend(part.failures);
        let Some(ConfigNode::Map(part_map)) = part.node else {
            continue;
        };
        for (key, value) in part_map {
            if key == SPLICE_KEY {
                map.push_raw(key, value);
                continue;
            }
            let line = part.key_lines.get(&key).copied().unwrap_or_default();
            if map.insert(key.clone(), value).is_some() {
                merged.duplicates.push(DuplicateKey {
                    key: key.clone(),
                    line,
                });
            }
            merged.key_lines.insert(key, line);
        }
    }

    if !map.is_empty() {
        merged.node = Some(ConfigNode::Map(map));
    }
    merged
}

fn parse_whole(text: &str, line_offset: usize) -> BodyParse {
    match serde_yaml::from_str::<Value>(text) {
        Ok(Value::Null) => BodyParse::default(),
        Ok(value) => BodyParse {
            node: Some(ConfigNode::from(value)),
            ..BodyParse::default()
        },
        Err(err) => BodyParse {
            failures: vec![YamlFailure {
                line: err.location().map(|loc| line_offset + loc.line()),
                reason: err.to_string(),
            }],
            ..BodyParse::default()
        },
    }
}

struct Chunk {
    start: usize,
    text: String,
    splice: Option<String>,
}

fn split_chunks(lines: &[&str]) -> Vec<Chunk> {
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut current: Option<(usize, Vec<&str>)> = None;

    for (index, line) in lines.iter().enumerate() {
        if is_splice_line(line) {
            if let Some((start, body)) = current.take() {
                chunks.push(text_chunk(start, &body));
            }
            let target = line.trim().trim_matches('"').trim_start_matches("@include").trim();
            chunks.push(Chunk {
                start: index,
                text: String::new(),
                splice: Some(format!("@include {target}")),
            });
            continue;
        }
        if is_key_line(line) {
            if let Some((start, body)) = current.take() {
                chunks.push(text_chunk(start, &body));
            }
            current = Some((index, vec![line]));
            continue;
        }
        // Leading comments and blank lines belong to no chunk.
        if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }
    if let Some((start, body)) = current.take() {
        chunks.push(text_chunk(start, &body));
    }
    chunks
}

fn text_chunk(start: usize, body: &[&str]) -> Chunk {
    Chunk {
        start,
        text: body.join("\n"),
        splice: None,
    }
}

fn is_significant(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && !trimmed.starts_with('#')
}

/// A column-0 mapping key such as `name:` or `"quoted key": value`.
pub(crate) fn is_key_line(line: &str) -> bool {
    let Some(first) = line.chars().next() else {
        return false;
    };
    if first.is_whitespace() || "#-[{|>%@`!&*?".contains(first) {
        return false;
    }
    line.find(':').is_some_and(|index| {
        let rest = &line[index + 1..];
        rest.is_empty() || rest.starts_with(char::is_whitespace)
    })
}

/// A column-0 line that is nothing but an include directive.
fn is_splice_line(line: &str) -> bool {
    !line.starts_with(char::is_whitespace) && line.trim().trim_matches('"').starts_with("@include ")
}

/// Blanks document markers and quotes bare `@include` values, which YAML
/// would otherwise reject because `@` is a reserved indicator. Line count
/// is preserved so reported line numbers stay physical.
fn normalize_lines(text: &str) -> String {
    text.lines()
        .map(|line| {
            let trimmed = line.trim();
            if trimmed == "---" || trimmed == "..." {
                return String::new();
            }
            quote_include(line).unwrap_or_else(|| line.to_string())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn quote_include(line: &str) -> Option<String> {
    let index = line.find("@include ")?;
    let (head, tail) = line.split_at(index);
    let head_trimmed = head.trim_end();
    let is_value =
        head_trimmed.is_empty() || head_trimmed.ends_with(':') || head_trimmed.ends_with('-');
    if !is_value {
        return None;
    }
    let value = tail.trim_end();
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    Some(format!("{head}\"{escaped}\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_top_level_key_last_wins() {
        let parsed = parse_body("name: a\nother: 1\nname: b\n", 0);

        let node = parsed.node.expect("Expected content");
        assert_eq!(node.get("name").and_then(ConfigNode::as_str), Some("b"));
        assert_eq!(parsed.duplicates.len(), 1);
        assert_eq!(parsed.duplicates[0].key, "name");
        assert_eq!(parsed.duplicates[0].line, 3);
        assert!(parsed.failures.is_empty());
    }

    #[test]
    fn test_malformed_chunk_keeps_siblings() {
        let parsed = parse_body("good: 1\nbad: [unclosed\nalso_good: 2\n", 10);

        let node = parsed.node.expect("Expected content");
        assert_eq!(node.get("good").and_then(ConfigNode::as_i64), Some(1));
        assert_eq!(node.get("also_good").and_then(ConfigNode::as_i64), Some(2));
        assert_eq!(parsed.failures.len(), 1);
        assert!(parsed.failures[0].line.is_some_and(|line| line >= 12));
    }

    #[test]
    fn test_bare_include_values_are_quoted() {
        let parsed = parse_body("legend: @include shared/a.yml#Legend\nitems:\n  - @include b.yml\n", 0);

        let node = parsed.node.expect("Expected content");
        assert_eq!(
            node.get("legend").and_then(ConfigNode::include_target),
            Some("shared/a.yml#Legend")
        );
        let items = node.get("items").and_then(ConfigNode::as_sequence).expect("Expected items");
        assert_eq!(items[0].include_target(), Some("b.yml"));
    }

    #[test]
    fn test_standalone_include_becomes_splice_marker() {
        let parsed = parse_body("@include shared/base.yml\nlocal: 1\n", 0);

        let map = parsed.node.expect("Expected content");
        let keys: Vec<&str> = map.as_map().map(|m| m.keys().collect()).unwrap_or_default();
        assert_eq!(keys, vec![SPLICE_KEY, "local"]);
    }

    #[test]
    fn test_non_keyed_body_parses_whole() {
        let parsed = parse_body("- a\n- b\n", 0);
        assert!(!parsed.keyed);
        assert_eq!(parsed.node.as_ref().and_then(ConfigNode::as_sequence).map(<[_]>::len), Some(2));

        let prose = parse_body("Just some prose text.\n", 0);
        assert!(!prose.has_content());
        assert!(prose.failures.is_empty());
    }

    #[test]
    fn test_document_markers_are_ignored() {
        let parsed = parse_body("---\na: 1\n---\nb: 2\n", 0);
        let node = parsed.node.expect("Expected content");
        assert_eq!(node.get("b").and_then(ConfigNode::as_i64), Some(2));
        assert!(parsed.failures.is_empty());
    }

    #[test]
    fn test_key_line_detection() {
        assert!(is_key_line("name: value"));
        assert!(is_key_line("Servers:"));
        assert!(is_key_line("\"quoted\": 1"));
        assert!(!is_key_line("  nested: 1"));
        assert!(!is_key_line("- item: 1"));
        assert!(!is_key_line("# comment: x"));
        assert!(!is_key_line("https://example.com"));
    }
}
