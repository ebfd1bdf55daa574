//! Command detection from Markdown command files.
//!
//! Each `*.md` file under `.claude/commands/` (or `commands/`) describes one
//! command. The name, purpose and category come from frontmatter when it is
//! present and from inline markers otherwise; flags come from a Markdown
//! table with a `Flag` column, or from inline `--flag [description]`
//! mentions when the file has no such table.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use gray_matter::engine::YAML;
use gray_matter::Matter;
use regex::Regex;
use sc_protocol::{
    Command, CommandExample, CommandFlag, FeatureKind, IssueKind, PipelineIssue, Stage,
};
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use super::{
    cancelled_issue, DetectResult, DetectionContext, DetectionError, Detector, DetectorOutput,
    Features,
};
use crate::cache::SharedCache;
use crate::parser::ConfigNode;

pub const COMMAND_DIRS: [&str; 2] = [".claude/commands", "commands"];

const USER_NAME_PATTERN: &str = r"/user:(\w+)";
const NAME_MARKER_PATTERN: &str = r"(?m)^name:\s*([\w:-]+)\s*$";
const PURPOSE_PATTERN: &str = r#"Purpose:\s*"([^"]+)""#;
const CATEGORY_PATTERN: &str = r"Category:\s*(\w+)";
const FLAG_PATTERN: &str = r"--(\w+)(?:\s*\[([^\]]+)\])?";
const EXAMPLE_PATTERN: &str = r"(?m)^-\s*`([^`]+)`\s*-\s*(.+)$";

/// Keyword table for category inference, checked in order.
const CATEGORY_KEYWORDS: [(&[&str], &str); 4] = [
    (&["build", "create"], "Code Generation"),
    (&["fix", "debug"], "Debugging"),
    (&["help", "explain"], "Documentation"),
    (&[], "Utilities"),
];

pub struct CommandDetector;

struct Patterns {
    user_name: Arc<Regex>,
    name_marker: Arc<Regex>,
    purpose: Arc<Regex>,
    category: Arc<Regex>,
    flag: Arc<Regex>,
    example: Arc<Regex>,
}

impl Patterns {
    fn load(cache: &SharedCache) -> DetectResult<Self> {
        Ok(Self {
            user_name: cache.get_pattern(USER_NAME_PATTERN)?,
            name_marker: cache.get_pattern(NAME_MARKER_PATTERN)?,
            purpose: cache.get_pattern(PURPOSE_PATTERN)?,
            category: cache.get_pattern(CATEGORY_PATTERN)?,
            flag: cache.get_pattern(FLAG_PATTERN)?,
            example: cache.get_pattern(EXAMPLE_PATTERN)?,
        })
    }
}

#[async_trait]
impl Detector for CommandDetector {
    fn kind(&self) -> FeatureKind {
        FeatureKind::Commands
    }

    #[instrument(skip_all, fields(root = %ctx.repo_root.display()))]
    async fn detect(&self, ctx: &DetectionContext) -> DetectorOutput {
        let mut commands: BTreeMap<String, Command> = BTreeMap::new();
        let mut issues = Vec::new();
        let mut cancelled = false;

        let patterns = match Patterns::load(&ctx.cache) {
            Ok(patterns) => patterns,
            Err(err) => {
                return DetectorOutput {
                    features: Features::Commands(Vec::new()),
                    issues: vec![err.to_issue(FeatureKind::Commands)],
                    cancelled,
                }
            }
        };

        let (files, walk_errors) = command_files(&ctx.repo_root);
        issues.extend(walk_errors.iter().map(|err| err.to_issue(FeatureKind::Commands)));

        for path in files {
            if ctx.is_cancelled() {
                cancelled = true;
                issues.push(cancelled_issue(FeatureKind::Commands));
                break;
            }
            let raw = match ctx.cache.get_file(&path).await {
                Ok(raw) => raw,
                Err(err) => {
                    issues.push(DetectionError::from(err).to_issue(FeatureKind::Commands));
                    continue;
                }
            };
            let source = ctx.display_path(&path);
            let (command, errors) = parse_command(&raw.text(), &path, &source, &patterns);
            issues.extend(errors.iter().map(|err| err.to_issue(FeatureKind::Commands)));

            debug!(command = %command.name, category = %command.category, "command parsed");
            let name = command.name.clone();
            if commands.insert(name.clone(), command).is_some() {
                issues.push(
                    PipelineIssue::new(
                        IssueKind::DuplicateName,
                        Stage::Detect,
                        format!("duplicate command `{name}`; the later definition wins"),
                    )
                    .with_feature(FeatureKind::Commands)
                    .with_path(source),
                );
            }
        }

        info!(count = commands.len(), "commands detected");
        DetectorOutput {
            features: Features::Commands(commands.into_values().collect()),
            issues,
            cancelled,
        }
    }
}

/// Markdown files of the first existing command directory, sorted.
fn command_files(root: &Path) -> (Vec<PathBuf>, Vec<DetectionError>) {
    let Some(dir) = COMMAND_DIRS
        .iter()
        .map(|dir| root.join(dir))
        .find(|dir| dir.is_dir())
    else {
        debug!("no command directory found");
        return (Vec::new(), Vec::new());
    };

    let mut files = Vec::new();
    let mut errors = Vec::new();
    let walker = WalkDir::new(&dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !(entry.depth() > 0 && entry.file_type().is_dir() && entry.file_name() == "shared"));
    for entry in walker {
        match entry {
            Ok(entry) => {
                let path = entry.path();
                if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "md") {
                    files.push(path.to_path_buf());
                }
            }
            Err(source) => errors.push(DetectionError::DirectoryWalk {
                path: dir.clone(),
                source,
            }),
        }
    }
    files.sort();
    (files, errors)
}

fn parse_command(
    text: &str,
    path: &Path,
    source: &str,
    patterns: &Patterns,
) -> (Command, Vec<DetectionError>) {
    let mut errors = Vec::new();
    let matter = Matter::<YAML>::new();
    let parsed = matter.parse(text);
    let frontmatter = match parsed.data.map(|data| data.deserialize::<serde_yaml::Value>()) {
        Some(Ok(value)) => ConfigNode::from(value),
        Some(Err(err)) => {
            errors.push(DetectionError::Frontmatter {
                path: path.to_path_buf(),
                reason: err.to_string(),
            });
            ConfigNode::Null
        }
        None => ConfigNode::Null,
    };
    let body = parsed.content.trim().to_string();

    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = front_text(&frontmatter, &["name"])
        .or_else(|| capture(&patterns.user_name, &body))
        .or_else(|| capture(&patterns.name_marker, &body))
        .unwrap_or(stem);

    let purpose = front_text(&frontmatter, &["purpose", "description"])
        .or_else(|| capture(&patterns.purpose, &body))
        .or_else(|| first_prose_line(&body))
        .unwrap_or_default();

    let declared = front_text(&frontmatter, &["category"]).or_else(|| capture(&patterns.category, &body));
    let category_inferred = declared.is_none();
    let category = declared.unwrap_or_else(|| infer_category(&name).to_string());

    let flags = match table_flags(text, path) {
        Some(Ok(flags)) => flags,
        Some(Err(err)) => {
            errors.push(err);
            Vec::new()
        }
        None => inline_flags(&body, &patterns.flag),
    };

    let mut examples: Vec<CommandExample> = patterns
        .example
        .captures_iter(&body)
        .map(|caps| CommandExample {
            command: caps[1].trim().to_string(),
            description: caps[2].trim().to_string(),
        })
        .collect();
    examples.extend(frontmatter_examples(&frontmatter));

    let command = Command {
        name,
        purpose,
        category,
        category_inferred,
        flags,
        examples,
        body,
        source: source.to_string(),
    };
    (command, errors)
}

fn front_text(frontmatter: &ConfigNode, keys: &[&str]) -> Option<String> {
    frontmatter
        .as_map()
        .and_then(|map| map.get_any(keys))
        .and_then(ConfigNode::scalar_text)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn first_prose_line(body: &str) -> Option<String> {
    body.lines()
        .map(str::trim)
        .find(|line| {
            !line.is_empty()
                && !line.starts_with('#')
                && !line.starts_with('|')
                && !line.starts_with("```")
                && !line.starts_with("---")
                && !line.starts_with('@')
        })
        .map(str::to_string)
}

/// Category for a command that does not declare one.
pub fn infer_category(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    if lower.starts_with("user:") {
        return "AI Development";
    }
    CATEGORY_KEYWORDS
        .iter()
        .find(|(keywords, _)| keywords.is_empty() || keywords.iter().any(|k| lower.contains(k)))
        .map_or("Utilities", |(_, category)| category)
}

fn inferred_flag_type(name: &str) -> &'static str {
    match name {
        "framework" | "model" | "provider" => "string",
        "port" | "timeout" | "limit" => "number",
        _ => "boolean",
    }
}

fn inline_flags(body: &str, pattern: &Regex) -> Vec<CommandFlag> {
    let mut flags: Vec<CommandFlag> = Vec::new();
    for caps in pattern.captures_iter(body) {
        let name = &caps[1];
        if flags.iter().any(|flag| flag.name == name) {
            continue;
        }
        flags.push(CommandFlag {
            name: name.to_string(),
            flag_type: inferred_flag_type(name).to_string(),
            description: caps.get(2).map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
            default: None,
            choices: Vec::new(),
        });
    }
    flags
}

fn table_cells(line: &str) -> Vec<String> {
    let escaped = line.trim().replace("\\|", "\u{0}");
    let inner = escaped.trim_start_matches('|');
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner
        .split('|')
        .map(|cell| cell.replace('\u{0}', "|").trim().to_string())
        .collect()
}

fn is_separator_row(cells: &[String]) -> bool {
    cells
        .iter()
        .all(|cell| !cell.is_empty() && cell.chars().all(|c| matches!(c, '-' | ':' | ' ')))
}

/// Flags from the first Markdown table with a `Flag` column.
///
/// Returns `None` when the text has no such table.
fn table_flags(text: &str, path: &Path) -> Option<DetectResult<Vec<CommandFlag>>> {
    let lines: Vec<&str> = text.lines().collect();
    let (header_index, header) = lines.iter().enumerate().find_map(|(index, line)| {
        if !line.trim_start().starts_with('|') {
            return None;
        }
        let cells = table_cells(line);
        cells
            .iter()
            .any(|cell| cell.eq_ignore_ascii_case("flag"))
            .then_some((index, cells))
    })?;

    let column = |name: &str| header.iter().position(|cell| cell.eq_ignore_ascii_case(name));
    let flag_col = column("flag")?;
    let type_col = column("type");
    let description_col = column("description");
    let default_col = column("default");
    let choices_col = column("choices");

    let mut flags = Vec::new();
    for (index, line) in lines.iter().enumerate().skip(header_index + 1) {
        if !line.trim_start().starts_with('|') {
            break;
        }
        let cells = table_cells(line);
        if is_separator_row(&cells) {
            continue;
        }
        if cells.len() != header.len() {
            return Some(Err(DetectionError::FlagsTable {
                path: path.to_path_buf(),
                line: index + 1,
                expected: header.len(),
                found: cells.len(),
            }));
        }

        let cell = |col: Option<usize>| {
            col.and_then(|c| cells.get(c))
                .map(|value| value.trim_matches('`').trim().to_string())
                .filter(|value| !value.is_empty() && value != "-")
        };
        let Some(raw_name) = cell(Some(flag_col)) else {
            continue;
        };
        let name = raw_name
            .trim_start_matches('-')
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string();
        if name.is_empty() {
            continue;
        }
        let flag_type = cell(type_col).unwrap_or_else(|| inferred_flag_type(&name).to_string());
        flags.push(CommandFlag {
            description: cell(description_col).unwrap_or_default(),
            default: cell(default_col),
            choices: cell(choices_col)
                .map(|choices| {
                    choices
                        .split([',', '|'])
                        .map(|choice| choice.trim().trim_matches('`').to_string())
                        .filter(|choice| !choice.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            name,
            flag_type,
        });
    }
    Some(Ok(flags))
}

fn frontmatter_examples(frontmatter: &ConfigNode) -> Vec<CommandExample> {
    let Some(items) = frontmatter.get("examples").and_then(ConfigNode::as_sequence) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match item {
            ConfigNode::Map(_) => Some(CommandExample {
                command: item.get("command").and_then(ConfigNode::scalar_text)?,
                description: item
                    .get("description")
                    .and_then(ConfigNode::scalar_text)
                    .unwrap_or_default(),
            }),
            other => other.scalar_text().map(|command| CommandExample {
                command,
                description: String::new(),
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn patterns() -> Patterns {
        Patterns::load(&SharedCache::new()).expect("Patterns should compile")
    }

    fn parse(text: &str, file: &str) -> (Command, Vec<DetectionError>) {
        parse_command(text, Path::new(file), file, &patterns())
    }

    #[test]
    fn test_category_inference() {
        assert_eq!(infer_category("fix"), "Debugging");
        assert_eq!(infer_category("debug-session"), "Debugging");
        assert_eq!(infer_category("help"), "Documentation");
        assert_eq!(infer_category("explain"), "Documentation");
        assert_eq!(infer_category("build"), "Code Generation");
        assert_eq!(infer_category("user:assist"), "AI Development");
        assert_eq!(infer_category("spawn"), "Utilities");
    }

    #[test]
    fn test_inline_markers_and_flags() {
        let text = "**Purpose**: build\n\n/user:build\nPurpose: \"Build projects\"\n\n--react [Use React]\n--port\n--react\n\n- `/user:build --react` - React app\n";
        let (command, errors) = parse(text, "build.md");

        assert!(errors.is_empty());
        assert_eq!(command.name, "build");
        assert_eq!(command.purpose, "Build projects");
        assert_eq!(command.category, "Code Generation");
        assert!(command.category_inferred);
        let flags: Vec<(&str, &str)> = command
            .flags
            .iter()
            .map(|f| (f.name.as_str(), f.flag_type.as_str()))
            .collect();
        assert_eq!(flags, vec![("react", "boolean"), ("port", "number")]);
        assert_eq!(command.flags[0].description, "Use React");
        assert_eq!(command.examples.len(), 1);
        assert_eq!(command.examples[0].command, "/user:build --react");
        assert_eq!(command.examples[0].description, "React app");
    }

    #[test]
    fn test_frontmatter_and_flags_table() {
        let text = "---\nname: deploy\npurpose: Ship it\ncategory: Operations\nexamples:\n  - deploy --env prod\n---\n# Deploy\n\n| Flag | Type | Description | Default | Choices |\n|------|------|-------------|---------|---------|\n| `--env` | enum | Target | dev | dev, prod |\n| --dry | bool | Plan only | - | |\n";
        let (command, errors) = parse(text, "deploy.md");

        assert!(errors.is_empty(), "Unexpected errors: {errors:?}");
        assert_eq!(command.name, "deploy");
        assert_eq!(command.purpose, "Ship it");
        assert_eq!(command.category, "Operations");
        assert!(!command.category_inferred);
        assert_eq!(command.flags.len(), 2);
        assert_eq!(command.flags[0].name, "env");
        assert_eq!(command.flags[0].flag_type, "enum");
        assert_eq!(command.flags[0].default.as_deref(), Some("dev"));
        assert_eq!(command.flags[0].choices, vec!["dev", "prod"]);
        assert_eq!(command.flags[1].default, None);
        assert_eq!(command.examples[0].command, "deploy --env prod");
        assert!(command.body.starts_with("# Deploy"));
    }

    #[test]
    fn test_malformed_table_keeps_command() {
        let text = "# Scan\n\n| Flag | Description |\n|---|---|\n| --deep | Full scan |\n| --fast |\n";
        let (command, errors) = parse(text, "scan.md");

        assert_eq!(command.name, "scan");
        assert!(command.flags.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], DetectionError::FlagsTable { line: 6, expected: 2, found: 1, .. }));
    }

    #[tokio::test]
    async fn test_detector_skips_shared_directory() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let commands = temp_dir.path().join(".claude/commands");
        fs::create_dir_all(commands.join("shared")).expect("Failed to create dirs");
        fs::write(commands.join("fix.md"), "Fix bugs.\n").expect("Failed to write fix.md");
        fs::write(commands.join("help.md"), "Explain things.\n").expect("Failed to write help.md");
        fs::write(commands.join("shared/patterns.md"), "Shared.\n").expect("Failed to write shared");

        let ctx = DetectionContext::new(temp_dir.path(), Arc::new(SharedCache::new()));
        let output = CommandDetector.detect(&ctx).await;
        let Features::Commands(commands) = output.features else {
            panic!("Expected commands");
        };

        let names: Vec<&str> = commands.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["fix", "help"]);
        assert_eq!(commands[0].purpose, "Fix bugs.");
        assert_eq!(commands[1].category, "Documentation");
        assert!(output.issues.is_empty());
    }
}
