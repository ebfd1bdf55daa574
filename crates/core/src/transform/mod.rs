//! Pure mapping from detected features to artifact descriptors.
//!
//! The engine performs no I/O and no rendering: every descriptor names a
//! template and carries a flat string context, and the result is a
//! deterministic function of the `DetectionResult` and the alias tables.
//! Unknown aliases never fail a transformation; a substitute is used and a
//! `MappingWarning` is recorded in the metadata.

mod command;
mod compression;
mod persona;
mod server;
mod summary;
pub mod tables;

use std::collections::{BTreeMap, BTreeSet};

use sc_protocol::{
    ArtifactDescriptor, DetectionResult, FeatureKind, FileType, IssueKind, MappingOverrides,
    PipelineIssue, Stage, TransformMetadata, TransformResult, WritePolicy,
};
use serde_json::Value;
use tracing::{debug, info, instrument};

pub use tables::FlagType;
pub use tables::MappingTables;

/// Template names understood by the code generator.
pub mod template {
    pub const AGENT: &str = "agent.ts.tmpl";
    pub const AGENTS_INDEX: &str = "agents-index.ts.tmpl";
    pub const COMMAND: &str = "command.ts.tmpl";
    pub const COMMANDS_INDEX: &str = "commands-index.ts.tmpl";
    pub const MCP_SERVER: &str = "mcp-server.ts.tmpl";
    pub const MCP_README: &str = "mcp-readme.md.tmpl";
    pub const COMMAND_MCP: &str = "command-mcp.ts.tmpl";
    pub const COMPRESSION_RULES: &str = "compression-rules.ts.tmpl";
    pub const SUMMARY: &str = "summary.md.tmpl";
    pub const JSON: &str = "json.tmpl";
}

pub const SUMMARY_PATH: &str = "TRANSFORMATION_SUMMARY.md";

pub struct TransformEngine {
    tables: MappingTables,
}

impl Default for TransformEngine {
    fn default() -> Self {
        Self::new(MappingTables::default())
    }
}

impl TransformEngine {
    pub fn new(tables: MappingTables) -> Self {
        Self { tables }
    }

    pub fn with_overrides(overrides: &MappingOverrides) -> Self {
        Self::new(MappingTables::with_overrides(overrides))
    }

    pub fn tables(&self) -> &MappingTables {
        &self.tables
    }

    /// Maps the selected categories of `detection` to artifact descriptors.
    ///
    /// Descriptors are ordered by category, then by feature name, and end
    /// with the run summary document.
    #[instrument(skip_all, fields(kinds = kinds.len()))]
    pub fn transform(&self, detection: &DetectionResult, kinds: &[FeatureKind]) -> TransformResult {
        let mut emitter = Emitter::new(&self.tables);

        for kind in FeatureKind::ALL.into_iter().filter(|kind| kinds.contains(kind)) {
            emitter.begin(kind, detection.count(kind));
            match kind {
                FeatureKind::Personas => persona::transform(&detection.personas, &mut emitter),
                FeatureKind::Commands => command::transform(&detection.commands, &mut emitter),
                FeatureKind::Servers => server::transform(&detection.servers, &mut emitter),
                FeatureKind::Compression => {
                    if let Some(spec) = &detection.compression {
                        compression::transform(spec, &mut emitter);
                    }
                }
            }
        }
        let summary = summary::artifact(detection, kinds, &emitter);
        emitter.emit(None, summary);

        let result = emitter.finish();
        info!(
            artifacts = result.artifacts.len(),
            warnings = result.metadata.warnings.len(),
            "transformation finished"
        );
        result
    }
}

/// Collects descriptors, per-category counts and mapping warnings.
pub(crate) struct Emitter<'a> {
    tables: &'a MappingTables,
    artifacts: Vec<ArtifactDescriptor>,
    paths: BTreeSet<String>,
    idents: BTreeSet<String>,
    metadata: TransformMetadata,
}

impl<'a> Emitter<'a> {
    fn new(tables: &'a MappingTables) -> Self {
        Self {
            tables,
            artifacts: Vec::new(),
            paths: BTreeSet::new(),
            idents: BTreeSet::new(),
            metadata: TransformMetadata::default(),
        }
    }

    fn begin(&mut self, kind: FeatureKind, features: usize) {
        self.metadata.categories.entry(kind).or_default().features = features;
    }

    pub(crate) fn tables(&self) -> &MappingTables {
        self.tables
    }

    /// Adds a descriptor. A second descriptor for an already planned path is
    /// refused with a warning.
    pub(crate) fn emit(&mut self, kind: Option<FeatureKind>, descriptor: ArtifactDescriptor) -> bool {
        if !self.paths.insert(descriptor.path.clone()) {
            self.warn(
                kind,
                Some(&descriptor.path),
                format!("artifact path `{}` is already planned; later descriptor dropped", descriptor.path),
            );
            return false;
        }
        if let Some(kind) = kind {
            self.metadata.categories.entry(kind).or_default().artifacts += 1;
        }
        debug!(path = %descriptor.path, template = %descriptor.template, "artifact planned");
        self.artifacts.push(descriptor);
        true
    }

    /// Like [`Emitter::emit`] for a module exporting `ident` through an
    /// index file; a second module with the same identifier is refused.
    pub(crate) fn emit_module(&mut self, kind: FeatureKind, ident: &str, descriptor: ArtifactDescriptor) -> bool {
        if self.idents.contains(ident) {
            self.warn(
                Some(kind),
                Some(&descriptor.path),
                format!("identifier `{ident}` is already exported; `{}` dropped", descriptor.path),
            );
            return false;
        }
        if !self.emit(Some(kind), descriptor) {
            return false;
        }
        self.idents.insert(ident.to_string());
        true
    }

    pub(crate) fn skip(&mut self, kind: FeatureKind, name: &str) {
        self.metadata
            .categories
            .entry(kind)
            .or_default()
            .skipped
            .push(name.to_string());
    }

    pub(crate) fn warn(&mut self, kind: Option<FeatureKind>, path: Option<&str>, message: String) {
        let mut issue = PipelineIssue::new(IssueKind::MappingWarning, Stage::Transform, message);
        if let Some(kind) = kind {
            issue = issue.with_feature(kind);
        }
        if let Some(path) = path {
            issue = issue.with_path(path);
        }
        self.metadata.warnings.push(issue);
    }

    pub(crate) fn model(&mut self, kind: FeatureKind, source: &str, owner: &str, name: &str) -> String {
        let lookup = self.tables.model(name);
        if lookup.substituted {
            self.warn(
                Some(kind),
                Some(source),
                format!("unknown model `{name}` for `{owner}`; using `{}`", lookup.value),
            );
        }
        lookup.value
    }

    /// Maps and de-duplicates tool names, keeping first-seen order.
    pub(crate) fn tools(&mut self, kind: FeatureKind, source: &str, owner: &str, names: &[String]) -> Vec<String> {
        let mut tools: Vec<String> = Vec::new();
        for name in names {
            let lookup = self.tables.tool(name);
            if lookup.substituted {
                self.warn(
                    Some(kind),
                    Some(source),
                    format!("unknown tool `{name}` for `{owner}`; kept as written"),
                );
            }
            if !tools.contains(&lookup.value) {
                tools.push(lookup.value);
            }
        }
        tools
    }

    pub(crate) fn category(&mut self, kind: FeatureKind, source: &str, owner: &str, name: &str) -> String {
        let lookup = self.tables.category(name);
        if lookup.substituted {
            self.warn(
                Some(kind),
                Some(source),
                format!("unknown category `{name}` for `{owner}`; using `{}`", lookup.value),
            );
        }
        lookup.value
    }

    fn finish(self) -> TransformResult {
        TransformResult {
            artifacts: self.artifacts,
            metadata: self.metadata,
        }
    }
}

/// Builds a descriptor whose file type follows from its path.
pub(crate) fn descriptor<const N: usize>(
    path: String,
    template: &str,
    category: Option<FeatureKind>,
    context: [(&str, String); N],
) -> ArtifactDescriptor {
    ArtifactDescriptor {
        file_type: FileType::from_path(&path),
        path,
        template: template.to_string(),
        context: context
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect::<BTreeMap<_, _>>(),
        policy: WritePolicy::default(),
        category,
    }
}

/// A JSON document rendered through the pass-through template.
pub(crate) fn json_descriptor(path: String, category: Option<FeatureKind>, value: &Value) -> ArtifactDescriptor {
    descriptor(path, template::JSON, category, [("json", pretty(value))])
}

/// A quoted, escaped string literal valid in both JSON and TypeScript.
pub(crate) fn literal(text: &str) -> String {
    Value::String(text.to_string()).to_string()
}

pub(crate) fn literal_list(items: &[String]) -> String {
    Value::from(items.to_vec()).to_string()
}

pub(crate) fn pretty(value: &Value) -> String {
    format!("{value:#}")
}

pub(crate) fn number(value: f64) -> String {
    Value::from(value).to_string()
}

/// Lowercase file stem with unsafe characters replaced by `-`.
pub(crate) fn file_stem(name: &str) -> String {
    let stem: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect();
    let stem = stem.trim_matches('-');
    if stem.is_empty() {
        "unnamed".to_string()
    } else {
        stem.to_string()
    }
}

/// `security-auditor` becomes `SecurityAuditor`.
pub(crate) fn pascal_case(name: &str) -> String {
    let ident: String = name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();
    match ident.chars().next() {
        None => "Unnamed".to_string(),
        Some(first) if first.is_ascii_digit() => format!("_{ident}"),
        Some(_) => ident,
    }
}

/// Collapses a value onto one line for use inside a source comment.
pub(crate) fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
