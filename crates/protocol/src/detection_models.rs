//! Detection results and the non-fatal issue model shared by every stage.

use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::feature_models::{Command, CompressionSpec, Persona, ServerCatalog};

/// The four feature categories handled by the pipeline.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, TS)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Personas,
    Commands,
    Servers,
    Compression,
}

impl FeatureKind {
    pub const ALL: [FeatureKind; 4] = [
        FeatureKind::Personas,
        FeatureKind::Commands,
        FeatureKind::Servers,
        FeatureKind::Compression,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FeatureKind::Personas => "personas",
            FeatureKind::Commands => "commands",
            FeatureKind::Servers => "servers",
            FeatureKind::Compression => "compression",
        }
    }

    /// Parses a kind name, accepting singular spellings and `mcp` for servers.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "personas" | "persona" | "agents" => Some(FeatureKind::Personas),
            "commands" | "command" => Some(FeatureKind::Commands),
            "servers" | "server" | "mcp" => Some(FeatureKind::Servers),
            "compression" => Some(FeatureKind::Compression),
            _ => None,
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stage at which an issue was recorded.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, TS)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Parse,
    Detect,
    Transform,
    Generate,
}

/// Taxonomy of non-fatal issues.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, TS)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    Parse,
    IncludeResolution,
    DuplicateKey,
    DuplicateName,
    /// An entry was skipped because a required field was missing.
    Skipped,
    Detection,
    MappingWarning,
    Validation,
    Generation,
    Cancelled,
}

impl IssueKind {
    /// Warnings are conflict notes, skipped entries and mapping substitutions.
    pub fn is_warning(self) -> bool {
        matches!(
            self,
            IssueKind::DuplicateKey
                | IssueKind::DuplicateName
                | IssueKind::Skipped
                | IssueKind::MappingWarning
        )
    }
}

/// A recorded, non-fatal problem.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, TS)]
pub struct PipelineIssue {
    pub kind: IssueKind,
    pub stage: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<FeatureKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub message: String,
}

impl PipelineIssue {
    pub fn new(kind: IssueKind, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            kind,
            stage,
            feature: None,
            path: None,
            line: None,
            message: message.into(),
        }
    }

    pub fn with_feature(mut self, feature: FeatureKind) -> Self {
        self.feature = Some(feature);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_line(mut self, line: Option<usize>) -> Self {
        self.line = line;
        self
    }
}

impl fmt::Display for PipelineIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}]", self.kind)?;
        if let Some(path) = &self.path {
            write!(f, " {path}")?;
            if let Some(line) = self.line {
                write!(f, ":{line}")?;
            }
        }
        write!(f, ": {}", self.message)
    }
}

/// Aggregated output of one detection run.
///
/// `errors` and `warnings` are unordered collections; they are kept sorted
/// so that two results can be compared directly.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, TS)]
pub struct DetectionResult {
    pub personas: Vec<Persona>,
    pub commands: Vec<Command>,
    pub servers: ServerCatalog,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<CompressionSpec>,
    pub errors: Vec<PipelineIssue>,
    pub warnings: Vec<PipelineIssue>,
    /// Set when the run was cancelled before every detector finished.
    #[serde(default)]
    pub cancelled: bool,
}

impl DetectionResult {
    /// Number of features detected for a category.
    pub fn count(&self, kind: FeatureKind) -> usize {
        match kind {
            FeatureKind::Personas => self.personas.len(),
            FeatureKind::Commands => self.commands.len(),
            FeatureKind::Servers => self.servers.servers.len(),
            FeatureKind::Compression => usize::from(self.compression.is_some()),
        }
    }

    /// Files the issue into `errors` or `warnings` by kind.
    pub fn record(&mut self, issue: PipelineIssue) {
        if issue.kind.is_warning() {
            self.warnings.push(issue);
        } else {
            self.errors.push(issue);
        }
    }

    /// Compares features only, ignoring issue lists.
    pub fn same_features(&self, other: &DetectionResult) -> bool {
        self.personas == other.personas
            && self.commands == other.commands
            && self.servers == other.servers
            && self.compression == other.compression
    }
}
