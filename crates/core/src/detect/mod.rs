//! Feature detection over a repository snapshot.
//!
//! Every category of feature is found by one [`Detector`]. Detectors share
//! nothing but the run's [`SharedCache`] and are driven concurrently by the
//! [`DetectorCoordinator`], which folds their outputs into one
//! `DetectionResult`.
//!
//! ## Detectors
//!
//! - [`PersonaDetector`]: agent personas from `superclaude-personas.yml`
//! - [`CommandDetector`]: command descriptors from `.claude/commands/**/*.md`
//! - [`ServerDetector`]: protocol servers merged from three documents
//! - [`CompressionDetector`]: the compression rule set
//!
//! A detector never fails as a whole: problems are returned as
//! `PipelineIssue`s next to whatever features could still be extracted.

pub mod command;
pub mod compression;
pub mod coordinator;
pub mod persona;
pub mod server;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use sc_protocol::{
    Command, CompressionSpec, DetectorSettings, FeatureKind, IssueKind, Persona, PipelineIssue,
    ServerCatalog, Stage,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::{CacheError, SharedCache};
use crate::parser::{ParseError, ParsedDocument};

pub use command::CommandDetector;
pub use compression::CompressionDetector;
pub use coordinator::DetectorCoordinator;
pub use persona::PersonaDetector;
pub use server::ServerDetector;

/// Detector-specific extraction failures.
#[derive(Error, Debug)]
pub enum DetectionError {
    /// A flags table row does not have as many cells as the header.
    #[error("Malformed flags table in {path} at line {line}: expected {expected} cells, found {found}")]
    FlagsTable {
        path: PathBuf,
        line: usize,
        expected: usize,
        found: usize,
    },

    /// Frontmatter was present but could not be deserialized.
    #[error("Failed to parse frontmatter in {path}: {reason}")]
    Frontmatter { path: PathBuf, reason: String },

    /// A detected feature violates its structural invariants.
    #[error("Invalid {feature} in {path}: {reason}")]
    Validation {
        feature: FeatureKind,
        path: PathBuf,
        reason: String,
    },

    /// A source directory could not be traversed.
    #[error("Failed to traverse directory {path}: {source}")]
    DirectoryWalk {
        path: PathBuf,
        source: walkdir::Error,
    },

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Type alias for Result with DetectionError.
pub type DetectResult<T> = Result<T, DetectionError>;

impl DetectionError {
    pub fn to_issue(&self, feature: FeatureKind) -> PipelineIssue {
        let (kind, path, line) = match self {
            DetectionError::FlagsTable { path, line, .. } => {
                (IssueKind::Detection, Some(path), Some(*line))
            }
            DetectionError::Frontmatter { path, .. } | DetectionError::DirectoryWalk { path, .. } => {
                (IssueKind::Detection, Some(path), None)
            }
            DetectionError::Validation { path, .. } => (IssueKind::Validation, Some(path), None),
            DetectionError::Cache(CacheError::FileRead { path, .. }) => {
                (IssueKind::Parse, Some(path), None)
            }
            DetectionError::Cache(CacheError::Pattern { .. }) => (IssueKind::Detection, None, None),
        };
        let issue = PipelineIssue::new(kind, Stage::Detect, self.to_string())
            .with_feature(feature)
            .with_line(line);
        match path {
            Some(path) => issue.with_path(path.display().to_string()),
            None => issue,
        }
    }
}

/// Everything a detector may look at during one run.
#[derive(Clone)]
pub struct DetectionContext {
    pub repo_root: PathBuf,
    pub cache: Arc<SharedCache>,
    pub settings: DetectorSettings,
    pub cancel: CancellationToken,
}

impl DetectionContext {
    pub fn new(repo_root: impl Into<PathBuf>, cache: Arc<SharedCache>) -> Self {
        Self {
            repo_root: repo_root.into(),
            cache,
            settings: DetectorSettings::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_settings(mut self, settings: DetectorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Repository-relative display form of `path`.
    pub fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.repo_root)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

/// Features found by one detector.
#[derive(Debug, Clone, PartialEq)]
pub enum Features {
    Personas(Vec<Persona>),
    Commands(Vec<Command>),
    Servers(ServerCatalog),
    Compression(Option<CompressionSpec>),
}

impl Features {
    pub fn kind(&self) -> FeatureKind {
        match self {
            Features::Personas(_) => FeatureKind::Personas,
            Features::Commands(_) => FeatureKind::Commands,
            Features::Servers(_) => FeatureKind::Servers,
            Features::Compression(_) => FeatureKind::Compression,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Features::Personas(personas) => personas.len(),
            Features::Commands(commands) => commands.len(),
            Features::Servers(catalog) => catalog.servers.len(),
            Features::Compression(spec) => usize::from(spec.is_some()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of one detector run.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorOutput {
    pub features: Features,
    pub issues: Vec<PipelineIssue>,
    /// The detector stopped early because the run was cancelled.
    pub cancelled: bool,
}

/// A feature detector.
///
/// Implementations must check [`DetectionContext::is_cancelled`] between
/// file operations and return what they have so far when it is set.
#[async_trait]
pub trait Detector: Send + Sync {
    fn kind(&self) -> FeatureKind;
    async fn detect(&self, ctx: &DetectionContext) -> DetectorOutput;
}

/// Files matched by the first candidate pattern that matches anything.
///
/// Patterns are relative to `root` and may contain glob wildcards.
pub(crate) fn first_matching(root: &Path, candidates: &[&str]) -> Vec<PathBuf> {
    let escaped_root = glob::Pattern::escape(&root.display().to_string());
    for candidate in candidates {
        let pattern = format!("{escaped_root}/{candidate}");
        let Ok(entries) = glob::glob(&pattern) else {
            continue;
        };
        let mut matches: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .filter(|path| path.is_file())
            .collect();
        if !matches.is_empty() {
            matches.sort();
            debug!(candidate, count = matches.len(), "candidate matched");
            return matches;
        }
        debug!(candidate, "candidate missed");
    }
    Vec::new()
}

/// Issues recorded while parsing `document`, attributed to `feature`.
pub(crate) fn document_issues(document: &ParsedDocument, feature: FeatureKind) -> Vec<PipelineIssue> {
    document
        .issues()
        .cloned()
        .map(|issue| issue.with_feature(feature))
        .collect()
}

pub(crate) fn parse_issue(error: &ParseError, feature: FeatureKind) -> PipelineIssue {
    error.to_issue().with_feature(feature)
}

pub(crate) fn cancelled_issue(feature: FeatureKind) -> PipelineIssue {
    PipelineIssue::new(
        IssueKind::Cancelled,
        Stage::Detect,
        format!("{feature} detection cancelled before completion"),
    )
    .with_feature(feature)
}
