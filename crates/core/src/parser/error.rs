//! Error types for document parsing and include resolution.

use std::path::{Path, PathBuf};

use sc_protocol::{IssueKind, PipelineIssue, Stage};
use thiserror::Error;

use crate::cache::CacheError;

/// A document could not be turned into a configuration tree at all.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The document could not be read.
    #[error(transparent)]
    Read(#[from] CacheError),

    /// None of the supported encodings yielded YAML content.
    #[error("No YAML content could be parsed from {path}: {reason}")]
    NoYaml {
        path: PathBuf,
        line: Option<usize>,
        reason: String,
    },
}

/// Type alias for Result with ParseError.
pub type ParseResult<T> = Result<T, ParseError>;

impl ParseError {
    pub fn to_issue(&self) -> PipelineIssue {
        match self {
            ParseError::Read(CacheError::FileRead { path, source }) => {
                PipelineIssue::new(IssueKind::Parse, Stage::Parse, source.to_string())
                    .with_path(path.display().to_string())
            }
            ParseError::Read(other) => {
                PipelineIssue::new(IssueKind::Parse, Stage::Parse, other.to_string())
            }
            ParseError::NoYaml { path, line, reason } => {
                PipelineIssue::new(IssueKind::Parse, Stage::Parse, reason.clone())
                    .with_path(path.display().to_string())
                    .with_line(*line)
            }
        }
    }
}

/// An `@include` directive could not be resolved.
#[derive(Error, Debug)]
pub enum IncludeError {
    /// The include target does not exist.
    #[error("Include target not found: {path}")]
    NotFound { path: PathBuf },

    /// The include target exists but could not be read.
    #[error("Failed to read include target {path}: {source}")]
    Unreadable { path: PathBuf, source: CacheError },

    /// Following the include would revisit a document already being resolved.
    #[error("Include cycle detected: {}", format_chain(.chain, .path))]
    Cycle { path: PathBuf, chain: Vec<PathBuf> },

    /// The `#Section` suffix names a key the target does not have.
    #[error("Section `{section}` not found in {path}")]
    MissingSection { path: PathBuf, section: String },

    /// A standalone include line must resolve to a map to be spliced.
    #[error("Cannot splice non-map content from {path}")]
    NotAMap { path: PathBuf },

    /// The include target holds no parseable YAML.
    #[error("Failed to parse include target {path}: {source}")]
    Target {
        path: PathBuf,
        source: Box<ParseError>,
    },
}

impl IncludeError {
    /// Issue attributed to the document that contained the directive.
    pub fn to_issue(&self, document: &Path) -> PipelineIssue {
        PipelineIssue::new(IssueKind::IncludeResolution, Stage::Parse, self.to_string())
            .with_path(document.display().to_string())
    }
}

fn format_chain(chain: &[PathBuf], path: &Path) -> String {
    chain
        .iter()
        .map(|p| file_label(p))
        .chain(std::iter::once(file_label(path)))
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
