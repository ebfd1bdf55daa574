//! Error types for rendering and writing generated files.

use std::path::PathBuf;

use sc_protocol::{IssueKind, PipelineIssue, Stage};
use thiserror::Error;

pub type TemplateResult<T> = Result<T, TemplateError>;

#[derive(Debug, Error)]
pub enum TemplateError {
    /// No embedded template has this name.
    #[error("Template not found: {name}")]
    NotFound { name: String },

    /// The descriptor context has no value for a placeholder.
    #[error("Template {template} has no value for placeholder `{key}`")]
    MissingValue { template: String, key: String },

    #[error("Malformed placeholder in template {template} at byte {offset}: {reason}")]
    Malformed {
        template: String,
        offset: usize,
        reason: String,
    },
}

/// Result type for generation operations.
pub type GenerationResult<T> = Result<T, GenerationError>;

/// Errors that fail a single generated file. The generator records them and
/// continues with the remaining files.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The artifact path is absolute or escapes the output root.
    #[error("Refusing to write {path}: {reason}")]
    UnsafePath { path: String, reason: String },

    #[error("Failed to render {path}: {source}")]
    Render {
        path: String,
        source: TemplateError,
    },

    /// Failed to read the existing file for comparison.
    #[error("Failed to read existing file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to create a directory.
    #[error("Failed to create directory {path:?}: {source}")]
    DirectoryCreate {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to copy the existing content aside before overwriting.
    #[error("Failed to back up {path:?}: {source}")]
    Backup {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write a file.
    #[error("Failed to write file {path:?}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The write task ended without reporting a result.
    #[error("Write task for {path} failed: {reason}")]
    Task { path: String, reason: String },
}

impl GenerationError {
    pub fn to_issue(&self, path: &str) -> PipelineIssue {
        PipelineIssue::new(IssueKind::Generation, Stage::Generate, self.to_string()).with_path(path)
    }
}
