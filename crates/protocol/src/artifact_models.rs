//! Artifact descriptors produced by the transformation engine and the
//! rendered files produced from them by the code generator.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::detection_models::{FeatureKind, PipelineIssue};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    TypeScript,
    Json,
    Markdown,
}

impl FileType {
    pub fn from_path(path: &str) -> Self {
        if path.ends_with(".json") {
            FileType::Json
        } else if path.ends_with(".md") {
            FileType::Markdown
        } else {
            FileType::TypeScript
        }
    }
}

/// How the generator may treat an existing file at the target path.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "kebab-case")]
pub enum WritePolicy {
    /// Write only when the target does not exist yet.
    Create,
    /// Replace changed content without requiring `force`.
    Overwrite,
    /// Skip identical content; changed content needs `force` or is a conflict.
    #[default]
    SkipIfUnchanged,
}

/// An unrendered artifact: a template name plus the values for its placeholders.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct ArtifactDescriptor {
    /// Path relative to the output root, `/`-separated.
    pub path: String,
    pub template: String,
    pub context: BTreeMap<String, String>,
    pub file_type: FileType,
    #[serde(default)]
    pub policy: WritePolicy,
    /// `None` for run-level artifacts such as the summary document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<FeatureKind>,
}

/// A rendered file ready to be written.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct GeneratedFile {
    pub path: String,
    #[serde(skip)]
    #[ts(skip)]
    pub content: Vec<u8>,
    pub file_type: FileType,
    pub policy: WritePolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<FeatureKind>,
    pub size: usize,
    /// Hex SHA-256 of `content`.
    pub sha256: String,
}

/// Per-category transformation counts.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, TS)]
pub struct CategoryTransform {
    pub features: usize,
    pub artifacts: usize,
    /// Names of features that produced no artifacts.
    #[serde(default)]
    pub skipped: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, TS)]
pub struct TransformMetadata {
    pub categories: BTreeMap<FeatureKind, CategoryTransform>,
    /// Mapping warnings raised while applying alias tables.
    pub warnings: Vec<PipelineIssue>,
}

/// Ordered artifact descriptors plus generation metadata.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, TS)]
pub struct TransformResult {
    pub artifacts: Vec<ArtifactDescriptor>,
    pub metadata: TransformMetadata,
}
