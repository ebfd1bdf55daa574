//! Generation outcomes, run state and progress events.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::artifact_models::TransformMetadata;
use crate::detection_models::{DetectionResult, FeatureKind, PipelineIssue};

/// What the generator decided (or, in dry-run, would decide) for one file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum FileAction {
    Create,
    Overwrite {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        backup: Option<String>,
    },
    Skip {
        reason: String,
    },
    Conflict,
    Failed {
        error: String,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct FileOutcome {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<FeatureKind>,
    pub size: usize,
    pub action: FileAction,
    /// `false` in dry-run mode.
    pub executed: bool,
}

/// Per-category counters reported to the user.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCounts {
    pub detected: usize,
    pub transformed: usize,
    pub written: usize,
    pub skipped: usize,
    pub backed_up: usize,
    pub conflicts: usize,
    pub failed: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSummary {
    pub dry_run: bool,
    pub output_root: String,
    pub files: Vec<FileOutcome>,
    /// Keyed by category name; run-level artifacts are counted under `summary`.
    pub categories: BTreeMap<String, CategoryCounts>,
    /// Every non-fatal issue from every stage.
    pub errors: Vec<PipelineIssue>,
    pub warnings: Vec<PipelineIssue>,
}

impl GenerationSummary {
    pub fn conflicts(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files
            .iter()
            .filter(|f| matches!(f.action, FileAction::Conflict))
    }

    pub fn total(&self) -> CategoryCounts {
        self.categories
            .values()
            .fold(CategoryCounts::default(), |mut acc, c| {
                acc.detected += c.detected;
                acc.transformed += c.transformed;
                acc.written += c.written;
                acc.skipped += c.skipped;
                acc.backed_up += c.backed_up;
                acc.conflicts += c.conflicts;
                acc.failed += c.failed;
                acc
            })
    }
}

/// Lifecycle of one pipeline run.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    Idle,
    Detecting,
    Transforming,
    Generating,
    Done,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }
}

/// Progress notifications emitted while a run is in flight.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum PipelineEvent {
    StateChanged {
        run_id: Uuid,
        state: PipelineState,
    },
    DetectorFinished {
        kind: FeatureKind,
        features: usize,
        issues: usize,
        cancelled: bool,
    },
    FileProcessed(FileOutcome),
}

/// Everything a reporting layer needs after a run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub state: PipelineState,
    pub detection: DetectionResult,
    pub transform: TransformMetadata,
    pub generation: GenerationSummary,
    pub cancelled: bool,
}

impl RunReport {
    pub fn has_issues(&self) -> bool {
        !self.generation.errors.is_empty() || !self.generation.warnings.is_empty()
    }
}
