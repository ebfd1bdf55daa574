//! Code generation: rendering artifact descriptors and writing them.
//!
//! The `CodeGenerator` is responsible for:
//! - Rendering every descriptor through its embedded template
//! - Deciding per file whether to create, overwrite, skip or report a conflict
//! - Backing up existing content before it is replaced
//! - Writing files concurrently, bounded by `max_concurrency`, with writes
//!   to the same path kept in plan order
//!
//! In dry-run mode the same rendering and decisions are made but nothing is
//! written, so the planned file set is identical to a real run's.

pub mod error;
pub mod templates;
pub mod writer;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use sc_protocol::{
    ArtifactDescriptor, CategoryCounts, FileAction, FileOutcome, GeneratedFile, GenerationSummary,
    GeneratorSettings, PipelineEvent, PipelineIssue, TransformResult,
};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, instrument, warn};

pub use error::GenerationError;
pub use error::GenerationResult;
pub use error::TemplateError;

/// Category key for artifacts that belong to no feature category.
pub const RUN_CATEGORY: &str = "summary";

/// Renders one descriptor into a file.
///
/// # Errors
///
/// Returns `GenerationError::Render` when the template is unknown or a
/// placeholder has no value.
pub fn render_artifact(descriptor: &ArtifactDescriptor) -> GenerationResult<GeneratedFile> {
    let content = templates::render(&descriptor.template, &descriptor.context)
        .map_err(|source| GenerationError::Render {
            path: descriptor.path.clone(),
            source,
        })?
        .into_bytes();
    Ok(GeneratedFile {
        path: descriptor.path.clone(),
        size: content.len(),
        sha256: writer::sha256_hex(&content),
        content,
        file_type: descriptor.file_type,
        policy: descriptor.policy,
        category: descriptor.category,
    })
}

/// Renders every descriptor, keeping successes and failures apart.
pub fn render_all(
    transform: &TransformResult,
) -> (Vec<GeneratedFile>, Vec<(&ArtifactDescriptor, GenerationError)>) {
    let mut files = Vec::new();
    let mut failures = Vec::new();
    for descriptor in &transform.artifacts {
        match render_artifact(descriptor) {
            Ok(file) => files.push(file),
            Err(err) => failures.push((descriptor, err)),
        }
    }
    (files, failures)
}

pub struct CodeGenerator {
    output_root: PathBuf,
    settings: GeneratorSettings,
    events: Option<mpsc::Sender<PipelineEvent>>,
}

impl CodeGenerator {
    pub fn new(output_root: impl Into<PathBuf>, settings: GeneratorSettings) -> Self {
        Self {
            output_root: output_root.into(),
            settings,
            events: None,
        }
    }

    /// Send a `FileProcessed` event per file.
    pub fn with_events(mut self, events: mpsc::Sender<PipelineEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Renders and writes every artifact of `transform`.
    ///
    /// Per-file failures are recorded in the summary and never stop the
    /// remaining files.
    #[instrument(skip_all, fields(root = %self.output_root.display(), dry_run = self.settings.dry_run))]
    pub async fn generate(&self, transform: &TransformResult) -> GenerationSummary {
        let mut summary = GenerationSummary {
            dry_run: self.settings.dry_run,
            output_root: self.output_root.display().to_string(),
            ..GenerationSummary::default()
        };
        for (kind, counts) in &transform.metadata.categories {
            summary.categories.entry(kind.to_string()).or_default().transformed = counts.artifacts;
        }

        let (files, failures) = render_all(transform);
        let mut outcomes: Vec<(usize, FileOutcome, Option<PipelineIssue>)> = Vec::new();

        for (descriptor, err) in failures {
            warn!(path = %descriptor.path, error = %err, "artifact could not be rendered");
            outcomes.push((
                usize::MAX,
                FileOutcome {
                    path: descriptor.path.clone(),
                    category: descriptor.category,
                    size: 0,
                    action: FileAction::Failed { error: err.to_string() },
                    executed: false,
                },
                Some(err.to_issue(&descriptor.path)),
            ));
        }
        outcomes.extend(self.write_all(files).await);
        outcomes.sort_by_key(|(index, _, _)| *index);

        for (_, outcome, issue) in outcomes {
            let counts = summary
                .categories
                .entry(outcome.category.map_or(RUN_CATEGORY.to_string(), |kind| kind.to_string()))
                .or_default();
            tally(counts, &outcome.action);
            if let Some(issue) = issue {
                summary.errors.push(issue);
            }
            if let Some(events) = &self.events {
                let _ = events.send(PipelineEvent::FileProcessed(outcome.clone())).await;
            }
            summary.files.push(outcome);
        }

        let total = summary.total();
        info!(
            files = summary.files.len(),
            written = total.written,
            skipped = total.skipped,
            conflicts = total.conflicts,
            failed = total.failed,
            "generation finished"
        );
        summary
    }

    /// Groups files by path and writes each group in its own task.
    async fn write_all(&self, files: Vec<GeneratedFile>) -> Vec<(usize, FileOutcome, Option<PipelineIssue>)> {
        let mut groups: BTreeMap<String, Vec<(usize, GeneratedFile)>> = BTreeMap::new();
        for (index, file) in files.into_iter().enumerate() {
            groups.entry(file.path.clone()).or_default().push((index, file));
        }

        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let mut handles = Vec::with_capacity(groups.len());
        for (path, group) in groups {
            let semaphore = Arc::clone(&semaphore);
            let root = self.output_root.clone();
            let settings = self.settings.clone();
            let fallback: Vec<(usize, FileOutcome)> = group
                .iter()
                .map(|(index, file)| (*index, outcome_for(file, FileAction::Conflict, false)))
                .collect();

            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                tokio::task::spawn_blocking(move || {
                    group
                        .into_iter()
                        .map(|(index, file)| {
                            let (outcome, issue) = write_one(&root, &file, &settings);
                            (index, outcome, issue)
                        })
                        .collect::<Vec<_>>()
                })
                .await
            });
            handles.push((path, fallback, handle));
        }

        let mut outcomes = Vec::new();
        for (path, fallback, handle) in handles {
            match handle.await {
                Ok(Ok(group)) => outcomes.extend(group),
                Ok(Err(err)) | Err(err) => {
                    let err = GenerationError::Task {
                        path: path.clone(),
                        reason: err.to_string(),
                    };
                    warn!(%path, error = %err, "write task failed");
                    for (index, mut outcome) in fallback {
                        outcome.action = FileAction::Failed { error: err.to_string() };
                        outcomes.push((index, outcome, Some(err.to_issue(&path))));
                    }
                }
            }
        }
        outcomes
    }
}

fn outcome_for(file: &GeneratedFile, action: FileAction, executed: bool) -> FileOutcome {
    FileOutcome {
        path: file.path.clone(),
        category: file.category,
        size: file.size,
        action,
        executed,
    }
}

fn write_one(root: &Path, file: &GeneratedFile, settings: &GeneratorSettings) -> (FileOutcome, Option<PipelineIssue>) {
    let result = writer::resolve_target(root, &file.path).and_then(|target| {
        let plan = writer::plan_write(target, file, settings.force, settings.backup, Utc::now())?;
        if !settings.dry_run {
            writer::execute(&plan, &file.content)?;
        }
        Ok(plan)
    });

    match result {
        Ok(plan) => {
            debug!(path = %file.path, action = ?plan.action, "file processed");
            let executed = !settings.dry_run && matches!(plan.action, FileAction::Create | FileAction::Overwrite { .. });
            (outcome_for(file, plan.action, executed), None)
        }
        Err(err) => {
            warn!(path = %file.path, error = %err, "file not written");
            let issue = err.to_issue(&file.path);
            (outcome_for(file, FileAction::Failed { error: err.to_string() }, false), Some(issue))
        }
    }
}

fn tally(counts: &mut CategoryCounts, action: &FileAction) {
    match action {
        FileAction::Create => counts.written += 1,
        FileAction::Overwrite { backup } => {
            counts.written += 1;
            if backup.is_some() {
                counts.backed_up += 1;
            }
        }
        FileAction::Skip { .. } => counts.skipped += 1,
        FileAction::Conflict => counts.conflicts += 1,
        FileAction::Failed { .. } => counts.failed += 1,
    }
}
