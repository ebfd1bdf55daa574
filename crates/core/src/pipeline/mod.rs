//! End-to-end pipeline runs.
//!
//! A run moves through `Idle -> Detecting -> Transforming -> Generating ->
//! Done`. The only way to reach `Failed` is the repository precondition
//! check before detection starts; after that, every problem is recorded in
//! the report instead of aborting the run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use sc_protocol::{
    DetectionResult, FeatureKind, PipelineConfig, PipelineEvent, PipelineState, RunReport,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::cache::SharedCache;
use crate::detect::{DetectionContext, DetectorCoordinator};
use crate::generator::CodeGenerator;
use crate::transform::TransformEngine;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The repository root is missing or unreadable; no detector was started.
    #[error("Cannot process repository {path:?}: {reason}")]
    FatalPrecondition { path: PathBuf, reason: String },
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Creates an event channel and a stream over its receiving end.
pub fn event_channel(capacity: usize) -> (mpsc::Sender<PipelineEvent>, ReceiverStream<PipelineEvent>) {
    let (tx, rx) = mpsc::channel(capacity);
    (tx, ReceiverStream::new(rx))
}

/// Fails unless `root` is a readable directory.
pub fn check_repository(root: &Path) -> PipelineResult<()> {
    let fatal = |reason: String| PipelineError::FatalPrecondition {
        path: root.to_path_buf(),
        reason,
    };
    let metadata = std::fs::metadata(root).map_err(|err| fatal(err.to_string()))?;
    if !metadata.is_dir() {
        return Err(fatal("not a directory".to_string()));
    }
    std::fs::read_dir(root).map_err(|err| fatal(err.to_string()))?;
    Ok(())
}

pub struct Pipeline {
    config: PipelineConfig,
    events: Option<mpsc::Sender<PipelineEvent>>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config, events: None }
    }

    /// Send state changes, detector completions and file outcomes to `events`.
    pub fn with_events(mut self, events: mpsc::Sender<PipelineEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn kinds(&self) -> Vec<FeatureKind> {
        self.config.features.enabled()
    }

    async fn set_state(&self, run_id: Uuid, state: PipelineState) {
        debug!(%run_id, ?state, "pipeline state changed");
        if let Some(events) = &self.events {
            let _ = events.send(PipelineEvent::StateChanged { run_id, state }).await;
        }
    }

    async fn detect_inner(&self, repo_root: &Path, cancel: CancellationToken) -> DetectionResult {
        let ctx = DetectionContext::new(repo_root, Arc::new(SharedCache::new()))
            .with_settings(self.config.detector.clone())
            .with_cancel(cancel);
        let mut coordinator = DetectorCoordinator::for_kinds(&self.kinds());
        if let Some(events) = &self.events {
            coordinator = coordinator.with_events(events.clone());
        }
        let ctx = Arc::new(ctx);
        let detection = coordinator.detect(Arc::clone(&ctx)).await;
        let stats = ctx.cache.stats();
        debug!(hits = stats.hits(), misses = stats.misses(), "cache statistics");
        detection
    }

    /// Runs the precondition check and detection only.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::FatalPrecondition` when `repo_root` is not a
    /// readable directory.
    pub async fn detect(&self, repo_root: &Path, cancel: CancellationToken) -> PipelineResult<DetectionResult> {
        check_repository(repo_root)?;
        Ok(self.detect_inner(repo_root, cancel).await)
    }

    /// Runs detection, transformation and generation for one repository.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::FatalPrecondition` when `repo_root` is not a
    /// readable directory. Every other problem is reported in the
    /// returned `RunReport`.
    #[instrument(skip_all, fields(repo = %repo_root.display(), output = %self.config.output_dir))]
    pub async fn run(&self, repo_root: &Path, cancel: CancellationToken) -> PipelineResult<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        self.set_state(run_id, PipelineState::Idle).await;

        if let Err(err) = check_repository(repo_root) {
            error!(error = %err, "precondition failed");
            self.set_state(run_id, PipelineState::Failed).await;
            return Err(err);
        }

        let kinds = self.kinds();
        info!(%run_id, kinds = ?kinds, "pipeline started");

        self.set_state(run_id, PipelineState::Detecting).await;
        let detection = self.detect_inner(repo_root, cancel).await;
        if detection.cancelled {
            info!("detection cancelled, continuing with partial results");
        }

        self.set_state(run_id, PipelineState::Transforming).await;
        let transform = TransformEngine::with_overrides(&self.config.mapping).transform(&detection, &kinds);

        self.set_state(run_id, PipelineState::Generating).await;
        let mut generator = CodeGenerator::new(&self.config.output_dir, self.config.generator.clone());
        if let Some(events) = &self.events {
            generator = generator.with_events(events.clone());
        }
        let mut generation = generator.generate(&transform).await;

        for kind in &kinds {
            generation.categories.entry(kind.to_string()).or_default().detected = detection.count(*kind);
        }
        let mut errors = detection.errors.clone();
        errors.append(&mut generation.errors);
        errors.sort();
        let mut warnings = detection.warnings.clone();
        warnings.extend(transform.metadata.warnings.iter().cloned());
        warnings.sort();
        generation.errors = errors;
        generation.warnings = warnings;

        self.set_state(run_id, PipelineState::Done).await;
        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            state: PipelineState::Done,
            cancelled: detection.cancelled,
            detection,
            transform: transform.metadata,
            generation,
        };
        info!(
            %run_id,
            files = report.generation.files.len(),
            errors = report.generation.errors.len(),
            warnings = report.generation.warnings.len(),
            "pipeline finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_missing_repository_fails_before_detection() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let (tx, stream) = event_channel(16);
        let pipeline = Pipeline::new(PipelineConfig::default()).with_events(tx);

        let result = pipeline.run(&temp_dir.path().join("missing"), CancellationToken::new()).await;
        drop(pipeline);

        assert!(matches!(result, Err(PipelineError::FatalPrecondition { .. })));
        let states: Vec<PipelineState> = stream
            .filter_map(|event| match event {
                PipelineEvent::StateChanged { state, .. } => Some(state),
                _ => None,
            })
            .collect()
            .await;
        assert_eq!(states, vec![PipelineState::Idle, PipelineState::Failed]);
    }

    #[tokio::test]
    async fn test_run_reports_state_progression() {
        let repo = tempdir().expect("Failed to create temp dir");
        let out = tempdir().expect("Failed to create temp dir");
        fs::write(
            repo.path().join("superclaude-personas.yml"),
            "personas:\n  - name: mentor\n    Identity: Educator\n    tools: [read]\n",
        )
        .expect("Failed to write personas");

        let mut config = PipelineConfig::default();
        config.output_dir = out.path().display().to_string();
        let (tx, stream) = event_channel(64);
        let pipeline = Pipeline::new(config).with_events(tx);

        let report = pipeline.run(repo.path(), CancellationToken::new()).await.expect("Run should succeed");
        drop(pipeline);

        assert_eq!(report.state, PipelineState::Done);
        assert_eq!(report.detection.personas.len(), 1);
        assert_eq!(report.generation.categories["personas"].detected, 1);
        assert!(out.path().join("agents/mentor.ts").is_file());

        let states: Vec<PipelineState> = stream
            .filter_map(|event| match event {
                PipelineEvent::StateChanged { state, .. } => Some(state),
                _ => None,
            })
            .collect()
            .await;
        assert_eq!(
            states,
            vec![
                PipelineState::Idle,
                PipelineState::Detecting,
                PipelineState::Transforming,
                PipelineState::Generating,
                PipelineState::Done,
            ]
        );
    }
}
