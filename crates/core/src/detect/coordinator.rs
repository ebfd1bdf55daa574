//! Concurrent detector orchestration.
//!
//! The `DetectorCoordinator` is responsible for:
//! - Running every registered detector as its own tokio task
//! - Folding each detector's output into one accumulator exactly once
//! - Surviving a panicking detector without losing the others
//! - Reporting detector completion on the optional event channel

use std::sync::Arc;

use sc_protocol::{DetectionResult, FeatureKind, IssueKind, PipelineEvent, PipelineIssue, Stage};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, instrument};

use super::{
    CommandDetector, CompressionDetector, DetectionContext, Detector, DetectorOutput, Features,
    PersonaDetector, ServerDetector,
};

/// Runs a fixed list of detectors over one repository snapshot.
pub struct DetectorCoordinator {
    detectors: Vec<Arc<dyn Detector>>,
    events: Option<mpsc::Sender<PipelineEvent>>,
}

#[derive(Default)]
struct Accumulator {
    result: DetectionResult,
}

impl Accumulator {
    fn absorb(&mut self, output: DetectorOutput) {
        match output.features {
            Features::Personas(personas) => self.result.personas = personas,
            Features::Commands(commands) => self.result.commands = commands,
            Features::Servers(servers) => self.result.servers = servers,
            Features::Compression(spec) => self.result.compression = spec,
        }
        for issue in output.issues {
            self.result.record(issue);
        }
        self.result.cancelled |= output.cancelled;
    }

    fn finish(mut self) -> DetectionResult {
        self.result.errors.sort();
        self.result.warnings.sort();
        self.result
    }
}

impl DetectorCoordinator {
    /// Create a coordinator over an explicit detector list.
    pub fn new(detectors: Vec<Arc<dyn Detector>>) -> Self {
        Self {
            detectors,
            events: None,
        }
    }

    /// The four built-in detectors, in canonical order.
    pub fn with_defaults() -> Self {
        Self::for_kinds(&FeatureKind::ALL)
    }

    /// The built-in detectors for the given categories only.
    pub fn for_kinds(kinds: &[FeatureKind]) -> Self {
        let detectors = FeatureKind::ALL
            .into_iter()
            .filter(|kind| kinds.contains(kind))
            .map(|kind| -> Arc<dyn Detector> {
                match kind {
                    FeatureKind::Personas => Arc::new(PersonaDetector),
                    FeatureKind::Commands => Arc::new(CommandDetector),
                    FeatureKind::Servers => Arc::new(ServerDetector),
                    FeatureKind::Compression => Arc::new(CompressionDetector),
                }
            })
            .collect();
        Self::new(detectors)
    }

    /// Send a `DetectorFinished` event for each completed detector.
    pub fn with_events(mut self, events: mpsc::Sender<PipelineEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn kinds(&self) -> Vec<FeatureKind> {
        self.detectors.iter().map(|detector| detector.kind()).collect()
    }

    /// Run every detector concurrently and wait for all of them.
    ///
    /// The result does not depend on completion order: each category is
    /// written by exactly one detector and issue lists are sorted.
    #[instrument(skip_all, fields(root = %ctx.repo_root.display(), detectors = self.detectors.len()))]
    pub async fn detect(&self, ctx: Arc<DetectionContext>) -> DetectionResult {
        let accumulator = Arc::new(Mutex::new(Accumulator::default()));
        let mut handles = Vec::with_capacity(self.detectors.len());

        for detector in &self.detectors {
            let detector = Arc::clone(detector);
            let ctx = Arc::clone(&ctx);
            let accumulator = Arc::clone(&accumulator);
            let events = self.events.clone();
            let kind = detector.kind();

            let handle = tokio::spawn(async move {
                let output = detector.detect(&ctx).await;
                notify(events.as_ref(), kind, &output).await;
                accumulator.lock().await.absorb(output);
            });
            handles.push((kind, handle));
        }

        for (kind, handle) in handles {
            if let Err(err) = handle.await {
                error!(%kind, error = %err, "detector task failed");
                accumulator.lock().await.result.record(
                    PipelineIssue::new(
                        IssueKind::Detection,
                        Stage::Detect,
                        format!("{kind} detector failed: {err}"),
                    )
                    .with_feature(kind),
                );
            }
        }

        let accumulator = std::mem::take(&mut *accumulator.lock().await);
        let result = accumulator.finish();
        info!(
            personas = result.personas.len(),
            commands = result.commands.len(),
            servers = result.servers.servers.len(),
            compression = result.compression.is_some(),
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "detection finished"
        );
        result
    }

    /// Run the detectors one after another on the current task.
    pub async fn detect_sequential(&self, ctx: &DetectionContext) -> DetectionResult {
        let mut accumulator = Accumulator::default();
        for detector in &self.detectors {
            let output = detector.detect(ctx).await;
            notify(self.events.as_ref(), detector.kind(), &output).await;
            accumulator.absorb(output);
        }
        accumulator.finish()
    }
}

impl Default for DetectorCoordinator {
    fn default() -> Self {
        Self::with_defaults()
    }
}

async fn notify(events: Option<&mpsc::Sender<PipelineEvent>>, kind: FeatureKind, output: &DetectorOutput) {
    debug!(%kind, features = output.features.len(), issues = output.issues.len(), "detector finished");
    if let Some(events) = events {
        let _ = events
            .send(PipelineEvent::DetectorFinished {
                kind,
                features: output.features.len(),
                issues: output.issues.len(),
                cancelled: output.cancelled,
            })
            .await;
    }
}
