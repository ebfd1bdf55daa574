//! # sc-protocol
//!
//! Shared data models for the SuperCode conversion pipeline.
//!
//! This crate defines the structures exchanged between pipeline stages and
//! handed to reporting layers:
//! - Detected features (personas, commands, protocol servers, compression rules)
//! - Detection results and the non-fatal issue taxonomy
//! - Artifact descriptors and rendered files
//! - Generation outcomes, run state and progress events
//! - Pipeline configuration from `supercode.toml`
//!
//! ## Modules
//!
//! - [`feature_models`]: Typed features produced by detectors
//! - [`detection_models`]: `DetectionResult`, `PipelineIssue`, `FeatureKind`
//! - [`artifact_models`]: `ArtifactDescriptor`, `GeneratedFile`, `TransformResult`
//! - [`report_models`]: `GenerationSummary`, `PipelineState`, `PipelineEvent`, `RunReport`
//! - [`config_models`]: `PipelineConfig` and its sections
//!
//! ## Design Principles
//!
//! - Minimal dependencies: serde, ts-rs, uuid and chrono only
//! - TypeScript generation: all types derive `TS` for client compatibility
//! - Independent compilation: no dependencies on other workspace crates

pub mod artifact_models;
pub mod config_models;
pub mod detection_models;
pub mod feature_models;
pub mod report_models;

// Re-export all public types for convenience
pub use artifact_models::*;
pub use config_models::*;
pub use detection_models::*;
pub use feature_models::*;
pub use report_models::*;
