//! # sc-core
//!
//! Detection, transformation and generation pipeline for SuperCode.
//!
//! This crate provides:
//! - A run-scoped cache for file contents, parsed documents and patterns
//! - A tolerant parser for YAML, Markdown-hybrid and fenced-YAML documents
//! - Four feature detectors run concurrently by a coordinator
//! - A pure transformation engine driven by alias tables
//! - A code generator with dry-run, backup and conflict handling
//!
//! ## Modules
//!
//! - [`cache`]: `SharedCache`, keyed by path and modification time
//! - [`parser`]: `ConfigNode` trees and `@include` resolution
//! - [`detect`]: `Detector` trait, the four detectors and `DetectorCoordinator`
//! - [`transform`]: `TransformEngine` and `MappingTables`
//! - [`generator`]: Templates, `CodeGenerator` and the file writer
//! - [`config`]: Loading `supercode.toml`
//! - [`pipeline`]: `Pipeline::run` and the run state machine

pub mod cache;
pub mod config;
pub mod detect;
pub mod generator;
pub mod parser;
pub mod pipeline;
pub mod transform;
