//! Configuration loading and validation.
//!
//! This module locates and parses `supercode.toml` into the shared
//! `PipelineConfig` model.

pub mod error;
pub mod loader;

pub use error::ConfigError;
pub use error::ConfigResult;
pub use loader::load_config;
