//! Pipeline configuration models for `supercode.toml`.
//!
//! This module defines the structure of the configuration file that selects
//! feature categories, the output root, generator policy flags, detector
//! defaults and alias-table extensions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::detection_models::FeatureKind;

pub const DEFAULT_OUTPUT_DIR: &str = "./supercode-output";
pub const DEFAULT_MODEL: &str = "claude-3-opus";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Represents the full pipeline configuration.
///
/// # Example
///
/// ```toml
/// output_dir = "./supercode-output"
///
/// [features]
/// include = ["all"]
/// exclude = ["compression"]
///
/// [generator]
/// dry_run = false
/// backup = true
/// force = false
///
/// [mapping.models]
/// "claude-4-opus" = "anthropic/claude-opus-4"
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(default)]
pub struct PipelineConfig {
    pub features: FeatureSelection,
    pub output_dir: String,
    pub generator: GeneratorSettings,
    pub detector: DetectorSettings,
    pub mapping: MappingOverrides,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            features: FeatureSelection::default(),
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
            generator: GeneratorSettings::default(),
            detector: DetectorSettings::default(),
            mapping: MappingOverrides::default(),
        }
    }
}

/// Which feature categories to run. `include = ["all"]` selects every category.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(default)]
pub struct FeatureSelection {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Default for FeatureSelection {
    fn default() -> Self {
        Self {
            include: vec!["all".to_string()],
            exclude: Vec::new(),
        }
    }
}

impl FeatureSelection {
    /// Resolves the selection to concrete kinds, in canonical order.
    ///
    /// Unknown names are ignored here; the configuration loader rejects them.
    pub fn enabled(&self) -> Vec<FeatureKind> {
        let include_all = self.include.is_empty()
            || self
                .include
                .iter()
                .any(|name| name.eq_ignore_ascii_case("all"));
        let included: Vec<FeatureKind> = self
            .include
            .iter()
            .filter_map(|name| FeatureKind::parse(name))
            .collect();
        let excluded: Vec<FeatureKind> = self
            .exclude
            .iter()
            .filter_map(|name| FeatureKind::parse(name))
            .collect();

        FeatureKind::ALL
            .into_iter()
            .filter(|kind| include_all || included.contains(kind))
            .filter(|kind| !excluded.contains(kind))
            .collect()
    }

    pub fn is_enabled(&self, kind: FeatureKind) -> bool {
        self.enabled().contains(&kind)
    }
}

/// Generator policy flags.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(default)]
pub struct GeneratorSettings {
    /// Compute the planned file set without touching the filesystem.
    pub dry_run: bool,
    /// Copy existing content to a timestamped backup before overwriting.
    pub backup: bool,
    /// Overwrite changed files instead of reporting conflicts.
    pub force: bool,
    /// Upper bound on concurrent file writes.
    pub max_concurrency: usize,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            dry_run: false,
            backup: true,
            force: false,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// Fixed defaults applied to detected features with missing optional fields.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(default)]
pub struct DetectorSettings {
    pub default_model: String,
    pub default_temperature: f64,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL.to_string(),
            default_temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Extensions to the built-in alias tables. Entries here take precedence.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, TS)]
#[serde(default)]
pub struct MappingOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    pub models: BTreeMap<String, String>,
    pub tools: BTreeMap<String, String>,
    pub categories: BTreeMap<String, String>,
}
