//! Configuration file loader for `supercode.toml`.
//!
//! The configuration is read from an explicit path, or discovered under the
//! working directory as `supercode.toml` and then `.supercode/config.toml`.
//! Without a file the defaults apply.

use std::path::{Path, PathBuf};

use sc_protocol::{FeatureKind, PipelineConfig};
use tracing::{debug, info};

use crate::config::error::{ConfigError, ConfigResult};

/// Discovery order under the working directory.
pub const CONFIG_CANDIDATES: [&str; 2] = ["supercode.toml", ".supercode/config.toml"];

/// The first existing candidate configuration file under `cwd`.
pub fn discover_config(cwd: &Path) -> Option<PathBuf> {
    CONFIG_CANDIDATES
        .iter()
        .map(|candidate| cwd.join(candidate))
        .find(|path| path.is_file())
}

/// Loads the pipeline configuration.
///
/// # Arguments
///
/// * `explicit` - A configuration path given by the caller; it must exist
/// * `cwd` - Directory searched for a configuration file when `explicit` is `None`
///
/// # Errors
///
/// Returns `ConfigError` if:
/// - The file exists (or was named explicitly) but cannot be read
/// - The file is not valid TOML for `PipelineConfig`
/// - A value fails validation (see [`validate_config`])
///
/// # Example
///
/// ```rust,no_run
/// use sc_core::config::loader::load_config;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(None, Path::new("."))?;
/// println!("Writing to {}", config.output_dir);
/// # Ok(())
/// # }
/// ```
pub fn load_config(explicit: Option<&Path>, cwd: &Path) -> ConfigResult<PipelineConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match discover_config(cwd) {
            Some(path) => path,
            None => {
                debug!(cwd = %cwd.display(), "no configuration file, using defaults");
                return Ok(PipelineConfig::default());
            }
        },
    };
    load_config_file(&path)
}

/// Reads, parses and validates one configuration file.
pub fn load_config_file(path: &Path) -> ConfigResult<PipelineConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let config: PipelineConfig = toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source,
    })?;

    validate_config(&config, path)?;
    info!(path = %path.display(), "configuration loaded");
    Ok(config)
}

/// Rejects unknown feature kinds, out-of-range temperatures, a zero write
/// concurrency and an empty output directory.
pub fn validate_config(config: &PipelineConfig, path: &Path) -> ConfigResult<()> {
    let invalid = |field: &'static str, reason: String| ConfigError::InvalidValue {
        path: path.to_path_buf(),
        field,
        reason,
    };

    if let Some(name) = config
        .features
        .include
        .iter()
        .chain(&config.features.exclude)
        .find(|name| !name.eq_ignore_ascii_case("all") && FeatureKind::parse(name).is_none())
    {
        return Err(ConfigError::UnknownFeature {
            path: path.to_path_buf(),
            name: name.clone(),
        });
    }

    let temperature = config.detector.default_temperature;
    if !(0.0..=2.0).contains(&temperature) {
        return Err(invalid("default_temperature", format!("{temperature} is outside [0, 2]")));
    }
    if config.generator.max_concurrency == 0 {
        return Err(invalid("max_concurrency", "must be at least 1".to_string()));
    }
    if config.output_dir.trim().is_empty() {
        return Err(invalid("output_dir", "must not be empty".to_string()));
    }
    Ok(())
}
