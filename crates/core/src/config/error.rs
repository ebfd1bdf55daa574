//! Errors raised while loading `supercode.toml`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file was named or discovered but could not be read.
    #[error("Cannot read configuration {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Configuration {path} is not valid TOML: {source}")]
    TomlParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A feature selection names a kind the pipeline does not know.
    #[error(
        "Configuration {path}: unknown feature kind `{name}` (expected one of: all, personas, commands, servers, compression)"
    )]
    UnknownFeature { path: PathBuf, name: String },

    /// A setting parsed but is outside its accepted range.
    #[error("Configuration {path}: `{field}` {reason}")]
    InvalidValue {
        path: PathBuf,
        field: &'static str,
        reason: String,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;
