//! Structured errors produced while loading and validating configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout this crate.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Structured errors emitted while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        /// Path of the config file that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file was not valid TOML.
    #[error("failed to parse config file '{path}': {source}")]
    ParseToml {
        /// Path of the config file that failed to parse.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A required environment variable was missing.
    #[error("missing required environment variable '{name}'")]
    MissingEnvVar {
        /// Name of the missing environment variable.
        name: &'static str,
    },

    /// A field failed validation.
    #[error("invalid value for '{field}': {message}")]
    InvalidField {
        /// Name of the field that failed validation.
        field: &'static str,
        /// Human-readable description of the problem.
        message: String,
    },
}
