//! Errors raised while loading, overriding or validating a [`Config`](super::Config).

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration failures. Each one names the file, variable or field at fault.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("Cannot read config file {}: {source}", path.display())]
    Unreadable {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error("Failed to parse config file {}: {source}", path.display())]
    ParseError {
        /// File that was being parsed.
        path: PathBuf,
        /// Parser diagnostics.
        #[source]
        source: toml::de::Error,
    },

    /// Writing the config back out failed.
    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// I/O error while saving.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A `FIRESTD_*` override could not be applied.
    #[error("Environment override {var}={value} rejected: {reason}")]
    EnvOverride {
        /// Variable name.
        var: String,
        /// Raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A single setting is out of range.
    #[error("Invalid value for '{field}': '{value}'. {reason}")]
    InvalidValue {
        /// Dotted name of the setting, e.g. `compression.level`.
        field: String,
        /// Offending value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Settings that are fine alone but do not work together.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl ConfigError {
    /// Creates an [`ConfigError::InvalidValue`].
    pub fn invalid_value<S1, S2, S3>(field: S1, value: S2, reason: S3) -> Self
    where
        S1: Into<String>,
        S2: std::fmt::Display,
        S3: Into<String>,
    {
        ConfigError::InvalidValue {
            field: field.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates an [`ConfigError::EnvOverride`].
    pub fn env_override(var: &str, value: &str, reason: impl Into<String>) -> Self {
        ConfigError::EnvOverride {
            var: var.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a [`ConfigError::ValidationError`].
    pub fn validation_error<S: Into<String>>(message: S) -> Self {
        ConfigError::ValidationError(message.into())
    }
}
