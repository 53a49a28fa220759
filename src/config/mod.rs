//! Configuration management for firestd
//!
//! This module handles loading, validating, and providing access to the
//! toolkit configuration. Settings come from a TOML file, then `FIRESTD_`
//! environment variables override individual values.

#![deny(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod validation;

#[cfg(test)]
#[path = "tests/validation_tests.rs"]
mod validation_tests;

#[cfg(test)]
#[path = "tests/config_mod_tests.rs"]
mod config_mod_tests;

use std::collections::BTreeMap;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::digest::{DigestOptions, DEFAULT_CHUNK_BYTES};
use crate::seal::{EnvSecret, DEFAULT_SECRET_ENV};
use crate::signing::CERTIFICATES_ROOT;
use crate::standard::header::{
    VersionPolicy, ATTR_CREATED_BY, ATTR_CREATED_ON, ATTR_DESCRIPTION, ATTR_IO_VERSION,
};
use crate::standard::merge::{IgnorePolicy, MergeOptions};
use crate::types::{CompressionAlgorithm, CompressionSetting, LogLevel};

/// Re-export the error type
pub use error::ConfigError;

/// The environment variable prefix for configuration overrides
const ENV_PREFIX: &str = "FIRESTD_";

/// The application name used for finding config directories
const APP_NAME: &str = "firestd";

/// Main configuration structure for firestd.
///
/// # Example
///
/// ```no_run
/// use firestd::config::Config;
///
/// // A missing file falls back to defaults.
/// let config = Config::load("firestd.toml").unwrap();
/// let policy = config.version_policy();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Dataset compression used when writing merged files
    pub compression: CompressionConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Digest engine settings
    pub digest: DigestConfig,
    /// Certificate signing and key lookup
    pub signing: SigningConfig,
    /// HMAC sealing
    pub sealing: SealingConfig,
    /// Accepted `io_version` values
    pub versioning: VersioningConfig,
    /// Diff/merge behaviour
    pub merge: MergeConfig,
}

/// Compression configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Whether compression is enabled
    pub enabled: bool,
    /// Compression algorithm to use
    pub algorithm: CompressionAlgorithm,
    /// Compression level (1-22 for zstd, ignored otherwise)
    pub level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            algorithm: CompressionAlgorithm::Zstd,
            level: 4,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Whether to log to console
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            console: true,
        }
    }
}

/// Digest engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    /// Upper bound on bytes fed to the hash per update
    pub chunk_bytes: usize,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            chunk_bytes: DEFAULT_CHUNK_BYTES,
        }
    }
}

/// Signing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Directory of `<KEYID>.pub` files used to verify certificates
    pub keyring_dir: String,
    /// PKCS#8 private key used to sign
    pub private_key_path: Option<String>,
    /// Identity recorded alongside signatures
    pub signer_identity: String,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            keyring_dir: "./keyring".to_string(),
            private_key_path: None,
            signer_identity: String::new(),
        }
    }
}

/// Sealing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SealingConfig {
    /// Environment variable holding the HMAC secret
    pub secret_env: String,
}

impl Default for SealingConfig {
    fn default() -> Self {
        Self {
            secret_env: DEFAULT_SECRET_ENV.to_string(),
        }
    }
}

/// Version policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VersioningConfig {
    /// Versions accepted in addition to the built-in compatible list
    pub extra_compatible: Vec<String>,
}

/// Merge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Attributes exempt from comparison, by node path
    pub ignore: BTreeMap<String, Vec<String>>,
    /// Subtrees left out of merged output
    pub drop_prefixes: Vec<String>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        let header = [ATTR_CREATED_ON, ATTR_CREATED_BY, ATTR_IO_VERSION, ATTR_DESCRIPTION];
        let mut ignore = BTreeMap::new();
        ignore.insert("/".to_string(), header.iter().map(|s| s.to_string()).collect());
        Self {
            ignore,
            drop_prefixes: vec![CERTIFICATES_ROOT.to_string()],
        }
    }
}

impl Config {
    /// Loads the configuration from `path`.
    ///
    /// A missing file yields the defaults. In both cases `FIRESTD_`
    /// environment overrides are applied and the result is validated.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or if
    /// the resulting configuration is invalid.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = match fs::read_to_string(path) {
            Ok(text) => toml::from_str::<Config>(&text).map_err(|source| ConfigError::ParseError {
                path: path.to_path_buf(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("Config file not found at {}, using defaults", path.display());
                Self::default()
            }
            Err(source) => {
                return Err(ConfigError::Unreadable {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        config.apply_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the configuration as TOML.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let text = toml::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Applies environment variable overrides to the configuration.
    ///
    /// Environment variables are prefixed with `FIRESTD_` and name the section
    /// and key, e.g. `FIRESTD_LOGGING_LEVEL=debug`.
    ///
    /// # Errors
    ///
    /// Returns an error if any recognised variable cannot be parsed.
    pub fn apply_env_vars(&mut self) -> Result<(), ConfigError> {
        for (key, value) in env::vars() {
            let Some(stripped) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match stripped.to_lowercase().as_str() {
                "logging_level" => {
                    self.logging.level = value.parse().map_err(|_| {
                        ConfigError::env_override(&key, value, "not a log level")
                    })?;
                }
                "compression_algorithm" => {
                    self.compression.algorithm = value.parse().map_err(|_| {
                        ConfigError::env_override(&key, value, "expected one of zstd, lz4, snappy, none")
                    })?;
                }
                "compression_level" => {
                    self.compression.level = value.parse().map_err(|_| {
                        ConfigError::env_override(&key, value, "expected an integer")
                    })?;
                }
                "signing_keyring_dir" => {
                    self.signing.keyring_dir = value.to_string();
                }
                "digest_chunk_bytes" => {
                    self.digest.chunk_bytes = value.parse().map_err(|_| {
                        ConfigError::env_override(&key, value, "expected a byte count")
                    })?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validation::validate_config(self)
    }

    /// Returns the path to the directory where configuration files should be stored.
    ///
    /// This is OS-specific:
    /// - Linux: `$HOME/.config/firestd`
    /// - macOS: `$HOME/Library/Application Support/org.firestd.firestd`
    /// - Windows: `%APPDATA%\\firestd\\firestd`
    pub fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("org", APP_NAME, APP_NAME)
            .map(|proj_dirs| proj_dirs.config_dir().to_path_buf())
    }

    /// Storage for newly written datasets, or `None` when compression is off.
    pub fn compression_setting(&self) -> Option<CompressionSetting> {
        if !self.compression.enabled {
            return None;
        }
        Some(CompressionSetting::new(
            self.compression.algorithm,
            self.compression.level,
        ))
    }

    /// Digest options with the configured chunk size.
    pub fn digest_options<S: AsRef<str>>(&self, exclude_prefixes: &[S]) -> DigestOptions {
        DigestOptions::excluding(exclude_prefixes).with_chunk_bytes(self.digest.chunk_bytes)
    }

    /// Version policy with the configured extra versions.
    pub fn version_policy(&self) -> VersionPolicy {
        VersionPolicy::with_extra_compatible(&self.versioning.extra_compatible)
    }

    /// Merge options built from the `merge` and `compression` sections.
    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            ignore: IgnorePolicy::from_map(self.merge.ignore.clone()),
            compression: self.compression_setting(),
            drop_prefixes: self.merge.drop_prefixes.clone(),
        }
    }

    /// Secret provider for sealing.
    pub fn secret_provider(&self) -> EnvSecret {
        EnvSecret::new(&self.sealing.secret_env)
    }
}
