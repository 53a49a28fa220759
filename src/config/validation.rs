//! Configuration validation for firestd
//!
//! This module contains functions for validating the configuration to ensure
//! all values are within acceptable ranges and consistent with each other.

use super::error::ConfigError;
use super::{
    CompressionConfig, Config, DigestConfig, LoggingConfig, MergeConfig, SealingConfig,
    SigningConfig,
};
use crate::types::CompressionAlgorithm;

const ZSTD_MIN_LEVEL: i32 = 1;
const ZSTD_MAX_LEVEL: i32 = 22;

/// Validates the configuration.
///
/// Checks every section, then the settings that depend on each other.
///
/// # Errors
///
/// Returns a `ConfigError` for the first check that fails.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    validate_compression_config(&config.compression)?;
    validate_logging_config(&config.logging)?;
    validate_digest_config(&config.digest)?;
    validate_signing_config(&config.signing)?;
    validate_sealing_config(&config.sealing)?;
    validate_merge_config(&config.merge)?;
    validate_cross_section(config)?;
    Ok(())
}

/// Validates the compression configuration.
fn validate_compression_config(config: &CompressionConfig) -> Result<(), ConfigError> {
    if !config.enabled {
        return Ok(());
    }

    match config.algorithm {
        CompressionAlgorithm::Zstd => {
            if config.level < ZSTD_MIN_LEVEL || config.level > ZSTD_MAX_LEVEL {
                return Err(ConfigError::invalid_value(
                    "compression.level",
                    config.level,
                    format!(
                        "Zstd compression level must be between {} and {}",
                        ZSTD_MIN_LEVEL, ZSTD_MAX_LEVEL
                    ),
                ));
            }
            if config.level >= 15 {
                log::warn!(
                    "Using high Zstd compression level ({}). Merges of large files will be slow.",
                    config.level
                );
            }
        }
        CompressionAlgorithm::Lz4 | CompressionAlgorithm::Snappy | CompressionAlgorithm::None => {
            if config.level != 0 {
                log::info!(
                    "Compression level {} is ignored for {}",
                    config.level,
                    config.algorithm
                );
            }
        }
    }
    Ok(())
}

/// Validates the logging configuration.
fn validate_logging_config(config: &LoggingConfig) -> Result<(), ConfigError> {
    if !config.console {
        log::warn!("Console logging is disabled. No logs will be captured.");
    }
    Ok(())
}

/// Validates the digest configuration.
fn validate_digest_config(config: &DigestConfig) -> Result<(), ConfigError> {
    if config.chunk_bytes == 0 {
        return Err(ConfigError::invalid_value(
            "digest.chunk_bytes",
            config.chunk_bytes,
            "chunk_bytes must be greater than 0",
        ));
    }
    Ok(())
}

/// Validates the signing configuration.
fn validate_signing_config(config: &SigningConfig) -> Result<(), ConfigError> {
    if config.keyring_dir.trim().is_empty() {
        return Err(ConfigError::invalid_value(
            "signing.keyring_dir",
            "",
            "Keyring directory cannot be empty",
        ));
    }
    if config.private_key_path.is_some() && config.signer_identity.trim().is_empty() {
        return Err(ConfigError::invalid_value(
            "signing.signer_identity",
            "",
            "A signer identity is required when private_key_path is set",
        ));
    }
    Ok(())
}

/// Validates the sealing configuration.
fn validate_sealing_config(config: &SealingConfig) -> Result<(), ConfigError> {
    if config.secret_env.trim().is_empty() {
        return Err(ConfigError::invalid_value(
            "sealing.secret_env",
            "",
            "Secret variable name cannot be empty",
        ));
    }
    Ok(())
}

/// Validates the merge configuration.
fn validate_merge_config(config: &MergeConfig) -> Result<(), ConfigError> {
    for path in config.ignore.keys() {
        if !path.starts_with('/') {
            return Err(ConfigError::invalid_value(
                "merge.ignore",
                path,
                "Ignore paths must be absolute",
            ));
        }
    }
    for prefix in &config.drop_prefixes {
        if !prefix.starts_with('/') {
            return Err(ConfigError::invalid_value(
                "merge.drop_prefixes",
                prefix,
                "Drop prefixes must be absolute",
            ));
        }
        if prefix.trim_matches('/').is_empty() {
            return Err(ConfigError::invalid_value(
                "merge.drop_prefixes",
                prefix,
                "Dropping the root would discard every input",
            ));
        }
    }
    Ok(())
}

/// Performs cross-section validation of the configuration.
fn validate_cross_section(config: &Config) -> Result<(), ConfigError> {
    if config.compression.enabled && !config.compression.algorithm.is_available() {
        return Err(ConfigError::validation_error(format!(
            "{} compression requires the '{}-compression' feature to be enabled",
            config.compression.algorithm,
            config.compression.algorithm
        )));
    }
    Ok(())
}
