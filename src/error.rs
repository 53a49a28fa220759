//! Error types for the firestd toolkit
//!
//! This module defines the error types used throughout the crate. The main
//! error type is `StdFileError`. Each fatal condition the toolkit can raise has
//! its own variant so callers can branch on it without matching messages.
//!
//! Verification outcomes (certificate checks, seal checks, merge conflicts) are
//! *not* errors; they are returned as data by the functions that produce them.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the firestd toolkit
#[derive(Error, Debug)]
pub enum StdFileError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error (JSON): {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// A file that must not be clobbered already exists
    #[error("File already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    /// A required file does not exist
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A mandatory attribute is missing from a node
    #[error("Missing attribute '{name}' at '{path}'")]
    MissingAttribute {
        /// Path of the node that should carry the attribute.
        path: String,
        /// Name of the missing attribute.
        name: String,
    },

    /// A header attribute is present but unusable
    #[error("Invalid header attribute '{name}': {reason}")]
    InvalidHeader {
        /// Attribute name.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The file's `io_version` is neither current nor listed as compatible
    #[error("Incompatible io_version '{found}' (current is '{current}')")]
    IncompatibleVersion {
        /// Version found in the file.
        found: String,
        /// Version this build writes.
        current: String,
    },

    /// Merge was attempted on trees that still have conflicts
    #[error("Cannot merge: {count} unresolved conflict(s), first: {first}")]
    UnresolvedConflicts {
        /// Number of conflicts found.
        count: usize,
        /// Rendering of the first conflict.
        first: String,
    },

    /// An internal invariant was broken
    #[error("Internal consistency failure: {0}")]
    Internal(String),

    /// Producing a signature failed
    #[error("Signing error: {0}")]
    Signing(String),

    /// No public key is known for a key id
    #[error("Public key not found for key_id {0}")]
    KeyNotFound(String),

    /// Armored key or signature text could not be parsed
    #[error("Invalid armor: {0}")]
    InvalidArmor(String),

    /// The sealing secret could not be obtained
    #[error("Sealing secret unavailable: {0}")]
    SecretUnavailable(String),

    /// Invalid file format encountered (e.g., during header parsing)
    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    /// A node path is malformed or does not resolve
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Compression operation failed
    #[error("Compression error: {0}")]
    Compression(String),

    /// Decompression operation failed
    #[error("Decompression error: {0}")]
    Decompression(String),

    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for operations that can fail with a [StdFileError]
pub type Result<T> = std::result::Result<T, StdFileError>;

impl StdFileError {
    /// Create a new invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        StdFileError::InvalidInput(msg.into())
    }

    /// Create a new invalid path error
    pub fn invalid_path<S: Into<String>>(msg: S) -> Self {
        StdFileError::InvalidPath(msg.into())
    }

    /// Create a new invalid file format error
    pub fn invalid_format<S: Into<String>>(msg: S) -> Self {
        StdFileError::InvalidFileFormat(msg.into())
    }

    /// Create a new missing attribute error
    pub fn missing_attribute<P: Into<String>, N: Into<String>>(path: P, name: N) -> Self {
        StdFileError::MissingAttribute {
            path: path.into(),
            name: name.into(),
        }
    }

    /// Create a new invalid header error
    pub fn invalid_header<N: Into<String>, R: Into<String>>(name: N, reason: R) -> Self {
        StdFileError::InvalidHeader {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a new signing error
    pub fn signing<S: Into<String>>(msg: S) -> Self {
        StdFileError::Signing(msg.into())
    }

    /// Create a new internal consistency error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        StdFileError::Internal(msg.into())
    }
}

impl From<std::string::FromUtf8Error> for StdFileError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        StdFileError::InvalidFileFormat(format!("UTF-8 conversion error: {}", err))
    }
}

impl From<hex::FromHexError> for StdFileError {
    fn from(err: hex::FromHexError) -> Self {
        StdFileError::InvalidFileFormat(format!("hex decoding error: {}", err))
    }
}

#[cfg(feature = "async")]
impl From<tokio::task::JoinError> for StdFileError {
    fn from(err: tokio::task::JoinError) -> Self {
        StdFileError::Internal(format!("Async task error: {}", err))
    }
}
