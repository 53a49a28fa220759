// src/lib.rs

//! Standardized container files for fire-science benchmarks.
//!
//! A standard file is a typed tree ([`container`]) with a version and
//! provenance header ([`standard::header`]). On top of that:
//!
//! - [`digest`] computes a content digest of a tree,
//! - [`signing`] stores certificates binding that digest to a signer,
//! - [`seal`] protects small JSON result documents with an HMAC,
//! - [`standard::merge`] and [`standard::reduce`] combine independently
//!   produced files after checking them for conflicts.

pub mod api;
pub mod canonical;
pub mod config;
pub mod container;
pub mod digest;
pub mod error;
pub mod hash;
pub mod seal;
pub mod signing;
pub mod standard;
pub mod types;

pub use config::Config;
pub use container::{AttrValue, Container, ContainerFile, Dataset, Dtype, Group, Node};
pub use digest::digest_container;
pub use error::{Result, StdFileError};
pub use types::{CompressionAlgorithm, CompressionSetting, LogLevel};
