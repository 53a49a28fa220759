// src/api/mod.rs

/// Synchronous facade bound to a configuration.
pub mod sync_api;

/// Tokio facade running the synchronous operations on the blocking pool.
#[cfg(feature = "async")]
pub mod async_api;

pub use sync_api::StdFiles;

#[cfg(feature = "async")]
pub use async_api::AsyncStdFiles;
