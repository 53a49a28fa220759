//! Shared value types for firestd

mod compression;
mod log_level;

pub use compression::{CompressionAlgorithm, CompressionSetting};
pub use log_level::LogLevel;
