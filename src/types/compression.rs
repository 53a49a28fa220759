use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{Result, StdFileError};

/// Block compressors available for dataset payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    /// Zstandard compression
    #[default]
    Zstd,
    /// LZ4 compression
    Lz4,
    /// Snappy compression
    Snappy,
    /// No compression
    None,
}

impl CompressionAlgorithm {
    /// Whether this build can encode and decode the algorithm.
    pub fn is_available(&self) -> bool {
        match self {
            Self::Zstd => cfg!(feature = "zstd-compression"),
            Self::Lz4 => cfg!(feature = "lz4-compression"),
            Self::Snappy => cfg!(feature = "snappy-compression"),
            Self::None => true,
        }
    }

    /// Compresses `data`. `level` is only meaningful for zstd.
    pub fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>> {
        match self {
            Self::None => Ok(data.to_vec()),
            #[cfg(feature = "zstd-compression")]
            Self::Zstd => zstd::stream::encode_all(data, level)
                .map_err(|e| StdFileError::Compression(format!("zstd: {}", e))),
            #[cfg(feature = "lz4-compression")]
            Self::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
            #[cfg(feature = "snappy-compression")]
            Self::Snappy => snap::raw::Encoder::new()
                .compress_vec(data)
                .map_err(|e| StdFileError::Compression(format!("snappy: {}", e))),
            #[allow(unreachable_patterns)]
            other => {
                let _ = level;
                Err(StdFileError::Compression(format!(
                    "{} support is not enabled in this build",
                    other
                )))
            }
        }
    }

    /// Reverses [`CompressionAlgorithm::compress`].
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::None => Ok(data.to_vec()),
            #[cfg(feature = "zstd-compression")]
            Self::Zstd => zstd::stream::decode_all(data)
                .map_err(|e| StdFileError::Decompression(format!("zstd: {}", e))),
            #[cfg(feature = "lz4-compression")]
            Self::Lz4 => lz4_flex::decompress_size_prepended(data)
                .map_err(|e| StdFileError::Decompression(format!("lz4: {}", e))),
            #[cfg(feature = "snappy-compression")]
            Self::Snappy => snap::raw::Decoder::new()
                .decompress_vec(data)
                .map_err(|e| StdFileError::Decompression(format!("snappy: {}", e))),
            #[allow(unreachable_patterns)]
            other => Err(StdFileError::Decompression(format!(
                "{} support is not enabled in this build",
                other
            ))),
        }
    }
}

/// Per-dataset storage setting: which compressor and at what level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionSetting {
    /// Compressor applied to the dataset bytes on disk.
    pub algorithm: CompressionAlgorithm,
    /// Compression level (1-22 for zstd, ignored otherwise).
    pub level: i32,
}

impl CompressionSetting {
    /// Stored as-is.
    pub const NONE: CompressionSetting = CompressionSetting {
        algorithm: CompressionAlgorithm::None,
        level: 0,
    };

    /// Creates a setting for `algorithm` at `level`.
    pub fn new(algorithm: CompressionAlgorithm, level: i32) -> Self {
        Self { algorithm, level }
    }

    /// zstd at the given level.
    pub fn zstd(level: i32) -> Self {
        Self::new(CompressionAlgorithm::Zstd, level)
    }
}

impl Default for CompressionSetting {
    fn default() -> Self {
        Self::NONE
    }
}
