// src/hash.rs

use sha2::{Digest, Sha256};

/// Number of hex characters kept by [`short_hex_digest`].
pub const SHORT_ID_HEX_LEN: usize = 32;

/// Computes the SHA256 hash of the given data.
pub fn sha256_hash(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Lowercase hex SHA256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256_hash(data))
}

/// First 32 hex characters of the SHA256 of `data`.
///
/// Used for certificate ids, which must be reproducible from the payload alone.
pub fn short_hex_digest(data: &[u8]) -> String {
    let mut full = sha256_hex(data);
    full.truncate(SHORT_ID_HEX_LEN);
    full
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_short_hex_digest_is_prefix() {
        let short = short_hex_digest(b"hello world");
        assert_eq!(short.len(), SHORT_ID_HEX_LEN);
        assert_eq!(short, "b94d27b9934d3e08a52e52d7da7dabfa");
    }
}
