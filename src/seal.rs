//! HMAC output sealing.
//!
//! A sealed document is a JSON object with one extra key, `mac`, holding the
//! lowercase hex HMAC-SHA256 of the canonical encoding of every other key.
//! Sealing fails closed when no secret is available; checking a seal never
//! fails, it answers `true` or `false`.

use std::fs;
use std::path::Path;

use ring::hmac;
use serde_json::{Map, Value};

use crate::canonical::{sorted_value, to_canonical_bytes};
use crate::error::{Result, StdFileError};

/// Reserved key holding the MAC.
pub const MAC_KEY: &str = "mac";

/// Environment variable read by [`EnvSecret::default`].
pub const DEFAULT_SECRET_ENV: &str = "FIRESTD_HMAC_SECRET";

/// Supplies the process-wide sealing secret.
pub trait SecretProvider {
    /// The secret bytes, or [`StdFileError::SecretUnavailable`].
    fn secret(&self) -> Result<Vec<u8>>;
}

/// Secret read from an environment variable on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvSecret {
    /// Variable name
    pub var: String,
}

impl EnvSecret {
    /// Provider reading `var`.
    pub fn new(var: &str) -> Self {
        Self {
            var: var.to_string(),
        }
    }
}

impl Default for EnvSecret {
    fn default() -> Self {
        Self::new(DEFAULT_SECRET_ENV)
    }
}

impl SecretProvider for EnvSecret {
    fn secret(&self) -> Result<Vec<u8>> {
        match std::env::var(&self.var) {
            Ok(v) if !v.is_empty() => Ok(v.into_bytes()),
            Ok(_) => Err(StdFileError::SecretUnavailable(format!("{} is empty", self.var))),
            Err(_) => Err(StdFileError::SecretUnavailable(format!("{} is not set", self.var))),
        }
    }
}

/// Fixed in-memory secret.
#[derive(Clone)]
pub struct StaticSecret(Vec<u8>);

impl StaticSecret {
    /// Wraps `secret`. An empty secret is treated as unavailable.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(secret.into())
    }
}

impl std::fmt::Debug for StaticSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticSecret(..)")
    }
}

impl SecretProvider for StaticSecret {
    fn secret(&self) -> Result<Vec<u8>> {
        if self.0.is_empty() {
            return Err(StdFileError::SecretUnavailable("static secret is empty".into()));
        }
        Ok(self.0.clone())
    }
}

fn mac_input(data: &Map<String, Value>) -> Result<Vec<u8>> {
    let mut body = data.clone();
    body.remove(MAC_KEY);
    to_canonical_bytes(&Value::Object(body))
}

/// Returns `data` plus a `mac` entry. An existing `mac` is replaced.
pub fn seal(data: &Map<String, Value>, provider: &dyn SecretProvider) -> Result<Map<String, Value>> {
    let secret = provider.secret()?;
    let key = hmac::Key::new(hmac::HMAC_SHA256, &secret);
    let tag = hmac::sign(&key, &mac_input(data)?);
    let mut sealed = data.clone();
    sealed.insert(MAC_KEY.to_string(), Value::String(hex::encode(tag.as_ref())));
    Ok(sealed)
}

/// Whether `signed` carries a valid `mac`. Never errors.
pub fn verify_seal(signed: &Map<String, Value>, provider: &dyn SecretProvider) -> bool {
    let Some(Value::String(stored)) = signed.get(MAC_KEY) else {
        return false;
    };
    let Ok(tag) = hex::decode(stored) else {
        return false;
    };
    let secret = match provider.secret() {
        Ok(s) => s,
        Err(e) => {
            log::warn!("[Seal] Cannot check seal: {}", e);
            return false;
        }
    };
    let Ok(input) = mac_input(signed) else {
        return false;
    };
    let key = hmac::Key::new(hmac::HMAC_SHA256, &secret);
    hmac::verify(&key, &input, &tag).is_ok()
}

/// Seals `data` and writes it as indented, key-sorted JSON.
pub fn persist_sealed<P: AsRef<Path>>(
    path: P,
    data: &Map<String, Value>,
    provider: &dyn SecretProvider,
) -> Result<()> {
    let sealed = seal(data, provider)?;
    let mut text = serde_json::to_string_pretty(&sorted_value(&Value::Object(sealed)))?;
    text.push('\n');
    fs::write(path.as_ref(), text)?;
    log::debug!("[Seal] Wrote sealed output {}", path.as_ref().display());
    Ok(())
}

/// Reads a sealed (or any) JSON object document.
pub fn load_sealed<P: AsRef<Path>>(path: P) -> Result<Map<String, Value>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => StdFileError::NotFound(path.to_path_buf()),
        _ => StdFileError::Io(e),
    })?;
    match serde_json::from_str(&text)? {
        Value::Object(map) => Ok(map),
        other => Err(StdFileError::invalid_format(format!(
            "{} holds a JSON {} instead of an object",
            path.display(),
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Map<String, Value> {
        match json!({"ros": 0.42, "model": "rothermel", "runs": [1, 2, 3]}) {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_seal_round_trip() {
        let secret = StaticSecret::new("k1");
        let sealed = seal(&doc(), &secret).unwrap();
        assert_eq!(sealed[MAC_KEY].as_str().unwrap().len(), 64);
        assert!(verify_seal(&sealed, &secret));
        assert!(!verify_seal(&sealed, &StaticSecret::new("k2")));
    }

    #[test]
    fn test_tampering_breaks_seal() {
        let secret = StaticSecret::new("k1");
        let mut sealed = seal(&doc(), &secret).unwrap();
        sealed.insert("model".into(), json!("rothermeL"));
        assert!(!verify_seal(&sealed, &secret));
    }

    #[test]
    fn test_missing_or_garbled_mac_is_false() {
        let secret = StaticSecret::new("k1");
        assert!(!verify_seal(&doc(), &secret));
        let mut bad = doc();
        bad.insert(MAC_KEY.into(), json!("zz"));
        assert!(!verify_seal(&bad, &secret));
        bad.insert(MAC_KEY.into(), json!(7));
        assert!(!verify_seal(&bad, &secret));
    }

    #[test]
    fn test_seal_fails_closed_without_secret() {
        let err = seal(&doc(), &StaticSecret::new(Vec::new())).unwrap_err();
        assert!(matches!(err, StdFileError::SecretUnavailable(_)));
    }

    #[test]
    fn test_resealing_replaces_mac() {
        let secret = StaticSecret::new("k1");
        let once = seal(&doc(), &secret).unwrap();
        let twice = seal(&once, &secret).unwrap();
        assert_eq!(once, twice);
    }
}
