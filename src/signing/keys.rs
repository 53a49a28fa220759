//! Signers and public-key resolution.
//!
//! Issuance needs something that can produce a detached signature
//! ([`Signer`]); verification needs something that maps a recorded `key_id`
//! to a public key ([`KeyResolver`]). Both are traits so that an agent-backed
//! or interactive signer and an organisation's key directory can be plugged in.
//! The built-in implementations use Ed25519 from `ring`.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair, UnparsedPublicKey, ED25519};

use super::armor::{armor, dearmor, KEY_ID_HEADER, PUBLIC_KEY_LABEL, SIGNATURE_LABEL};
use crate::error::{Result, StdFileError};
use crate::hash::sha256_hash;

/// Hex characters in a key id.
pub const KEY_ID_LEN: usize = 16;

/// Produces detached, armored signatures.
///
/// `sign_detached` may block (e.g. waiting on an agent or a passphrase
/// prompt). Any error aborts certificate issuance before anything is written.
pub trait Signer {
    /// Id of the key that signs.
    fn key_id(&self) -> &str;
    /// Human-readable signer identity.
    fn identity(&self) -> &str;
    /// Armored detached signature over `payload`.
    fn sign_detached(&self, payload: &[u8]) -> Result<String>;
}

/// Maps a key id to an armored public key.
pub trait KeyResolver {
    /// Armored public key for `key_id`, or [`StdFileError::KeyNotFound`].
    fn resolve(&self, key_id: &str) -> Result<String>;
}

/// Key id of a raw Ed25519 public key: first 16 hex chars of its SHA256, upper case.
pub fn key_id_for(public_key: &[u8]) -> String {
    let mut id = hex::encode_upper(sha256_hash(public_key));
    id.truncate(KEY_ID_LEN);
    id
}

fn check_key_id(key_id: &str) -> Result<()> {
    if key_id.is_empty() || !key_id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(StdFileError::invalid_input(format!("invalid key_id '{}'", key_id)));
    }
    Ok(())
}

/// Armors a raw Ed25519 public key.
pub fn armor_public_key(public_key: &[u8], identity: &str) -> String {
    let key_id = key_id_for(public_key);
    armor(
        PUBLIC_KEY_LABEL,
        &[(KEY_ID_HEADER, key_id.as_str()), ("Identity", identity)],
        public_key,
    )
}

/// Checks an armored detached signature over `payload`.
///
/// `expected_key_id` is the id recorded in the certificate; the public key and
/// the signature must both belong to it.
pub fn verify_detached(
    public_key_armored: &str,
    payload: &[u8],
    signature_armored: &str,
    expected_key_id: &str,
) -> Result<()> {
    let key = dearmor(PUBLIC_KEY_LABEL, public_key_armored)?;
    let derived = key_id_for(&key.body);
    if !derived.eq_ignore_ascii_case(expected_key_id) {
        return Err(StdFileError::signing(format!(
            "public key {} does not match key_id {}",
            derived, expected_key_id
        )));
    }
    let sig = dearmor(SIGNATURE_LABEL, signature_armored)?;
    if let Some(sig_key) = sig.key_id() {
        if !sig_key.eq_ignore_ascii_case(expected_key_id) {
            return Err(StdFileError::signing(format!(
                "signature made by {} not {}",
                sig_key, expected_key_id
            )));
        }
    }
    UnparsedPublicKey::new(&ED25519, &key.body)
        .verify(payload, &sig.body)
        .map_err(|_| StdFileError::signing("signature does not verify"))
}

/// Ed25519 signer backed by a PKCS#8 key.
pub struct Ed25519Signer {
    key_pair: Ed25519KeyPair,
    key_id: String,
    identity: String,
}

impl Ed25519Signer {
    /// Loads a signer from PKCS#8 v2 bytes (as produced by [`Ed25519Signer::generate`]).
    pub fn from_pkcs8(pkcs8: &[u8], identity: &str) -> Result<Self> {
        let key_pair = Ed25519KeyPair::from_pkcs8(pkcs8)
            .map_err(|e| StdFileError::signing(format!("rejected private key: {}", e)))?;
        let key_id = key_id_for(key_pair.public_key().as_ref());
        Ok(Self {
            key_pair,
            key_id,
            identity: identity.to_string(),
        })
    }

    /// Loads a signer from a PKCS#8 file.
    pub fn from_pkcs8_file<P: AsRef<Path>>(path: P, identity: &str) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StdFileError::NotFound(path.to_path_buf()),
            _ => StdFileError::Io(e),
        })?;
        Self::from_pkcs8(&bytes, identity)
    }

    /// Generates a fresh key. Returns the signer and its PKCS#8 bytes for storage.
    pub fn generate(identity: &str) -> Result<(Self, Vec<u8>)> {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng)
            .map_err(|_| StdFileError::signing("key generation failed"))?;
        let bytes = pkcs8.as_ref().to_vec();
        let signer = Self::from_pkcs8(&bytes, identity)?;
        Ok((signer, bytes))
    }

    /// Raw public key bytes.
    pub fn public_key(&self) -> &[u8] {
        self.key_pair.public_key().as_ref()
    }

    /// Armored public key, suitable for a [`KeyringDir`].
    pub fn public_key_armored(&self) -> String {
        armor_public_key(self.public_key(), &self.identity)
    }
}

impl fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("key_id", &self.key_id)
            .field("identity", &self.identity)
            .finish()
    }
}

impl Signer for Ed25519Signer {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    fn identity(&self) -> &str {
        &self.identity
    }

    fn sign_detached(&self, payload: &[u8]) -> Result<String> {
        let sig = self.key_pair.sign(payload);
        Ok(armor(
            SIGNATURE_LABEL,
            &[(KEY_ID_HEADER, self.key_id.as_str()), ("Signer", self.identity.as_str())],
            sig.as_ref(),
        ))
    }
}

/// Public keys stored as `<dir>/<key_id>.pub`.
#[derive(Debug, Clone)]
pub struct KeyringDir {
    dir: PathBuf,
}

impl KeyringDir {
    /// Keyring rooted at `dir`.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Directory holding the keys.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key_id: &str) -> PathBuf {
        self.dir.join(format!("{}.pub", key_id.to_ascii_uppercase()))
    }

    /// Stores an armored public key under the id derived from its body.
    pub fn install(&self, public_key_armored: &str) -> Result<String> {
        let key = dearmor(PUBLIC_KEY_LABEL, public_key_armored)?;
        let key_id = key_id_for(&key.body);
        fs::create_dir_all(&self.dir)?;
        fs::write(self.key_path(&key_id), public_key_armored)?;
        Ok(key_id)
    }
}

impl KeyResolver for KeyringDir {
    fn resolve(&self, key_id: &str) -> Result<String> {
        check_key_id(key_id)?;
        match fs::read_to_string(self.key_path(key_id)) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StdFileError::KeyNotFound(key_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory key map, mostly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyring {
    keys: HashMap<String, String>,
}

impl MemoryKeyring {
    /// Empty keyring.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an armored public key under `key_id`.
    pub fn insert(&mut self, key_id: &str, public_key_armored: String) {
        self.keys.insert(key_id.to_ascii_uppercase(), public_key_armored);
    }

    /// Adds the public half of `signer`.
    pub fn add_signer(&mut self, signer: &Ed25519Signer) {
        self.insert(signer.key_id(), signer.public_key_armored());
    }
}

impl KeyResolver for MemoryKeyring {
    fn resolve(&self, key_id: &str) -> Result<String> {
        self.keys
            .get(&key_id.to_ascii_uppercase())
            .cloned()
            .ok_or_else(|| StdFileError::KeyNotFound(key_id.to_string()))
    }
}
