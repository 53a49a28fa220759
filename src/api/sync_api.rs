// src/api/sync_api.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::config::Config;
use crate::container::{Container, ContainerFile};
use crate::digest::digest_with_options;
use crate::error::{Result, StdFileError};
use crate::seal::{load_sealed, persist_sealed, verify_seal};
use crate::signing::{
    issue_certificate, verify_certificates, verify_certificates_by_id, CertificateVerification,
    Ed25519Signer, IssueRequest, KeyringDir, Signer,
};
use crate::standard::header::{check_version, create_new_with, validate, NewFileOptions};
use crate::standard::merge::{collect_conflicts_with, Conflict};
use crate::standard::reduce::merge_many_with_progress;

/// Synchronous entry point bound to one [`Config`].
///
/// Every method opens the files it needs and releases them before returning.
#[derive(Debug, Clone, Default)]
pub struct StdFiles {
    config: Config,
}

impl StdFiles {
    /// Creates a facade over `config`.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// The bound configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates a new standard file and returns its open handle.
    pub fn create(
        &self,
        path: &Path,
        authors: &str,
        description: Option<&str>,
        overwrite: bool,
    ) -> Result<ContainerFile> {
        let options = NewFileOptions {
            overwrite,
            description: description.map(str::to_string),
            with_seconds: false,
        };
        create_new_with(path, authors, &options)
    }

    /// Reads a file and runs header validation and the version check.
    pub fn open_checked(&self, path: &Path) -> Result<Container> {
        let container = ContainerFile::open(path)?.into_container()?;
        let policy = self.config.version_policy();
        validate(&container, &policy)?;
        check_version(&container, &policy)?;
        Ok(container)
    }

    /// Content digest of the file at `path`.
    pub fn digest<S: AsRef<str>>(&self, path: &Path, exclude_prefixes: &[S]) -> Result<String> {
        let container = ContainerFile::open(path)?.into_container()?;
        Ok(digest_with_options(
            &container,
            &self.config.digest_options(exclude_prefixes),
        ))
    }

    /// Signer loaded from `signing.private_key_path`.
    pub fn signer(&self) -> Result<Ed25519Signer> {
        let key_path = self.config.signing.private_key_path.as_deref().ok_or_else(|| {
            StdFileError::signing("no signing.private_key_path configured")
        })?;
        Ed25519Signer::from_pkcs8_file(key_path, &self.config.signing.signer_identity)
    }

    /// Key resolver over `signing.keyring_dir`.
    pub fn keyring(&self) -> KeyringDir {
        KeyringDir::new(&self.config.signing.keyring_dir)
    }

    /// Issues a certificate with the configured signer.
    pub fn sign(&self, path: &Path, request: &IssueRequest) -> Result<String> {
        let signer = self.signer()?;
        self.sign_with(path, request, &signer)
    }

    /// Issues a certificate with an explicit signer.
    ///
    /// The file is only rewritten when signing succeeds.
    pub fn sign_with(&self, path: &Path, request: &IssueRequest, signer: &dyn Signer) -> Result<String> {
        let mut file = ContainerFile::open_rw(path)?;
        let mut container = file.container().clone();
        let cert_id = issue_certificate(&mut container, request, signer)?;
        file.replace(container)?;
        file.close()?;
        Ok(cert_id)
    }

    /// Verifies every certificate, keyed by certificate name.
    pub fn verify(&self, path: &Path) -> Result<BTreeMap<String, CertificateVerification>> {
        let container = ContainerFile::open(path)?.into_container()?;
        Ok(verify_certificates::<&str>(&container, &[], &self.keyring()))
    }

    /// Verifies every certificate, in cert_id order.
    pub fn verify_by_id(&self, path: &Path) -> Result<Vec<CertificateVerification>> {
        let container = ContainerFile::open(path)?.into_container()?;
        Ok(verify_certificates_by_id::<&str>(&container, &[], &self.keyring()))
    }

    /// Conflicts between two files under the configured merge policy.
    pub fn diff(&self, a: &Path, b: &Path) -> Result<Vec<Conflict>> {
        let left = self.open_checked(a)?;
        let right = self.open_checked(b)?;
        Ok(collect_conflicts_with(&left, &right, &self.config.merge_options()))
    }

    /// Folds `inputs` into `target`.
    pub fn merge_many(&self, inputs: &[PathBuf], target: &Path) -> Result<PathBuf> {
        self.merge_many_with_progress(inputs, target, |_, _| {})
    }

    /// Folds `inputs` into `target`, reporting progress per step.
    pub fn merge_many_with_progress<F>(&self, inputs: &[PathBuf], target: &Path, progress: F) -> Result<PathBuf>
    where
        F: FnMut(usize, usize),
    {
        merge_many_with_progress(
            inputs,
            target,
            &self.config.merge_options(),
            &self.config.version_policy(),
            progress,
        )
    }

    /// Seals `data` with the configured secret and writes it to `path`.
    pub fn seal_to(&self, path: &Path, data: &Map<String, Value>) -> Result<()> {
        persist_sealed(path, data, &self.config.secret_provider())
    }

    /// Whether the sealed document at `path` is intact.
    pub fn verify_sealed_file(&self, path: &Path) -> Result<bool> {
        let doc = load_sealed(path)?;
        Ok(verify_seal(&doc, &self.config.secret_provider()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Dataset;
    use tempfile::tempdir;

    #[test]
    fn test_sign_with_failing_signer_keeps_file() {
        struct Refuses;
        impl Signer for Refuses {
            fn key_id(&self) -> &str {
                "ABCDEF0123456789"
            }
            fn identity(&self) -> &str {
                "nobody"
            }
            fn sign_detached(&self, _: &[u8]) -> Result<String> {
                Err(StdFileError::signing("cancelled"))
            }
        }

        let dir = tempdir().unwrap();
        let path = dir.path().join("a.fstd");
        let api = StdFiles::default();
        let mut file = api.create(&path, "alice;", None, false).unwrap();
        file.container_mut().unwrap().insert("/x", Dataset::from_vec(&[1u8])).unwrap();
        file.close().unwrap();
        let before = std::fs::read(&path).unwrap();

        assert!(api.sign_with(&path, &IssueRequest::new("qa", "s"), &Refuses).is_err());
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_signer_requires_key_path() {
        assert!(matches!(StdFiles::default().signer(), Err(StdFileError::Signing(_))));
    }
}
