// src/api/async_api.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::api::sync_api::StdFiles;
use crate::config::Config;
use crate::error::{Result, StdFileError};
use crate::signing::{CertificateVerification, IssueRequest};
use crate::standard::merge::Conflict;

/// Async facade over [`StdFiles`].
///
/// Every operation is blocking file and CPU work, so each call runs on
/// tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct AsyncStdFiles {
    inner: Arc<StdFiles>,
}

impl AsyncStdFiles {
    /// Creates a facade over `config`.
    pub fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(StdFiles::new(config)),
        }
    }

    /// The underlying synchronous facade.
    pub fn sync(&self) -> &StdFiles {
        &self.inner
    }

    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&StdFiles) -> Result<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || op(&inner)).await?
    }

    /// See [`StdFiles::digest`].
    pub async fn digest(&self, path: &Path, exclude_prefixes: Vec<String>) -> Result<String> {
        let path = path.to_path_buf();
        self.run(move |api| api.digest(&path, &exclude_prefixes)).await
    }

    /// See [`StdFiles::sign`].
    pub async fn sign(&self, path: &Path, request: IssueRequest) -> Result<String> {
        let path = path.to_path_buf();
        self.run(move |api| api.sign(&path, &request)).await
    }

    /// [`AsyncStdFiles::sign`] bounded by `timeout`.
    ///
    /// Signing may wait on an agent or a human. On timeout the caller gets a
    /// [`StdFileError::Signing`] error, but the blocking task cannot be
    /// interrupted: if the signer eventually answers, the certificate is
    /// still written.
    pub async fn sign_with_timeout(
        &self,
        path: &Path,
        request: IssueRequest,
        timeout: Duration,
    ) -> Result<String> {
        match tokio::time::timeout(timeout, self.sign(path, request)).await {
            Ok(result) => result,
            Err(_) => {
                log::warn!(
                    "[Certificates] Signing {} did not finish within {:?}",
                    path.display(),
                    timeout
                );
                Err(StdFileError::signing(format!(
                    "signer did not answer within {:?}",
                    timeout
                )))
            }
        }
    }

    /// See [`StdFiles::verify_by_id`].
    pub async fn verify(&self, path: &Path) -> Result<Vec<CertificateVerification>> {
        let path = path.to_path_buf();
        self.run(move |api| api.verify_by_id(&path)).await
    }

    /// See [`StdFiles::diff`].
    pub async fn diff(&self, a: &Path, b: &Path) -> Result<Vec<Conflict>> {
        let (a, b) = (a.to_path_buf(), b.to_path_buf());
        self.run(move |api| api.diff(&a, &b)).await
    }

    /// See [`StdFiles::merge_many`].
    pub async fn merge_many(&self, inputs: Vec<PathBuf>, target: &Path) -> Result<PathBuf> {
        let target = target.to_path_buf();
        self.run(move |api| api.merge_many(&inputs, &target)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Dataset;
    use crate::signing::{Ed25519Signer, KeyringDir};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_sign_and_verify_async() {
        let dir = tempdir().unwrap();
        let (signer, pkcs8) = Ed25519Signer::generate("lab").unwrap();
        let key_path = dir.path().join("lab.pk8");
        std::fs::write(&key_path, &pkcs8).unwrap();
        let keyring = dir.path().join("keys");
        KeyringDir::new(&keyring).install(&signer.public_key_armored()).unwrap();

        let mut config = Config::default();
        config.signing.private_key_path = Some(key_path.to_string_lossy().into_owned());
        config.signing.signer_identity = "lab".into();
        config.signing.keyring_dir = keyring.to_string_lossy().into_owned();
        let api = AsyncStdFiles::new(config);

        let path = dir.path().join("a.fstd");
        let mut file = api.sync().create(&path, "alice;", None, false).unwrap();
        file.container_mut().unwrap().insert("/x", Dataset::from_vec(&[1.5f64])).unwrap();
        file.close().unwrap();

        let request = IssueRequest::new("qa", "bench/1");
        let id = api
            .sign_with_timeout(&path, request, Duration::from_secs(30))
            .await
            .unwrap();
        let report = api.verify(&path).await.unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].cert_id, id);
        assert!(report[0].valid);
    }

    #[tokio::test]
    async fn test_merge_many_reports_missing_input() {
        let dir = tempdir().unwrap();
        let api = AsyncStdFiles::new(Config::default());
        let err = api
            .merge_many(vec![dir.path().join("missing.fstd")], &dir.path().join("t.fstd"))
            .await
            .unwrap_err();
        assert!(matches!(err, StdFileError::NotFound(_)));
    }
}
