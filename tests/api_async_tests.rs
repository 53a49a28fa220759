#![cfg(feature = "async")]

use assert_matches::assert_matches;
use firestd::api::AsyncStdFiles;
use firestd::signing::{Ed25519Signer, IssueRequest, KeyringDir, Signer};
use firestd::{Config, Dataset, StdFileError};
use std::time::Duration;
use tempfile::tempdir;

#[tokio::test]
async fn test_async_facade_end_to_end() {
    let dir = tempdir().unwrap();
    let (signer, pkcs8) = Ed25519Signer::generate("lab").unwrap();
    let key_path = dir.path().join("lab.pk8");
    std::fs::write(&key_path, &pkcs8).unwrap();
    let keyring = dir.path().join("keys");
    KeyringDir::new(&keyring)
        .install(&signer.public_key_armored())
        .unwrap();

    let mut config = Config::default();
    config.signing.private_key_path = Some(key_path.to_string_lossy().into_owned());
    config.signing.signer_identity = "lab".into();
    config.signing.keyring_dir = keyring.to_string_lossy().into_owned();
    let api = AsyncStdFiles::new(config);

    let a = dir.path().join("a.fstd");
    let b = dir.path().join("b.fstd");
    for (path, name) in [(&a, "/a"), (&b, "/b")] {
        let mut file = api.sync().create(path, "alice;", None, false).unwrap();
        file.container_mut()
            .unwrap()
            .insert(name, Dataset::from_vec(&[1.0f64]))
            .unwrap();
        file.close().unwrap();
    }

    let digest = api.digest(&a, vec!["/certificates".into()]).await.unwrap();
    let id = api.sign(&a, IssueRequest::new("qa", "s")).await.unwrap();
    assert_eq!(
        api.digest(&a, vec!["/certificates".into()]).await.unwrap(),
        digest
    );
    let report = api.verify(&a).await.unwrap();
    assert_eq!(report[0].cert_id, id);
    assert!(report[0].valid);
    assert_eq!(report[0].payload.as_ref().unwrap().key_id, signer.key_id());

    assert!(api.diff(&a, &b).await.unwrap().is_empty());
    let target = dir.path().join("m.fstd");
    api.merge_many(vec![a.clone(), b.clone()], &target).await.unwrap();
    assert!(target.exists());
}

#[tokio::test]
async fn test_sign_with_timeout_reports_signing_error() {
    let dir = tempdir().unwrap();
    let api = AsyncStdFiles::new(Config::default());
    let path = dir.path().join("a.fstd");
    api.sync()
        .create(&path, "alice;", None, false)
        .unwrap()
        .close()
        .unwrap();
    // no key configured: fails fast rather than timing out
    assert_matches!(
        api.sign_with_timeout(&path, IssueRequest::new("qa", "s"), Duration::from_secs(5))
            .await,
        Err(StdFileError::Signing(_))
    );
}
