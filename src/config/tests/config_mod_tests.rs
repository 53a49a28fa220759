use super::*;
use serial_test::serial;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_config_default_values() {
    let cfg = Config::default();
    assert_eq!(cfg.digest.chunk_bytes, DEFAULT_CHUNK_BYTES);
    assert_eq!(cfg.sealing.secret_env, "FIRESTD_HMAC_SECRET");
    assert_eq!(cfg.merge.drop_prefixes, vec!["/certificates".to_string()]);
    assert_eq!(cfg.merge.ignore["/"].len(), 4);
    assert!(cfg.validate().is_ok());
}

#[test]
#[serial]
fn test_load_existing_file_and_missing_file() {
    let dir = tempdir().expect("create temp dir");
    let mut cfg = Config::default();
    cfg.logging.level = LogLevel::Debug;
    cfg.versioning.extra_compatible = vec!["0.9.0".to_string()];
    cfg.signing.private_key_path = Some("ops.pk8".to_string());
    cfg.signing.signer_identity = "ops".to_string();

    let config_path = dir.path().join("cfg.toml");
    cfg.save(&config_path).expect("save config");

    let loaded = Config::load(&config_path).expect("load existing config");
    assert_eq!(loaded, cfg);
    assert!(loaded.version_policy().is_recognized("0.9.0"));

    let missing_path = dir.path().join("missing.toml");
    let default_loaded = Config::load(&missing_path).expect("load missing");
    assert_eq!(default_loaded, Config::default());
}

#[test]
#[serial]
fn test_partial_file_keeps_other_defaults() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("partial.toml");
    fs::write(&path, "[digest]\nchunk_bytes = 1024\n").unwrap();
    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.digest.chunk_bytes, 1024);
    assert_eq!(loaded.compression, CompressionConfig::default());
}

#[test]
#[serial]
fn test_load_invalid_toml_fails() {
    let dir = tempdir().expect("create temp dir");
    let invalid_path = dir.path().join("bad.toml");
    fs::write(&invalid_path, "not = [valid\n").unwrap();

    let err = Config::load(&invalid_path).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError { ref path, .. } if path == &invalid_path));
    assert!(err.to_string().contains("bad.toml"));
}

#[test]
#[serial]
fn test_unknown_section_is_rejected() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("unknown.toml");
    fs::write(&path, "[storage]\nbase_path = \"x\"\n").unwrap();
    assert!(Config::load(&path).is_err());
}

#[test]
#[serial]
fn test_apply_env_vars() {
    std::env::set_var("FIRESTD_LOGGING_LEVEL", "debug");
    std::env::set_var("FIRESTD_DIGEST_CHUNK_BYTES", "4096");
    std::env::set_var("FIRESTD_COMPRESSION_ALGORITHM", "LZ4");
    let mut cfg = Config::default();
    cfg.apply_env_vars().unwrap();
    assert_eq!(cfg.logging.level, LogLevel::Debug);
    assert_eq!(cfg.digest.chunk_bytes, 4096);
    assert_eq!(cfg.compression.algorithm, CompressionAlgorithm::Lz4);
    std::env::remove_var("FIRESTD_LOGGING_LEVEL");
    std::env::remove_var("FIRESTD_DIGEST_CHUNK_BYTES");
    std::env::remove_var("FIRESTD_COMPRESSION_ALGORITHM");

    std::env::set_var("FIRESTD_COMPRESSION_LEVEL", "high");
    let mut cfg = Config::default();
    let err = cfg.apply_env_vars();
    assert!(matches!(err, Err(ConfigError::EnvOverride { ref var, .. }) if var == "FIRESTD_COMPRESSION_LEVEL"));
    std::env::remove_var("FIRESTD_COMPRESSION_LEVEL");
}

#[test]
fn test_derived_options() {
    let mut cfg = Config::default();
    cfg.compression.enabled = false;
    assert_eq!(cfg.merge_options().compression, None);
    assert!(cfg.merge_options().ignore.is_ignored("/", "created_by"));
    assert_eq!(cfg.digest_options(&["/certificates"]).exclude_prefixes, vec!["/certificates"]);
}

#[test]
fn test_config_dir_returns_valid_path() {
    if let Some(path) = Config::config_dir() {
        let name = path.to_string_lossy().to_lowercase();
        assert!(name.contains("firestd"));
    }
}
