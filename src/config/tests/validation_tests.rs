use crate::config::validation::validate_config;
use crate::config::{
    CompressionConfig, Config, ConfigError, DigestConfig, LoggingConfig, MergeConfig,
    SealingConfig, SigningConfig, VersioningConfig,
};
use crate::types::{CompressionAlgorithm, LogLevel};

fn create_test_config() -> Config {
    Config {
        compression: CompressionConfig {
            enabled: true,
            algorithm: CompressionAlgorithm::Zstd,
            level: 3,
        },
        logging: LoggingConfig {
            level: LogLevel::Info,
            console: true,
        },
        digest: DigestConfig { chunk_bytes: 1 << 20 },
        signing: SigningConfig::default(),
        sealing: SealingConfig::default(),
        versioning: VersioningConfig::default(),
        merge: MergeConfig::default(),
    }
}

#[test]
fn test_valid_config() {
    assert!(validate_config(&create_test_config()).is_ok());
}

#[test]
fn test_zero_chunk_bytes_rejected() {
    let mut config = create_test_config();
    config.digest.chunk_bytes = 0;
    let err = validate_config(&config).unwrap_err();
    match err {
        ConfigError::InvalidValue { field, .. } => assert_eq!(field, "digest.chunk_bytes"),
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_zstd_level_range() {
    let mut config = create_test_config();
    for level in [0, 23, -1] {
        config.compression.level = level;
        assert!(validate_config(&config).is_err(), "level {}", level);
    }
    for level in [1, 22] {
        config.compression.level = level;
        assert!(validate_config(&config).is_ok(), "level {}", level);
    }
    // level is irrelevant when compression is off
    config.compression.enabled = false;
    config.compression.level = 99;
    assert!(validate_config(&config).is_ok());
}

#[test]
fn test_level_ignored_for_other_algorithms() {
    let mut config = create_test_config();
    config.compression.algorithm = CompressionAlgorithm::None;
    config.compression.level = 7;
    assert!(validate_config(&config).is_ok());
}

#[test]
fn test_private_key_requires_identity() {
    let mut config = create_test_config();
    config.signing.private_key_path = Some("key.pk8".to_string());
    assert!(validate_config(&config).is_err());
    config.signing.signer_identity = "lab".to_string();
    assert!(validate_config(&config).is_ok());
}

#[test]
fn test_merge_paths_must_be_absolute() {
    let mut config = create_test_config();
    config.merge.ignore.insert("weather".to_string(), vec!["station".to_string()]);
    assert!(validate_config(&config).is_err());

    let mut config = create_test_config();
    config.merge.drop_prefixes = vec!["/".to_string()];
    assert!(validate_config(&config).is_err());
}

#[test]
fn test_console_off_is_only_a_warning() {
    let mut config = create_test_config();
    config.logging.console = false;
    assert!(validate_config(&config).is_ok());
}

#[test]
fn test_empty_secret_env_rejected() {
    let mut config = create_test_config();
    config.sealing.secret_env = " ".to_string();
    assert!(validate_config(&config).is_err());
}
