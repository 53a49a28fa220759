use assert_matches::assert_matches;
use firestd::container::file::{read_container, write_container};
use firestd::{
    AttrValue, CompressionAlgorithm, CompressionSetting, Container, ContainerFile, Dataset, Group,
    StdFileError,
};
use tempfile::tempdir;

fn sample() -> Container {
    let mut c = Container::new();
    c.attrs_mut().insert("title".into(), "burn plot 7".into());
    c.insert(
        "/plot/temperature",
        Dataset::from_slice(&[2, 3], &[1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0])
            .unwrap()
            .with_attr("units", "K")
            .with_storage(CompressionSetting::new(CompressionAlgorithm::None, 0)),
    )
    .unwrap();
    c.insert("/plot/label", Dataset::text("north ridge")).unwrap();
    c.insert("/empty", Group::new().with_attr("note", 3i64)).unwrap();
    c
}

#[test]
fn test_write_then_read_preserves_tree() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tree.fstd");
    let original = sample();
    write_container(&path, &original).unwrap();

    let loaded = read_container(&path).unwrap();
    assert_eq!(loaded, original);
    let temps = loaded.dataset("/plot/temperature").unwrap();
    assert_eq!(temps.shape(), &[2, 3]);
    assert_eq!(temps.to_vec::<f64>().unwrap()[5], 6.0);
    assert_eq!(
        loaded.dataset("/plot/label").unwrap().as_text(),
        Some("north ridge")
    );
    assert_eq!(
        loaded.attrs_at("/empty").unwrap().get("note"),
        Some(&AttrValue::from(3i64))
    );
}

#[test]
fn test_each_available_compressor_survives_disk() {
    let dir = tempdir().unwrap();
    for algo in [
        CompressionAlgorithm::Zstd,
        CompressionAlgorithm::Lz4,
        CompressionAlgorithm::Snappy,
        CompressionAlgorithm::None,
    ] {
        if !algo.is_available() {
            continue;
        }
        let values: Vec<i32> = (0..5000).map(|i| i % 13).collect();
        let mut c = Container::new();
        c.insert(
            "/v",
            Dataset::from_vec(&values).with_storage(CompressionSetting::new(algo, 3)),
        )
        .unwrap();
        let path = dir.path().join(format!("{}.fstd", algo));
        write_container(&path, &c).unwrap();
        let back = read_container(&path).unwrap();
        assert_eq!(back.dataset("/v").unwrap().to_vec::<i32>().unwrap(), values);
    }
}

#[test]
fn test_create_refuses_existing_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.fstd");
    ContainerFile::create(&path, false).unwrap().close().unwrap();
    assert_matches!(
        ContainerFile::create(&path, false),
        Err(StdFileError::AlreadyExists(p)) if p == path
    );
    assert!(ContainerFile::create(&path, true).is_ok());
}

#[test]
fn test_read_only_handle_rejects_changes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.fstd");
    write_container(&path, &sample()).unwrap();
    let mut file = ContainerFile::open(&path).unwrap();
    assert!(!file.is_writable());
    assert_matches!(file.container_mut(), Err(StdFileError::InvalidInput(_)));
}

#[test]
fn test_drop_flushes_pending_changes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a.fstd");
    {
        let mut file = ContainerFile::create(&path, false).unwrap();
        file.container_mut()
            .unwrap()
            .insert("/x", Dataset::from_vec(&[7u16]))
            .unwrap();
    }
    let back = read_container(&path).unwrap();
    assert_eq!(back.dataset("/x").unwrap().to_vec::<u16>().unwrap(), vec![7]);
}

#[test]
fn test_garbage_file_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("junk.fstd");
    std::fs::write(&path, b"not a container").unwrap();
    assert!(read_container(&path).is_err());
}

fn raw_file(body: &str) -> Vec<u8> {
    let mut bytes = b"FSTD\x01".to_vec();
    bytes.extend_from_slice(body.as_bytes());
    bytes
}

#[test]
fn test_overflowing_dataset_shape_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("huge.fstd");
    let body = r#"{"kind":"group","children":{"x":{"kind":"dataset","dtype":"float64","shape":[9223372036854775808,2],"compression":"none","data":""}}}"#;
    std::fs::write(&path, raw_file(body)).unwrap();
    assert_matches!(read_container(&path), Err(StdFileError::InvalidFileFormat(_)));
}

#[test]
fn test_overflowing_array_attribute_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("attr.fstd");
    let body = r#"{"kind":"group","attrs":{"grid":{"type":"array","value":{"dtype":"uint8","shape":[4294967296,4294967296],"data":""}}}}"#;
    std::fs::write(&path, raw_file(body)).unwrap();
    assert_matches!(read_container(&path), Err(StdFileError::InvalidFileFormat(_)));
}
