use assert_matches::assert_matches;
use firestd::container::file::{read_container, write_container};
use firestd::standard::header::{
    VersionPolicy, ATTR_CREATED_BY, ATTR_CREATED_ON, ATTR_IO_VERSION,
};
use firestd::standard::merge::{
    collect_conflicts, collect_conflicts_with, merge, merge_files, ConflictKind, IgnorePolicy,
    MergeOptions,
};
use firestd::{AttrValue, CompressionSetting, Container, Dataset, Group, StdFileError};
use tempfile::tempdir;

fn header(authors: &str, created_on: &str) -> Container {
    let mut c = Container::new();
    c.attrs_mut().insert(ATTR_IO_VERSION.into(), "1.1.0".into());
    c.attrs_mut().insert(ATTR_CREATED_ON.into(), created_on.into());
    c.attrs_mut().insert(ATTR_CREATED_BY.into(), authors.into());
    c
}

fn plain_options() -> MergeOptions {
    MergeOptions {
        compression: None,
        ..MergeOptions::default()
    }
}

#[test]
fn test_shape_mismatch_blocks_merge() {
    let mut a = header("a;", "2026-01-01T00:00+00:00");
    a.insert("/x", Dataset::from_vec(&[0.0f64; 3])).unwrap();
    let mut b = header("b;", "2026-01-02T00:00+00:00");
    b.insert("/x", Dataset::from_vec(&[0.0f64; 4])).unwrap();

    let conflicts = collect_conflicts(&a, &b, &IgnorePolicy::default());
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].path, "/x");
    assert_eq!(conflicts[0].kind, ConflictKind::DatasetMismatch);
    assert!(conflicts[0].detail.contains("(3,)"));
    assert!(conflicts[0].detail.contains("(4,)"));

    assert_matches!(
        merge(&a, &b, &plain_options()),
        Err(StdFileError::UnresolvedConflicts { count: 1, .. })
    );
}

#[test]
fn test_dtype_and_node_type_conflicts() {
    let mut a = header("a;", "t");
    a.insert("/v", Dataset::from_vec(&[1i32, 2])).unwrap();
    a.insert("/g", Group::new()).unwrap();
    let mut b = header("b;", "t");
    b.insert("/v", Dataset::from_vec(&[1i64, 2])).unwrap();
    b.insert("/g", Dataset::from_vec(&[1u8])).unwrap();

    let conflicts = collect_conflicts(&a, &b, &IgnorePolicy::default());
    let kinds: Vec<_> = conflicts.iter().map(|c| (c.path.as_str(), c.kind)).collect();
    assert_eq!(
        kinds,
        vec![("/g", ConflictKind::NodeType), ("/v", ConflictKind::DatasetMismatch)]
    );
}

#[test]
fn test_attribute_conflicts_respect_ignore_policy() {
    let mut a = header("a;", "2026-01-01T00:00+00:00");
    a.insert("/run", Group::new().with_attr("fuel", "grass")).unwrap();
    let mut b = header("b;", "2026-01-02T00:00+00:00");
    b.insert("/run", Group::new().with_attr("fuel", "shrub")).unwrap();

    let conflicts = collect_conflicts(&a, &b, &IgnorePolicy::default());
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].kind, ConflictKind::AttrMismatch);
    assert_eq!(conflicts[0].path, "/run");

    let relaxed = IgnorePolicy::default().with("/run", "fuel");
    assert!(collect_conflicts(&a, &b, &relaxed).is_empty());

    let strict = IgnorePolicy::empty();
    let all = collect_conflicts(&a, &b, &strict);
    assert!(all.iter().any(|c| c.path == "/" && c.detail.contains(ATTR_CREATED_BY)));
}

#[test]
fn test_integer_width_does_not_conflict() {
    let mut a = header("a;", "2026-01-01T00:00+00:00");
    a.insert("/run", Group::new().with_attr("ignitions", AttrValue::Int(3)))
        .unwrap();
    let mut b = header("b;", "2026-01-02T00:00+00:00");
    b.insert("/run", Group::new().with_attr("ignitions", AttrValue::UInt(3)))
        .unwrap();
    assert!(collect_conflicts(&a, &b, &IgnorePolicy::default()).is_empty());

    b.require_group("/run")
        .unwrap()
        .attrs
        .insert("ignitions".into(), AttrValue::Float(3.0));
    let conflicts = collect_conflicts(&a, &b, &IgnorePolicy::default());
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].kind, ConflictKind::AttrMismatch);
}

#[test]
fn test_disjoint_trees_merge_additively() {
    let mut a = header("alice;bob;", "2026-01-01T00:00+00:00");
    a.insert("/runs/r1", Dataset::from_vec(&[1.0f64]).with_attr("units", "m"))
        .unwrap();
    a.insert("/meta", Group::new().with_attr("site", "A")).unwrap();
    let mut b = header("carol;", "2026-02-01T00:00+00:00");
    b.insert("/runs/r2", Dataset::from_vec(&[2.0f64])).unwrap();
    b.insert("/meta", Group::new().with_attr("operator", "C")).unwrap();

    let out = merge(&a, &b, &plain_options()).unwrap();
    assert!(out.contains("/runs/r1"));
    assert!(out.contains("/runs/r2"));
    let meta = out.attrs_at("/meta").unwrap();
    assert_eq!(meta.get("site"), Some(&AttrValue::from("A")));
    assert_eq!(meta.get("operator"), Some(&AttrValue::from("C")));
    assert_eq!(
        out.attrs().get(ATTR_CREATED_BY),
        Some(&AttrValue::from("alice;carol;bob;"))
    );
    assert_eq!(
        out.attrs().get(ATTR_CREATED_ON),
        Some(&AttrValue::from("2026-01-01T00:00+00:00"))
    );
    assert_eq!(
        out.dataset("/runs/r1").unwrap().attrs.get("units"),
        Some(&AttrValue::from("m"))
    );
}

#[test]
fn test_shared_dataset_keeps_first_value() {
    let mut a = header("a;", "t");
    a.insert("/x", Dataset::from_vec(&[1.0f64, 2.0])).unwrap();
    let mut b = header("b;", "t");
    b.insert("/x", Dataset::from_vec(&[9.0f64, 9.0])).unwrap();

    assert!(collect_conflicts(&a, &b, &IgnorePolicy::default()).is_empty());
    let out = merge(&a, &b, &plain_options()).unwrap();
    assert_eq!(out.dataset("/x").unwrap().to_vec::<f64>().unwrap(), vec![1.0, 2.0]);
}

#[test]
fn test_certificates_are_dropped() {
    let mut a = header("a;", "t");
    a.insert("/certificates/abc/payload", Dataset::text("{}")).unwrap();
    let mut b = header("b;", "t");
    b.insert("/certificates/abc", Dataset::from_vec(&[1u8])).unwrap();

    let options = plain_options();
    assert!(collect_conflicts_with(&a, &b, &options).is_empty());
    let out = merge(&a, &b, &options).unwrap();
    assert!(!out.contains("/certificates"));
}

#[test]
fn test_merge_recompresses_when_asked() {
    let mut a = header("a;", "t");
    a.insert("/x", Dataset::from_vec(&[1u32; 64])).unwrap();
    let b = header("b;", "t");
    let options = MergeOptions {
        compression: Some(CompressionSetting::NONE),
        ..MergeOptions::default()
    };
    let mut a_zstd = a.clone();
    if let Some(firestd::Node::Dataset(ds)) = a_zstd.node_mut("/x") {
        ds.set_storage(CompressionSetting::zstd(3));
    }
    let out = merge(&a_zstd, &b, &options).unwrap();
    assert_eq!(out.dataset("/x").unwrap().storage(), CompressionSetting::NONE);
}

#[test]
fn test_merge_files_writes_output() {
    let dir = tempdir().unwrap();
    let (pa, pb, out) = (
        dir.path().join("a.fstd"),
        dir.path().join("b.fstd"),
        dir.path().join("out.fstd"),
    );
    let mut a = header("a;", "2026-01-01T00:00+00:00");
    a.insert("/one", Dataset::from_vec(&[1i16])).unwrap();
    let mut b = header("b;", "2026-01-01T00:00+00:00");
    b.insert("/two", Dataset::from_vec(&[2i16])).unwrap();
    write_container(&pa, &a).unwrap();
    write_container(&pb, &b).unwrap();

    merge_files(&pa, &pb, &out, &MergeOptions::default(), &VersionPolicy::default()).unwrap();
    let merged = read_container(&out).unwrap();
    assert!(merged.contains("/one") && merged.contains("/two"));
}

#[test]
fn test_merge_files_checks_versions_first() {
    let dir = tempdir().unwrap();
    let (pa, pb, out) = (
        dir.path().join("a.fstd"),
        dir.path().join("b.fstd"),
        dir.path().join("out.fstd"),
    );
    write_container(&pa, &header("a;", "2026-01-01T00:00+00:00")).unwrap();
    let mut b = header("b;", "2026-01-01T00:00+00:00");
    b.attrs_mut().insert(ATTR_IO_VERSION.into(), "0.1.0".into());
    write_container(&pb, &b).unwrap();

    assert_matches!(
        merge_files(&pa, &pb, &out, &MergeOptions::default(), &VersionPolicy::default()),
        Err(StdFileError::IncompatibleVersion { .. })
    );
    assert!(!out.exists());
}
