//! Tree diff and merge.
//!
//! [`collect_conflicts`] compares two trees at every path present in both and
//! reports disagreements. [`merge`] combines two conflict-free trees: all of
//! `a`, then whatever `b` adds. Paths only one side has never conflict.
//!
//! Dataset contents are not compared. Two datasets with the same shape, dtype
//! and attributes are considered compatible and the merged output keeps `a`'s
//! bytes.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::header::{
    check_version, merge_authors, validate, VersionPolicy, ATTR_CREATED_BY, ATTR_CREATED_ON,
    ATTR_DESCRIPTION, ATTR_IO_VERSION,
};
use crate::container::file::{read_container, write_container};
use crate::container::{
    is_under_prefix, join_path, shape_text, AttrValue, Attributes, Container, Dataset, Group,
    Node, ROOT,
};
use crate::error::{Result, StdFileError};
use crate::signing::CERTIFICATES_ROOT;
use crate::types::{CompressionAlgorithm, CompressionSetting};

/// Zstd level used by [`MergeOptions::default`].
pub const DEFAULT_MERGE_ZSTD_LEVEL: i32 = 4;

/// Kind of disagreement found at a shared path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// Group on one side, dataset on the other
    NodeType,
    /// Datasets differ in shape or dtype
    DatasetMismatch,
    /// A shared attribute has different values
    AttrMismatch,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConflictKind::NodeType => "node_type",
            ConflictKind::DatasetMismatch => "dataset_mismatch",
            ConflictKind::AttrMismatch => "attr_mismatch",
        };
        f.write_str(s)
    }
}

/// One disagreement between two trees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// Path where the trees disagree
    pub path: String,
    /// What disagrees
    pub kind: ConflictKind,
    /// Human-readable detail
    pub detail: String,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.kind, self.path, self.detail)
    }
}

/// Attributes exempt from comparison, keyed by node path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IgnorePolicy(BTreeMap<String, BTreeSet<String>>);

impl Default for IgnorePolicy {
    fn default() -> Self {
        let header = [ATTR_CREATED_ON, ATTR_CREATED_BY, ATTR_IO_VERSION, ATTR_DESCRIPTION];
        let mut map = BTreeMap::new();
        map.insert(
            ROOT.to_string(),
            header.iter().map(|s| s.to_string()).collect(),
        );
        Self(map)
    }
}

impl IgnorePolicy {
    /// Policy that ignores nothing.
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Builds a policy from `path -> attribute names`.
    pub fn from_map(map: BTreeMap<String, Vec<String>>) -> Self {
        Self(
            map.into_iter()
                .map(|(path, names)| (path, names.into_iter().collect()))
                .collect(),
        )
    }

    /// Builder-style: also ignore `attr` at `path`.
    pub fn with(mut self, path: &str, attr: &str) -> Self {
        self.0
            .entry(path.to_string())
            .or_default()
            .insert(attr.to_string());
        self
    }

    /// Whether `attr` at `path` is exempt.
    pub fn is_ignored(&self, path: &str, attr: &str) -> bool {
        self.0.get(path).map_or(false, |names| names.contains(attr))
    }

    /// Paths that have exemptions.
    pub fn paths(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }
}

/// How [`merge`] and [`collect_conflicts_with`] behave.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOptions {
    /// Attributes exempt from comparison and from additive merging
    pub ignore: IgnorePolicy,
    /// Storage applied to every copied dataset; `None` keeps each dataset's own
    pub compression: Option<CompressionSetting>,
    /// Subtrees left out of comparison and of the merged output
    pub drop_prefixes: Vec<String>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        let compression = if CompressionAlgorithm::Zstd.is_available() {
            Some(CompressionSetting::zstd(DEFAULT_MERGE_ZSTD_LEVEL))
        } else {
            None
        };
        Self {
            ignore: IgnorePolicy::default(),
            compression,
            drop_prefixes: vec![CERTIFICATES_ROOT.to_string()],
        }
    }
}

impl MergeOptions {
    fn dropped(&self, path: &str) -> bool {
        self.drop_prefixes.iter().any(|p| is_under_prefix(path, p))
    }
}

struct Differ<'a> {
    options: &'a MergeOptions,
    conflicts: Vec<Conflict>,
}

impl<'a> Differ<'a> {
    fn push(&mut self, path: &str, kind: ConflictKind, detail: String) {
        self.conflicts.push(Conflict {
            path: path.to_string(),
            kind,
            detail,
        });
    }

    fn compare_attrs(&mut self, path: &str, a: &Attributes, b: &Attributes) {
        for (key, va) in a {
            if self.options.ignore.is_ignored(path, key) {
                continue;
            }
            if let Some(vb) = b.get(key) {
                if !va.same_value(vb) {
                    self.push(
                        path,
                        ConflictKind::AttrMismatch,
                        format!("attribute '{}': {} != {}", key, va, vb),
                    );
                }
            }
        }
    }

    fn compare_datasets(&mut self, path: &str, a: &Dataset, b: &Dataset) {
        if a.shape() != b.shape() || a.dtype() != b.dtype() {
            self.push(
                path,
                ConflictKind::DatasetMismatch,
                format!(
                    "shape {} dtype {} != shape {} dtype {}",
                    shape_text(a.shape()),
                    a.dtype(),
                    shape_text(b.shape()),
                    b.dtype()
                ),
            );
        }
        self.compare_attrs(path, &a.attrs, &b.attrs);
    }

    fn compare_groups(&mut self, path: &str, a: &Group, b: &Group) {
        self.compare_attrs(path, &a.attrs, &b.attrs);
        for (name, na) in a.children() {
            let Some(nb) = b.child(name) else {
                continue;
            };
            let child_path = join_path(path, name);
            if self.options.dropped(&child_path) {
                continue;
            }
            match (na, nb) {
                (Node::Group(ga), Node::Group(gb)) => self.compare_groups(&child_path, ga, gb),
                (Node::Dataset(da), Node::Dataset(db)) => {
                    self.compare_datasets(&child_path, da, db)
                }
                _ => self.push(
                    &child_path,
                    ConflictKind::NodeType,
                    format!("{} != {}", na.kind(), nb.kind()),
                ),
            }
        }
    }
}

/// Conflicts between `a` and `b` with default drop prefixes.
pub fn collect_conflicts(a: &Container, b: &Container, ignore: &IgnorePolicy) -> Vec<Conflict> {
    let options = MergeOptions {
        ignore: ignore.clone(),
        ..MergeOptions::default()
    };
    collect_conflicts_with(a, b, &options)
}

/// Conflicts between `a` and `b`, in sorted path order.
///
/// Attributes are compared with [`AttrValue::same_value`], so `1` stored as a
/// signed and as an unsigned integer does not conflict. Other type changes do.
pub fn collect_conflicts_with(a: &Container, b: &Container, options: &MergeOptions) -> Vec<Conflict> {
    let mut differ = Differ {
        options,
        conflicts: Vec::new(),
    };
    differ.compare_groups(ROOT, a.root(), b.root());
    differ.conflicts
}

fn copy_dataset(ds: &Dataset, options: &MergeOptions) -> Dataset {
    let mut out = ds.clone();
    if let Some(storage) = options.compression {
        out.set_storage(storage);
    }
    out
}

fn copy_group(path: &str, group: &Group, options: &MergeOptions) -> Result<Group> {
    let mut out = Group::new();
    out.attrs = group.attrs.clone();
    for (name, child) in group.children() {
        let child_path = join_path(path, name);
        if options.dropped(&child_path) {
            continue;
        }
        out.insert_child(name, copy_node(&child_path, child, options)?)?;
    }
    Ok(out)
}

fn copy_node(path: &str, node: &Node, options: &MergeOptions) -> Result<Node> {
    Ok(match node {
        Node::Group(g) => Node::Group(copy_group(path, g, options)?),
        Node::Dataset(d) => Node::Dataset(copy_dataset(d, options)),
    })
}

fn merge_group_into(path: &str, out: &mut Group, b: &Group, options: &MergeOptions) -> Result<()> {
    for (key, value) in &b.attrs {
        if !out.attrs.contains_key(key) && !options.ignore.is_ignored(path, key) {
            out.attrs.insert(key.clone(), value.clone());
        }
    }
    for (name, nb) in b.children() {
        let child_path = join_path(path, name);
        if options.dropped(&child_path) {
            continue;
        }
        match (out.child_mut(name), nb) {
            (None, _) => {
                let copied = copy_node(&child_path, nb, options)?;
                out.insert_child(name, copied)?;
            }
            (Some(Node::Group(og)), Node::Group(gb)) => {
                merge_group_into(&child_path, og, gb, options)?;
            }
            (Some(Node::Dataset(_)), Node::Dataset(_)) => {}
            (Some(existing), _) => {
                return Err(StdFileError::internal(format!(
                    "{} is a {} in the output but a {} in the second input",
                    child_path,
                    existing.kind(),
                    nb.kind()
                )));
            }
        }
    }
    Ok(())
}

fn header_text<'a>(container: &'a Container, name: &str) -> Option<&'a str> {
    container.attrs().get(name).and_then(AttrValue::as_str)
}

/// Merges `b` into a copy of `a`.
///
/// Fails with [`StdFileError::UnresolvedConflicts`] unless the two trees are
/// conflict-free under `options`. On shared attribute keys and shared
/// datasets the value from `a` wins. The root `created_by` becomes the merged
/// author list of both inputs.
pub fn merge(a: &Container, b: &Container, options: &MergeOptions) -> Result<Container> {
    let conflicts = collect_conflicts_with(a, b, options);
    if let Some(first) = conflicts.first() {
        return Err(StdFileError::UnresolvedConflicts {
            count: conflicts.len(),
            first: first.to_string(),
        });
    }

    let mut root = copy_group(ROOT, a.root(), options)?;
    merge_group_into(ROOT, &mut root, b.root(), options)?;
    let mut out = Container::from_root(root);

    let authors = match (header_text(a, ATTR_CREATED_BY), header_text(b, ATTR_CREATED_BY)) {
        (Some(x), Some(y)) => Some(merge_authors(x, y)?),
        (None, Some(y)) => Some(y.to_string()),
        _ => None,
    };
    if let Some(authors) = authors {
        out.attrs_mut()
            .insert(ATTR_CREATED_BY.to_string(), AttrValue::Str(authors));
    }
    Ok(out)
}

/// Merges two standard files into a fresh `out` file.
///
/// Both inputs must pass header validation and the version check. `out` is
/// overwritten; nothing is written unless the merge succeeds.
pub fn merge_files(
    a: &Path,
    b: &Path,
    out: &Path,
    options: &MergeOptions,
    policy: &VersionPolicy,
) -> Result<()> {
    let left = read_container(a)?;
    let right = read_container(b)?;
    for (path, container) in [(a, &left), (b, &right)] {
        validate(container, policy)?;
        check_version(container, policy)?;
        log::trace!("[Merge] {} passed header checks", path.display());
    }
    let merged = merge(&left, &right, options)?;
    write_container(out, &merged)?;
    log::debug!(
        "[Merge] {} + {} -> {}",
        a.display(),
        b.display(),
        out.display()
    );
    Ok(())
}
