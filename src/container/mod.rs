//! Hierarchical typed-tree container.
//!
//! A container is a tree rooted at `/`. Every node is either a [`Group`]
//! (named children plus attributes) or a [`Dataset`] (a typed, shaped array
//! plus attributes). Children are held in a `BTreeMap`, so every traversal in
//! the crate sees them in sorted-by-name order.

mod attr;
mod dtype;
pub mod file;

pub use attr::{ArrayAttr, AttrValue, Attributes};
pub use dtype::{byte_len, element_count, encode_elements, shape_text, Dtype, Element};
pub use file::ContainerFile;

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, StdFileError};
use crate::types::CompressionSetting;

/// Path of the root group.
pub const ROOT: &str = "/";

/// Discriminant of a [`Node`], used in conflict reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A group node
    Group,
    /// A dataset node
    Dataset,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Group => write!(f, "group"),
            NodeKind::Dataset => write!(f, "dataset"),
        }
    }
}

/// A node of the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Named children plus attributes
    Group(Group),
    /// Typed array plus attributes
    Dataset(Dataset),
}

impl Node {
    /// Which variant this is.
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Group(_) => NodeKind::Group,
            Node::Dataset(_) => NodeKind::Dataset,
        }
    }

    /// Attributes of either variant.
    pub fn attrs(&self) -> &Attributes {
        match self {
            Node::Group(g) => &g.attrs,
            Node::Dataset(d) => &d.attrs,
        }
    }

    /// Mutable attributes of either variant.
    pub fn attrs_mut(&mut self) -> &mut Attributes {
        match self {
            Node::Group(g) => &mut g.attrs,
            Node::Dataset(d) => &mut d.attrs,
        }
    }

    /// The group, if this node is one.
    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Node::Group(g) => Some(g),
            Node::Dataset(_) => None,
        }
    }

    /// The dataset, if this node is one.
    pub fn as_dataset(&self) -> Option<&Dataset> {
        match self {
            Node::Dataset(d) => Some(d),
            Node::Group(_) => None,
        }
    }
}

impl From<Group> for Node {
    fn from(g: Group) -> Self {
        Node::Group(g)
    }
}

impl From<Dataset> for Node {
    fn from(d: Dataset) -> Self {
        Node::Dataset(d)
    }
}

/// A group: uniquely named children plus attributes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Group {
    /// Attributes of the group
    pub attrs: Attributes,
    children: BTreeMap<String, Node>,
}

impl Group {
    /// Empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, key: &str, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }

    /// Children in sorted name order.
    pub fn children(&self) -> impl Iterator<Item = (&String, &Node)> {
        self.children.iter()
    }

    /// Child names in sorted order.
    pub fn child_names(&self) -> impl Iterator<Item = &String> {
        self.children.keys()
    }

    /// Looks up a direct child.
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.get(name)
    }

    /// Looks up a direct child mutably.
    pub fn child_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.children.get_mut(name)
    }

    /// Adds a child. Names must be valid and not already present.
    pub fn insert_child(&mut self, name: &str, node: Node) -> Result<()> {
        validate_name(name)?;
        if self.children.contains_key(name) {
            return Err(StdFileError::invalid_path(format!(
                "child '{}' already exists",
                name
            )));
        }
        self.children.insert(name.to_string(), node);
        Ok(())
    }

    /// Removes and returns a direct child.
    pub fn remove_child(&mut self, name: &str) -> Option<Node> {
        self.children.remove(name)
    }

    /// Whether a direct child exists.
    pub fn contains_child(&self, name: &str) -> bool {
        self.children.contains_key(name)
    }

    /// Number of direct children.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// True when the group has no children.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// A typed, shaped array plus attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Attributes of the dataset
    pub attrs: Attributes,
    dtype: Dtype,
    shape: Vec<usize>,
    data: Vec<u8>,
    storage: CompressionSetting,
}

impl Dataset {
    /// Creates a dataset from raw little-endian row-major bytes.
    pub fn new(dtype: Dtype, shape: Vec<usize>, data: Vec<u8>) -> Result<Self> {
        match dtype.itemsize() {
            Some(itemsize) => {
                let expected = byte_len(&shape, itemsize).ok_or_else(|| {
                    StdFileError::invalid_input(format!(
                        "dataset shape {} of {} overflows the address space",
                        shape_text(&shape),
                        dtype
                    ))
                })?;
                if data.len() != expected {
                    return Err(StdFileError::invalid_input(format!(
                        "dataset of shape {} and dtype {} needs {} bytes, got {}",
                        shape_text(&shape),
                        dtype,
                        expected,
                        data.len()
                    )));
                }
            }
            None => {
                if !shape.is_empty() {
                    return Err(StdFileError::invalid_input("utf8 datasets must be scalar"));
                }
                std::str::from_utf8(&data).map_err(|e| {
                    StdFileError::invalid_input(format!("utf8 dataset is not valid UTF-8: {}", e))
                })?;
            }
        }
        Ok(Dataset {
            attrs: Attributes::new(),
            dtype,
            shape,
            data,
            storage: CompressionSetting::NONE,
        })
    }

    /// Creates a dataset of the given shape from typed values.
    pub fn from_slice<T: Element>(shape: &[usize], values: &[T]) -> Result<Self> {
        Self::new(T::DTYPE, shape.to_vec(), encode_elements(values))
    }

    /// One-dimensional dataset holding `values`.
    pub fn from_vec<T: Element>(values: &[T]) -> Self {
        Dataset {
            attrs: Attributes::new(),
            dtype: T::DTYPE,
            shape: vec![values.len()],
            data: encode_elements(values),
            storage: CompressionSetting::NONE,
        }
    }

    /// Scalar text dataset.
    pub fn text(s: &str) -> Self {
        Dataset {
            attrs: Attributes::new(),
            dtype: Dtype::Utf8,
            shape: Vec::new(),
            data: s.as_bytes().to_vec(),
            storage: CompressionSetting::NONE,
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, key: &str, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }

    /// Builder-style storage setting.
    pub fn with_storage(mut self, storage: CompressionSetting) -> Self {
        self.storage = storage;
        self
    }

    /// Element type.
    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    /// Array shape (empty for scalars).
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Raw bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// How the dataset is compressed on disk.
    pub fn storage(&self) -> CompressionSetting {
        self.storage
    }

    /// Changes how the dataset is compressed on disk. Logical content is untouched.
    pub fn set_storage(&mut self, storage: CompressionSetting) {
        self.storage = storage;
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self.dtype.itemsize() {
            Some(itemsize) => self.data.len() / itemsize,
            None => 1,
        }
    }

    /// True when the dataset has zero elements. A `utf8` dataset is a single
    /// element even when its text is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes in one slice along the leading axis. Scalars and text count as one row.
    pub fn row_bytes(&self) -> usize {
        match (self.dtype.itemsize(), self.shape.split_first()) {
            (Some(itemsize), Some((_, rest))) => byte_len(rest, itemsize).unwrap_or(0),
            _ => self.data.len(),
        }
    }

    /// The text of a `utf8` dataset.
    pub fn as_text(&self) -> Option<&str> {
        match self.dtype {
            Dtype::Utf8 => std::str::from_utf8(&self.data).ok(),
            _ => None,
        }
    }

    /// Decodes the elements as `T`. The dtype must match exactly.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if self.dtype != T::DTYPE {
            return Err(StdFileError::invalid_input(format!(
                "dataset dtype is {}, requested {}",
                self.dtype,
                T::DTYPE
            )));
        }
        let itemsize = T::DTYPE.itemsize().unwrap_or(1);
        Ok(self.data.chunks_exact(itemsize).map(T::read_le).collect())
    }
}

/// A whole tree rooted at `/`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Container {
    root: Group,
}

impl Container {
    /// Empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing root group.
    pub fn from_root(root: Group) -> Self {
        Container { root }
    }

    /// Root group.
    pub fn root(&self) -> &Group {
        &self.root
    }

    /// Root group, mutably.
    pub fn root_mut(&mut self) -> &mut Group {
        &mut self.root
    }

    /// Root attributes (where the standard-file header lives).
    pub fn attrs(&self) -> &Attributes {
        &self.root.attrs
    }

    /// Root attributes, mutably.
    pub fn attrs_mut(&mut self) -> &mut Attributes {
        &mut self.root.attrs
    }

    /// Node at `path`. The root is not a `Node`; use [`Container::group`] for it.
    pub fn node(&self, path: &str) -> Option<&Node> {
        let components = split_path(path).ok()?;
        let (last, parents) = components.split_last()?;
        let mut group = &self.root;
        for name in parents {
            group = group.child(name)?.as_group()?;
        }
        group.child(last)
    }

    /// Node at `path`, mutably.
    pub fn node_mut(&mut self, path: &str) -> Option<&mut Node> {
        let components = split_path(path).ok()?;
        let (last, parents) = components.split_last()?;
        let mut group = &mut self.root;
        for name in parents {
            group = match group.child_mut(name)? {
                Node::Group(g) => g,
                Node::Dataset(_) => return None,
            };
        }
        group.child_mut(last)
    }

    /// Group at `path`, including the root.
    pub fn group(&self, path: &str) -> Option<&Group> {
        if is_root(path) {
            return Some(&self.root);
        }
        self.node(path)?.as_group()
    }

    /// Group at `path`, mutably, including the root.
    pub fn group_mut(&mut self, path: &str) -> Option<&mut Group> {
        if is_root(path) {
            return Some(&mut self.root);
        }
        match self.node_mut(path)? {
            Node::Group(g) => Some(g),
            Node::Dataset(_) => None,
        }
    }

    /// Dataset at `path`.
    pub fn dataset(&self, path: &str) -> Option<&Dataset> {
        self.node(path)?.as_dataset()
    }

    /// Attributes at `path`, including the root.
    pub fn attrs_at(&self, path: &str) -> Option<&Attributes> {
        if is_root(path) {
            return Some(&self.root.attrs);
        }
        self.node(path).map(Node::attrs)
    }

    /// Whether anything exists at `path`.
    pub fn contains(&self, path: &str) -> bool {
        is_root(path) || self.node(path).is_some()
    }

    /// Returns the group at `path`, creating it and any missing parents.
    pub fn require_group(&mut self, path: &str) -> Result<&mut Group> {
        let components = split_path(path)?;
        let mut group = &mut self.root;
        for name in components {
            if !group.contains_child(name) {
                group.insert_child(name, Node::Group(Group::new()))?;
            }
            group = match group.child_mut(name) {
                Some(Node::Group(g)) => g,
                _ => {
                    return Err(StdFileError::invalid_path(format!(
                        "'{}' in '{}' is not a group",
                        name, path
                    )))
                }
            };
        }
        Ok(group)
    }

    /// Inserts `node` at `path`, creating parent groups as needed.
    pub fn insert(&mut self, path: &str, node: impl Into<Node>) -> Result<()> {
        let (parent, name) = parent_and_name(path)?;
        self.require_group(&parent)?.insert_child(name, node.into())
    }

    /// Removes and returns the node at `path`.
    pub fn remove(&mut self, path: &str) -> Option<Node> {
        let (parent, name) = parent_and_name(path).ok()?;
        self.group_mut(&parent)?.remove_child(name)
    }
}

/// Rejects names that cannot appear as a single path component.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') || name == "." || name == ".." {
        return Err(StdFileError::invalid_path(format!(
            "invalid node name '{}'",
            name
        )));
    }
    Ok(())
}

fn is_root(path: &str) -> bool {
    path.trim_end_matches('/').is_empty()
}

/// Splits an absolute path into its components. The root has none.
pub fn split_path(path: &str) -> Result<Vec<&str>> {
    let rest = path
        .strip_prefix('/')
        .ok_or_else(|| StdFileError::invalid_path(format!("'{}' is not absolute", path)))?;
    let rest = rest.trim_end_matches('/');
    if rest.is_empty() {
        return Ok(Vec::new());
    }
    let parts: Vec<&str> = rest.split('/').collect();
    for part in &parts {
        validate_name(part)?;
    }
    Ok(parts)
}

/// Child path of `parent`.
pub fn join_path(parent: &str, name: &str) -> String {
    if is_root(parent) {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent.trim_end_matches('/'), name)
    }
}

/// Splits `/a/b/c` into (`/a/b`, `c`). The root has no parent.
pub fn parent_and_name(path: &str) -> Result<(String, &str)> {
    let components = split_path(path)?;
    let (name, parents) = components
        .split_last()
        .ok_or_else(|| StdFileError::invalid_path("the root has no parent"))?;
    let parent = if parents.is_empty() {
        ROOT.to_string()
    } else {
        format!("/{}", parents.join("/"))
    };
    Ok((parent, name))
}

/// Brings a prefix to the `/a/b` form used by [`is_under_prefix`].
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    format!("/{}", trimmed)
}

/// True when `path` equals `prefix` or lies underneath it.
pub fn is_under_prefix(path: &str, prefix: &str) -> bool {
    let prefix = normalize_prefix(prefix);
    if prefix == ROOT {
        return true;
    }
    match path.strip_prefix(prefix.as_str()) {
        Some("") => true,
        Some(rest) => rest.starts_with('/'),
        None => false,
    }
}
