// src/container/file.rs

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{AttrValue, Attributes, Container, Dataset, Dtype, Group, Node};
use crate::error::{Result, StdFileError};
use crate::types::{CompressionAlgorithm, CompressionSetting};

/// Leading bytes of every container file.
pub const MAGIC: &[u8; 4] = b"FSTD";
/// On-disk layout version written after the magic.
pub const FORMAT_VERSION: u8 = 1;
/// Conventional file extension.
pub const EXTENSION: &str = "fstd";

const PARTIAL_SUFFIX: &str = "partial";

/// Serialized form of a node. Dataset payloads are compressed individually
/// with the algorithm recorded next to them, then hex encoded.
#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum NodeRecord {
    Group {
        #[serde(default)]
        attrs: Attributes,
        #[serde(default)]
        children: BTreeMap<String, NodeRecord>,
    },
    Dataset {
        dtype: Dtype,
        shape: Vec<usize>,
        compression: CompressionAlgorithm,
        #[serde(default)]
        level: i32,
        data: String,
        #[serde(default)]
        attrs: Attributes,
    },
}

fn group_to_record(group: &Group) -> Result<NodeRecord> {
    let mut children = BTreeMap::new();
    for (name, node) in group.children() {
        let record = match node {
            Node::Group(g) => group_to_record(g)?,
            Node::Dataset(d) => dataset_to_record(d)?,
        };
        children.insert(name.clone(), record);
    }
    Ok(NodeRecord::Group {
        attrs: group.attrs.clone(),
        children,
    })
}

fn dataset_to_record(ds: &Dataset) -> Result<NodeRecord> {
    let storage = ds.storage();
    let packed = storage.algorithm.compress(ds.data(), storage.level)?;
    Ok(NodeRecord::Dataset {
        dtype: ds.dtype(),
        shape: ds.shape().to_vec(),
        compression: storage.algorithm,
        level: storage.level,
        data: hex::encode(packed),
        attrs: ds.attrs.clone(),
    })
}

fn check_attrs(attrs: &Attributes) -> Result<()> {
    for (key, value) in attrs {
        if let AttrValue::Array(array) = value {
            array
                .validate()
                .map_err(|e| StdFileError::invalid_format(format!("attribute {}: {}", key, e)))?;
        }
    }
    Ok(())
}

fn record_to_node(record: NodeRecord) -> Result<Node> {
    match record {
        NodeRecord::Group { attrs, children } => {
            check_attrs(&attrs)?;
            let mut group = Group::new();
            group.attrs = attrs;
            for (name, child) in children {
                group.insert_child(&name, record_to_node(child)?)?;
            }
            Ok(Node::Group(group))
        }
        NodeRecord::Dataset {
            dtype,
            shape,
            compression,
            level,
            data,
            attrs,
        } => {
            check_attrs(&attrs)?;
            let packed = hex::decode(&data)?;
            let raw = compression.decompress(&packed)?;
            let mut ds = Dataset::new(dtype, shape, raw)
                .map_err(|e| StdFileError::invalid_format(e.to_string()))?;
            ds.attrs = attrs;
            ds.set_storage(CompressionSetting::new(compression, level));
            Ok(Node::Dataset(ds))
        }
    }
}

/// Serializes a container to the on-disk byte layout.
pub fn encode(container: &Container) -> Result<Vec<u8>> {
    let record = group_to_record(container.root())?;
    let mut out = Vec::with_capacity(1024);
    out.extend_from_slice(MAGIC);
    out.push(FORMAT_VERSION);
    serde_json::to_writer(&mut out, &record)?;
    Ok(out)
}

/// Parses the on-disk byte layout.
pub fn decode(bytes: &[u8]) -> Result<Container> {
    if bytes.len() < MAGIC.len() + 1 || &bytes[..MAGIC.len()] != MAGIC {
        return Err(StdFileError::invalid_format("missing FSTD magic"));
    }
    let version = bytes[MAGIC.len()];
    if version != FORMAT_VERSION {
        return Err(StdFileError::invalid_format(format!(
            "unsupported container layout version {}",
            version
        )));
    }
    let record: NodeRecord = serde_json::from_slice(&bytes[MAGIC.len() + 1..])?;
    match record_to_node(record)? {
        Node::Group(root) => Ok(Container::from_root(root)),
        Node::Dataset(_) => Err(StdFileError::invalid_format("root node is not a group")),
    }
}

/// Reads a container file.
pub fn read_container(path: &Path) -> Result<Container> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StdFileError::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    decode(&bytes).map_err(|e| match e {
        StdFileError::InvalidFileFormat(msg) => {
            StdFileError::InvalidFileFormat(format!("{}: {}", path.display(), msg))
        }
        other => other,
    })
}

/// Writes a container file.
///
/// The bytes go to a `.partial` sibling first and are renamed into place, so
/// a failure never leaves a half-written file under `path`.
pub fn write_container(path: &Path, container: &Container) -> Result<()> {
    let bytes = encode(container)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let partial = partial_path(path);
    let result = (|| -> Result<()> {
        let file = fs::File::create(&partial)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&bytes)?;
        writer.flush()?;
        writer
            .into_inner()
            .map_err(|e| StdFileError::Io(e.into_error()))?
            .sync_all()?;
        fs::rename(&partial, path)?;
        Ok(())
    })();
    if result.is_err() {
        let _ = fs::remove_file(&partial);
    }
    result
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    path.with_file_name(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenMode {
    ReadOnly,
    ReadWrite,
}

/// An open container file.
///
/// The handle owns the in-memory tree. Writable handles that were modified are
/// written back by [`ContainerFile::flush`], [`ContainerFile::close`], or, as a
/// last resort, when the handle is dropped, so every exit path releases it.
#[derive(Debug)]
pub struct ContainerFile {
    path: PathBuf,
    container: Container,
    mode: OpenMode,
    dirty: bool,
    closed: bool,
}

impl ContainerFile {
    /// Creates a new, empty container file.
    ///
    /// Fails with [`StdFileError::AlreadyExists`] without touching the file if
    /// `path` exists and `overwrite` is false.
    pub fn create<P: AsRef<Path>>(path: P, overwrite: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.exists() && !overwrite {
            return Err(StdFileError::AlreadyExists(path));
        }
        let container = Container::new();
        write_container(&path, &container)?;
        Ok(Self {
            path,
            container,
            mode: OpenMode::ReadWrite,
            dirty: false,
            closed: false,
        })
    }

    /// Opens an existing file read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path.as_ref(), OpenMode::ReadOnly)
    }

    /// Opens an existing file for modification.
    pub fn open_rw<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path.as_ref(), OpenMode::ReadWrite)
    }

    fn open_with(path: &Path, mode: OpenMode) -> Result<Self> {
        let container = read_container(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            container,
            mode,
            dirty: false,
            closed: false,
        })
    }

    /// Path on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the handle accepts modifications.
    pub fn is_writable(&self) -> bool {
        self.mode == OpenMode::ReadWrite
    }

    /// The tree.
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// The tree, for modification. Fails on read-only handles.
    pub fn container_mut(&mut self) -> Result<&mut Container> {
        if !self.is_writable() {
            return Err(StdFileError::invalid_input(format!(
                "{} is open read-only",
                self.path.display()
            )));
        }
        self.dirty = true;
        Ok(&mut self.container)
    }

    /// Replaces the whole tree.
    pub fn replace(&mut self, container: Container) -> Result<()> {
        *self.container_mut()? = container;
        Ok(())
    }

    /// Writes pending modifications to disk.
    pub fn flush(&mut self) -> Result<()> {
        if self.is_writable() && self.dirty {
            write_container(&self.path, &self.container)?;
            self.dirty = false;
        }
        Ok(())
    }

    /// Flushes and releases the handle.
    pub fn close(mut self) -> Result<()> {
        let result = self.flush();
        self.closed = true;
        result
    }

    /// Flushes, releases the handle and hands back the tree.
    pub fn into_container(mut self) -> Result<Container> {
        self.flush()?;
        self.closed = true;
        Ok(std::mem::take(&mut self.container))
    }
}

impl Drop for ContainerFile {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.flush() {
            log::warn!(
                "[ContainerFile] Failed to flush '{}' on drop: {}",
                self.path.display(),
                e
            );
        }
    }
}
