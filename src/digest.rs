//! Content digest engine.
//!
//! Computes a SHA-256 over the logical content of a container: node kinds,
//! paths, attributes, dataset shapes, dtypes and bytes. The byte stream fed to
//! the hash depends only on that logical content, never on how the tree is
//! stored, so identical trees always produce identical digests.
//!
//! Byte stream, per node, in sorted-by-name order:
//!
//! - group:   `G\0` path `\0` attributes, then each non-excluded child
//! - dataset: `D\0` path `\0` shape `\0` dtype `\0` attributes, then data.
//!   A dataset with zero elements feeds `<empty>` in place of data. A `utf8`
//!   payload is preceded by its byte length and `\0`.
//! - attribute entry (sorted by key): `A\0` key `\0` value `\0`
//!
//! Dataset bytes are fed in slices of whole leading-axis rows. The slice size
//! is not visible in the result. Slicing bounds each hash update and avoids
//! copies, but it does not bound memory: the engine hashes a [`Container`]
//! that is already resident, and [`crate::container::file::read_container`]
//! decodes every dataset into memory. Peak memory is therefore the decoded
//! size of the file.

use sha2::{Digest, Sha256};

use crate::container::{
    is_under_prefix, join_path, normalize_prefix, shape_text, AttrValue, Attributes, Container,
    Dataset, Group, Node, ROOT,
};

/// Default slice size for streaming dataset bytes into the hash.
pub const DEFAULT_CHUNK_BYTES: usize = 4 * 1024 * 1024;

const GROUP_TAG: &[u8] = b"G\0";
const DATASET_TAG: &[u8] = b"D\0";
const ATTR_TAG: &[u8] = b"A\0";
const SEP: &[u8] = b"\0";
const EMPTY_MARKER: &[u8] = b"<empty>";

/// Options for a digest run.
#[derive(Debug, Clone)]
pub struct DigestOptions {
    /// Subtrees left out of the digest (the prefix itself and everything under it).
    pub exclude_prefixes: Vec<String>,
    /// Upper bound on bytes fed to the hash per update.
    pub chunk_bytes: usize,
}

impl Default for DigestOptions {
    fn default() -> Self {
        Self {
            exclude_prefixes: Vec::new(),
            chunk_bytes: DEFAULT_CHUNK_BYTES,
        }
    }
}

impl DigestOptions {
    /// Options excluding `prefixes`, default chunk size.
    pub fn excluding<S: AsRef<str>>(prefixes: &[S]) -> Self {
        Self {
            exclude_prefixes: prefixes.iter().map(|p| normalize_prefix(p.as_ref())).collect(),
            ..Self::default()
        }
    }

    /// Builder-style chunk size.
    pub fn with_chunk_bytes(mut self, chunk_bytes: usize) -> Self {
        self.chunk_bytes = chunk_bytes.max(1);
        self
    }
}

/// A single digest computation. Owns its hash accumulator.
pub struct ContentDigest {
    options: DigestOptions,
    hasher: Sha256,
}

impl ContentDigest {
    /// Starts a digest run.
    pub fn new(options: DigestOptions) -> Self {
        Self {
            options,
            hasher: Sha256::new(),
        }
    }

    /// Feeds `container` and returns the lowercase hex digest.
    pub fn digest(mut self, container: &Container) -> String {
        self.feed_group(ROOT, container.root());
        hex::encode(self.hasher.finalize())
    }

    fn excluded(&self, path: &str) -> bool {
        self.options
            .exclude_prefixes
            .iter()
            .any(|prefix| is_under_prefix(path, prefix))
    }

    fn feed_group(&mut self, path: &str, group: &Group) {
        self.hasher.update(GROUP_TAG);
        self.hasher.update(path.as_bytes());
        self.hasher.update(SEP);
        self.feed_attrs(&group.attrs);
        for (name, child) in group.children() {
            let child_path = join_path(path, name);
            if self.excluded(&child_path) {
                continue;
            }
            match child {
                Node::Group(g) => self.feed_group(&child_path, g),
                Node::Dataset(d) => self.feed_dataset(&child_path, d),
            }
        }
    }

    fn feed_dataset(&mut self, path: &str, ds: &Dataset) {
        self.hasher.update(DATASET_TAG);
        self.hasher.update(path.as_bytes());
        self.hasher.update(SEP);
        self.hasher.update(shape_text(ds.shape()).as_bytes());
        self.hasher.update(SEP);
        self.hasher.update(ds.dtype().name().as_bytes());
        self.hasher.update(SEP);
        self.feed_attrs(&ds.attrs);

        if ds.is_empty() {
            self.hasher.update(EMPTY_MARKER);
            return;
        }
        if ds.dtype().itemsize().is_none() {
            // Text length is not implied by the shape.
            self.hasher.update(ds.data().len().to_string().as_bytes());
            self.hasher.update(SEP);
        }
        let row_bytes = ds.row_bytes().max(1);
        let rows_per_chunk = (self.options.chunk_bytes / row_bytes).max(1);
        for chunk in ds.data().chunks(rows_per_chunk * row_bytes) {
            self.hasher.update(chunk);
        }
    }

    fn feed_attrs(&mut self, attrs: &Attributes) {
        for (key, value) in attrs {
            self.hasher.update(ATTR_TAG);
            self.hasher.update(key.as_bytes());
            self.hasher.update(SEP);
            self.hasher.update(attr_bytes(value));
            self.hasher.update(SEP);
        }
    }
}

/// Deterministic byte form of an attribute value.
pub fn attr_bytes(value: &AttrValue) -> Vec<u8> {
    match value {
        AttrValue::Str(s) => s.as_bytes().to_vec(),
        AttrValue::Bytes(b) => b.clone(),
        AttrValue::Bool(b) => b.to_string().into_bytes(),
        AttrValue::Int(v) => v.to_string().into_bytes(),
        AttrValue::UInt(v) => v.to_string().into_bytes(),
        // Debug keeps a fraction or exponent (1.0, 1e-7) and round-trips exactly
        AttrValue::Float(v) => format!("{:?}", v).into_bytes(),
        AttrValue::Array(a) => {
            let mut out = Vec::with_capacity(a.data.len() + 32);
            out.extend_from_slice(b"shape=");
            out.extend_from_slice(shape_text(&a.shape).as_bytes());
            out.extend_from_slice(SEP);
            out.extend_from_slice(b"dtype=");
            out.extend_from_slice(a.dtype.name().as_bytes());
            out.extend_from_slice(SEP);
            out.extend_from_slice(&a.data);
            out
        }
    }
}

/// Digest of `container` with the given subtrees left out.
pub fn digest_container<S: AsRef<str>>(container: &Container, exclude_prefixes: &[S]) -> String {
    ContentDigest::new(DigestOptions::excluding(exclude_prefixes)).digest(container)
}

/// Digest with explicit options.
pub fn digest_with_options(container: &Container, options: &DigestOptions) -> String {
    ContentDigest::new(options.clone()).digest(container)
}
