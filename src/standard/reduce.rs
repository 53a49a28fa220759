//! Folding many standard files into one.
//!
//! Inputs are merged left to right. Intermediate results alternate between
//! two scratch files next to the target, so at most two intermediates exist
//! at any time; the last step writes the target itself. Scratch files are
//! removed however the fold ends.
//!
//! Scratch names derive from the target path. Two reducers must not target
//! the same path at once.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::header::VersionPolicy;
use super::merge::{merge_files, MergeOptions};
use crate::error::{Result, StdFileError};

/// Number of scratch slots.
pub const SCRATCH_SLOTS: usize = 2;

/// Two reusable intermediate files, removed on drop.
#[derive(Debug)]
pub struct ScratchPool {
    slots: [PathBuf; SCRATCH_SLOTS],
}

impl ScratchPool {
    /// Pool for `target`: `<target>.scratch0.fstd` and `<target>.scratch1.fstd`.
    pub fn new(target: &Path) -> Self {
        Self {
            slots: scratch_paths(target),
        }
    }

    /// Path of slot `step % 2`.
    pub fn slot(&self, step: usize) -> &Path {
        &self.slots[step % SCRATCH_SLOTS]
    }

    /// Both slot paths.
    pub fn paths(&self) -> &[PathBuf] {
        &self.slots
    }
}

impl Drop for ScratchPool {
    fn drop(&mut self) {
        for path in &self.slots {
            match fs::remove_file(path) {
                Ok(()) => log::trace!("[Reduce] Removed scratch {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!(
                    "[Reduce] Failed to remove scratch file {}: {}",
                    path.display(),
                    e
                ),
            }
        }
    }
}

fn scratch_paths(target: &Path) -> [PathBuf; SCRATCH_SLOTS] {
    let slot = |i: usize| {
        let mut name = target
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".scratch{}.{}", i, crate::container::file::EXTENSION));
        target.with_file_name(name)
    };
    [slot(0), slot(1)]
}

/// Merges `inputs` into `target`. See [`merge_many_with_progress`].
pub fn merge_many(
    inputs: &[PathBuf],
    target: &Path,
    options: &MergeOptions,
    policy: &VersionPolicy,
) -> Result<PathBuf> {
    merge_many_with_progress(inputs, target, options, policy, |_, _| {})
}

/// Merges `inputs` into `target`, reporting `(steps done, total steps)`.
///
/// Every input must exist; this is checked before any work. A single input is
/// copied as-is.
pub fn merge_many_with_progress<F>(
    inputs: &[PathBuf],
    target: &Path,
    options: &MergeOptions,
    policy: &VersionPolicy,
    mut progress: F,
) -> Result<PathBuf>
where
    F: FnMut(usize, usize),
{
    let (first, rest) = inputs
        .split_first()
        .ok_or_else(|| StdFileError::invalid_input("merge needs at least one input file"))?;
    if let Some(missing) = inputs.iter().find(|p| !p.is_file()) {
        return Err(StdFileError::NotFound(missing.clone()));
    }
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    if rest.is_empty() {
        if first.as_path() != target {
            fs::copy(first, target)?;
        }
        log::debug!("[Reduce] Single input {} copied to {}", first.display(), target.display());
        progress(1, 1);
        return Ok(target.to_path_buf());
    }

    let pool = ScratchPool::new(target);
    let total = rest.len();
    let mut current = first.clone();
    for (step, next) in rest.iter().enumerate() {
        let out = if step + 1 == total {
            target.to_path_buf()
        } else {
            pool.slot(step).to_path_buf()
        };
        log::debug!(
            "[Reduce] Step {}/{}: {} + {} -> {}",
            step + 1,
            total,
            current.display(),
            next.display(),
            out.display()
        );
        merge_files(&current, next, &out, options, policy)?;
        progress(step + 1, total);
        current = out;
    }
    log::info!("[Reduce] Merged {} files into {}", inputs.len(), target.display());
    Ok(target.to_path_buf())
}

/// Files under `dir` with the given extension, sorted by path.
pub fn collect_inputs(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(StdFileError::NotFound(dir.to_path_buf()));
    }
    let wanted = extension.trim_start_matches('.');
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| {
            StdFileError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
        })?;
        if entry.file_type().is_file()
            && entry.path().extension().map_or(false, |ext| ext == wanted)
        {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Like [`collect_inputs`], minus `target` and its scratch files, so a rerun
/// into the same directory does not fold its own earlier output back in.
pub fn collect_inputs_for(dir: &Path, extension: &str, target: &Path) -> Result<Vec<PathBuf>> {
    let mut own = vec![resolved(target)];
    own.extend(scratch_paths(target).iter().map(|p| resolved(p)));

    let mut files = collect_inputs(dir, extension)?;
    files.retain(|f| {
        let keep = !own.contains(&resolved(f));
        if !keep {
            log::debug!("[Reduce] Skipping merge output {}", f.display());
        }
        keep
    });
    Ok(files)
}

fn resolved(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
