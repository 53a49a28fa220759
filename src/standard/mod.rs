//! Standard files: header lifecycle, diff/merge and N-way reduction.

pub mod header;
pub mod merge;
pub mod reduce;

pub use header::{
    apply_version_update, check_version, create_new, create_new_with, merge_authors, validate,
    Authors, NewFileOptions, VersionCheck, VersionPolicy, COMPATIBLE_VERSIONS, IO_VERSION,
};
pub use merge::{
    collect_conflicts, collect_conflicts_with, merge, merge_files, Conflict, ConflictKind,
    IgnorePolicy, MergeOptions,
};
pub use reduce::{collect_inputs, collect_inputs_for, merge_many, merge_many_with_progress, ScratchPool};
