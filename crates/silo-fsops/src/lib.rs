//! Path canonicalization, bind-mount resolution, and filesystem-UUID
//! probing underpinning device identity (spec §4.1, §4.2).
#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod mounts;
pub mod ops;
pub mod probe;
pub mod resolver;

pub use error::{FsOpsError, FsOpsResult};
pub use mounts::{find_owning_mount, parse_mountinfo, read_mount_table, resolve_bind_source, MountEntry};
pub use ops::{
    copy_tree, ensure_dir_all, hard_link, join, measure_tree, remove_dir_all,
    remove_dir_if_empty, remove_file, rename, stat_path, FileStat,
};
pub use probe::{probe, ProbeResult};
pub use resolver::{canonicalize, to_abspath, to_relpath};
