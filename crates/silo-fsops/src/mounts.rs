//! Mount table parsing.
//!
//! Bind-mount detection cannot rely purely on `stat` device identifiers: a
//! bind-mount target shares a device with its source, so the mount table
//! must be consulted to map a bind target back to its root within the
//! filesystem (spec §4.1, §9 "bind-mount detection").

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{FsOpsError, FsOpsResult};

/// One parsed row of `/proc/self/mountinfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// Major:minor device number pair.
    pub dev: (u32, u32),
    /// Root of the mount within the filesystem (the bind-mount source when
    /// this is a bind mount; `/` for a top-level mount).
    pub root: String,
    /// Absolute mount point in this mount namespace.
    pub mount_point: PathBuf,
    /// Filesystem type (e.g. `ext4`, `zfs`, `overlay`).
    pub fs_type: String,
    /// Mount source as reported by the kernel (device path or dataset name).
    pub mount_source: String,
}

/// Parse the contents of `/proc/self/mountinfo`. Malformed lines are skipped
/// with a warning rather than aborting the whole parse, matching the
/// scanner's "unreadable entries are logged and skipped" failure policy.
#[must_use]
pub fn parse_mountinfo(contents: &str) -> Vec<MountEntry> {
    contents
        .lines()
        .filter_map(|line| match parse_mountinfo_line(line) {
            Ok(entry) => Some(entry),
            Err(()) => {
                tracing::warn!(line, "skipping malformed mountinfo line");
                None
            }
        })
        .collect()
}

fn parse_mountinfo_line(line: &str) -> Result<MountEntry, ()> {
    let mut parts = line.splitn(2, " - ");
    let head = parts.next().ok_or(())?;
    let tail = parts.next().ok_or(())?;

    let head_fields: Vec<&str> = head.split_whitespace().collect();
    if head_fields.len() < 5 {
        return Err(());
    }
    let (major, minor) = head_fields[2].split_once(':').ok_or(())?;
    let dev = (
        major.parse::<u32>().map_err(|_| ())?,
        minor.parse::<u32>().map_err(|_| ())?,
    );
    let root = head_fields[3].to_string();
    let mount_point = PathBuf::from(head_fields[4]);

    let tail_fields: Vec<&str> = tail.split_whitespace().collect();
    if tail_fields.len() < 2 {
        return Err(());
    }
    let fs_type = tail_fields[0].to_string();
    let mount_source = tail_fields[1].to_string();

    Ok(MountEntry {
        dev,
        root,
        mount_point,
        fs_type,
        mount_source,
    })
}

/// Read and parse the current process's mount table.
///
/// # Errors
///
/// Returns an error if `/proc/self/mountinfo` cannot be read.
pub fn read_mount_table() -> FsOpsResult<Vec<MountEntry>> {
    let contents = fs::read_to_string("/proc/self/mountinfo")
        .map_err(|source| FsOpsError::MountTable { source })?;
    Ok(parse_mountinfo(&contents))
}

/// Find the mount entry with the longest mount-point prefix covering `path`,
/// i.e. the mount actually owning `path`.
#[must_use]
pub fn find_owning_mount<'a>(mounts: &'a [MountEntry], path: &Path) -> Option<&'a MountEntry> {
    mounts
        .iter()
        .filter(|entry| path.starts_with(&entry.mount_point))
        .max_by_key(|entry| entry.mount_point.as_os_str().len())
}

/// Resolve a bind-mount target back to its source path by consulting the
/// mount table: if `path`'s owning mount has a non-`/` root, the path lies
/// under a bind mount and the bind source can be reconstructed by replacing
/// the mount point prefix with the mount's underlying root.
///
/// Returns `None` when the owning mount is a plain top-level mount (root is
/// `/`), meaning no bind-mount rewriting is necessary.
#[must_use]
pub fn resolve_bind_source(mounts: &[MountEntry], path: &Path) -> Option<PathBuf> {
    let entry = find_owning_mount(mounts, path)?;
    if entry.root == "/" {
        return None;
    }
    let suffix = path.strip_prefix(&entry.mount_point).ok()?;
    let root = entry.root.trim_start_matches('/');
    Some(PathBuf::from("/").join(root).join(suffix))
}
