//! Directory traversal: skip symlinks, dedupe bind-mount-aliased paths, and
//! resolve each observed file's catalog-relative path (spec §4.3 steps 3-4).

use std::collections::HashSet;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use silo_fsops::mounts::MountEntry;
use silo_fsops::{canonicalize, to_relpath};
use walkdir::WalkDir;

/// A single file observed during one directory walk, already resolved to a
/// canonical, device-relative catalog path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedFile {
    /// Path relative to the device's `relpath_base`.
    pub relative_path: String,
    /// Inode number on the owning device.
    pub inode: u64,
    /// File size in bytes.
    pub size: u64,
    /// Last-modified time as reported by the filesystem.
    pub mtime: DateTime<Utc>,
}

/// Walk `root`, skipping symlinks, and return every regular file observed
/// exactly once. Files reachable via more than one path within this walk
/// (bind-mount aliasing) are deduplicated by their canonical path, keeping
/// the first observation.
#[must_use]
pub fn walk_root(root: &Path, relpath_base: &str, mounts: &[MountEntry]) -> Vec<ObservedFile> {
    let mut seen_canonical: HashSet<PathBuf> = HashSet::new();
    let mut observed = Vec::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                tracing::warn!(%error, "skipping unreadable directory entry");
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_symlink() || !file_type.is_file() {
            continue;
        }

        let raw_path = entry.path();
        let canonical = match canonicalize(raw_path, mounts) {
            Ok(canonical) => canonical,
            Err(error) => {
                tracing::warn!(path = %raw_path.display(), %error, "skipping unreadable file");
                continue;
            }
        };

        if !seen_canonical.insert(canonical.clone()) {
            continue;
        }

        let metadata = match std::fs::metadata(&canonical) {
            Ok(metadata) => metadata,
            Err(error) => {
                tracing::warn!(path = %canonical.display(), %error, "skipping unreadable file");
                continue;
            }
        };

        let relative_path = match to_relpath(&canonical, relpath_base) {
            Ok(relative_path) => relative_path,
            Err(error) => {
                tracing::warn!(
                    path = %canonical.display(),
                    %error,
                    "file lies outside device relpath base, skipping"
                );
                continue;
            }
        };

        let mtime = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        observed.push(ObservedFile {
            relative_path,
            inode: metadata.ino(),
            size: metadata.len(),
            mtime,
        });
    }

    observed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::symlink;
    use tempfile::tempdir;

    #[test]
    fn walk_root_skips_symlinks_and_resolves_relative_paths() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("show")).unwrap();
        fs::write(dir.path().join("show/episode.mkv"), b"abc").unwrap();
        symlink(
            dir.path().join("show/episode.mkv"),
            dir.path().join("show/alias.mkv"),
        )
        .unwrap();

        let base = dir.path().canonicalize().unwrap();
        let observed = walk_root(dir.path(), base.to_str().unwrap(), &[]);

        assert_eq!(observed.len(), 1);
        assert_eq!(observed[0].relative_path, "show/episode.mkv");
        assert_eq!(observed[0].size, 3);
    }

    #[test]
    fn walk_root_dedupes_files_observed_twice() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.bin"), b"x").unwrap();

        let base = dir.path().canonicalize().unwrap();
        let first = walk_root(dir.path(), base.to_str().unwrap(), &[]);
        let second = walk_root(dir.path(), base.to_str().unwrap(), &[]);
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
    }
}
