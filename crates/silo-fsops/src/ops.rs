//! Mutating filesystem primitives used by the link and rehome executors:
//! re-`stat` for same-device/same-inode verification, `rename`, `link`, and
//! `unlink` (spec §4.6 step 1-7, §6 "POSIX operations").

use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{FsOpsError, FsOpsResult};

/// The subset of `stat(2)` fields the link and rehome executors need to
/// verify same-device and same-inode conditions before and after a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Device number the file resides on.
    pub dev: u64,
    /// Inode number.
    pub inode: u64,
    /// Size in bytes.
    pub size: u64,
}

/// Re-`stat` a path. Used to verify a duplicate still exists, has not
/// changed inode underneath the planner, and resides on the expected
/// device before an action runs.
///
/// # Errors
///
/// Returns an error if the path cannot be stat-ed.
pub fn stat_path(path: &Path) -> FsOpsResult<FileStat> {
    let metadata = fs::metadata(path).map_err(|source| FsOpsError::Mutate {
        operation: "stat",
        path: path.to_path_buf(),
        source,
    })?;
    Ok(FileStat {
        dev: metadata.dev(),
        inode: metadata.ino(),
        size: metadata.len(),
    })
}

/// Rename `from` to `to`, e.g. to back up a duplicate before linking over
/// it, or to move an entire payload root on the same device.
///
/// # Errors
///
/// Returns an error if the rename fails.
pub fn rename(from: &Path, to: &Path) -> FsOpsResult<()> {
    fs::rename(from, to).map_err(|source| FsOpsError::Mutate {
        operation: "rename",
        path: from.to_path_buf(),
        source,
    })
}

/// Create a hardlink at `link` pointing to `original`.
///
/// # Errors
///
/// Returns an error if the link cannot be created (e.g. cross-device).
pub fn hard_link(original: &Path, link: &Path) -> FsOpsResult<()> {
    fs::hard_link(original, link).map_err(|source| FsOpsError::Mutate {
        operation: "hard_link",
        path: link.to_path_buf(),
        source,
    })
}

/// Remove a single file, e.g. a backup once a hardlink has been verified.
///
/// # Errors
///
/// Returns an error if the removal fails.
pub fn remove_file(path: &Path) -> FsOpsResult<()> {
    fs::remove_file(path).map_err(|source| FsOpsError::Mutate {
        operation: "remove_file",
        path: path.to_path_buf(),
        source,
    })
}

/// Create `path` and every missing parent directory, e.g. a per-torrent
/// hardlink view root under a target payload's parent.
///
/// # Errors
///
/// Returns an error if any directory cannot be created.
pub fn ensure_dir_all(path: &Path) -> FsOpsResult<()> {
    fs::create_dir_all(path).map_err(|source| FsOpsError::Mutate {
        operation: "create_dir_all",
        path: path.to_path_buf(),
        source,
    })
}

/// Remove a directory and everything beneath it, e.g. a source-side torrent
/// view left behind after a rehome relocation (spec §4.8 "optional
/// cleanup"). Never call this on a canonical payload root.
///
/// # Errors
///
/// Returns an error if the removal fails.
pub fn remove_dir_all(path: &Path) -> FsOpsResult<()> {
    fs::remove_dir_all(path).map_err(|source| FsOpsError::Mutate {
        operation: "remove_dir_all",
        path: path.to_path_buf(),
        source,
    })
}

/// Remove `path` if it is an empty directory; a non-empty directory is left
/// untouched and reported as `Ok`. Used to prune empty directories left
/// behind under seeding roots after a rehome relocation.
///
/// # Errors
///
/// Returns an error if `path` exists, is empty, and still cannot be removed.
pub fn remove_dir_if_empty(path: &Path) -> FsOpsResult<bool> {
    match fs::read_dir(path) {
        Ok(mut entries) => {
            if entries.next().is_some() {
                return Ok(false);
            }
        }
        Err(_) => return Ok(false),
    }
    fs::remove_dir(path).map_err(|source| FsOpsError::Mutate {
        operation: "remove_dir",
        path: path.to_path_buf(),
        source,
    })?;
    Ok(true)
}

/// Copy every regular file under `source` to the matching relative path
/// under `target`, creating directories as needed. Used for a cross-device
/// payload move, where a rename is impossible (spec §4.8 MOVE step 3,
/// "verified copy-then-delete").
///
/// Returns the number of files copied and their total byte count, for the
/// caller to verify against the recorded checksums before deleting the
/// source.
///
/// # Errors
///
/// Returns an error if the source cannot be walked or any file fails to
/// copy.
pub fn copy_tree(source: &Path, target: &Path) -> FsOpsResult<(u64, u64)> {
    let mut file_count = 0u64;
    let mut total_bytes = 0u64;

    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(|error| FsOpsError::Mutate {
            operation: "copy_tree",
            path: source.to_path_buf(),
            source: error.into_io_error().unwrap_or_else(|| {
                std::io::Error::other("directory walk failed")
            }),
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(source)
            .unwrap_or_else(|_| entry.path());
        let destination = target.join(relative);
        if let Some(parent) = destination.parent() {
            ensure_dir_all(parent)?;
        }

        let bytes = fs::copy(entry.path(), &destination).map_err(|source| FsOpsError::Mutate {
            operation: "copy_tree",
            path: destination.clone(),
            source,
        })?;
        file_count += 1;
        total_bytes += bytes;
    }

    Ok((file_count, total_bytes))
}

/// Join `base` and `relative`, used to compute a per-torrent view path under
/// a payload root.
#[must_use]
pub fn join(base: &Path, relative: &str) -> PathBuf {
    base.join(relative)
}

/// Walk `path` and count its regular files and their total byte size,
/// without copying anything. Used by the rehome executor to verify a payload
/// tree still matches its recorded plan before and after a relocation.
///
/// # Errors
///
/// Returns an error if the tree cannot be walked.
pub fn measure_tree(path: &Path) -> FsOpsResult<(u64, u64)> {
    let mut file_count = 0u64;
    let mut total_bytes = 0u64;

    for entry in WalkDir::new(path).follow_links(false) {
        let entry = entry.map_err(|error| FsOpsError::Mutate {
            operation: "measure_tree",
            path: path.to_path_buf(),
            source: error
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let size = entry
            .metadata()
            .map_err(|error| FsOpsError::Mutate {
                operation: "measure_tree",
                path: entry.path().to_path_buf(),
                source: error
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("metadata read failed")),
            })?
            .len();
        file_count += 1;
        total_bytes += size;
    }

    Ok((file_count, total_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn rename_then_hard_link_then_verify_inode_matches() {
        let dir = tempdir().unwrap();
        let canonical = dir.path().join("canonical.bin");
        let duplicate = dir.path().join("duplicate.bin");
        fs::write(&canonical, b"same content").unwrap();
        fs::write(&duplicate, b"same content").unwrap();

        let canonical_stat = stat_path(&canonical).unwrap();
        let backup = dir.path().join("duplicate.bin.backup");
        rename(&duplicate, &backup).unwrap();
        hard_link(&canonical, &duplicate).unwrap();

        let linked_stat = stat_path(&duplicate).unwrap();
        assert_eq!(linked_stat.inode, canonical_stat.inode);
        assert_eq!(linked_stat.dev, canonical_stat.dev);

        remove_file(&backup).unwrap();
        assert!(!backup.exists());
    }

    #[test]
    fn stat_path_reports_size() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.bin");
        fs::write(&file, b"12345").unwrap();
        assert_eq!(stat_path(&file).unwrap().size, 5);
    }

    #[test]
    fn copy_tree_copies_nested_files_and_reports_totals() {
        let source = tempdir().unwrap();
        let target = tempdir().unwrap();
        fs::create_dir_all(source.path().join("show/season1")).unwrap();
        fs::write(source.path().join("show/season1/e1.mkv"), b"12345").unwrap();
        fs::write(source.path().join("show/nfo.txt"), b"abc").unwrap();

        let (file_count, total_bytes) = copy_tree(source.path(), target.path()).unwrap();
        assert_eq!(file_count, 2);
        assert_eq!(total_bytes, 8);
        assert!(target.path().join("show/season1/e1.mkv").exists());
        assert!(target.path().join("show/nfo.txt").exists());
    }

    #[test]
    fn remove_dir_if_empty_leaves_nonempty_directories() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("f.txt"), b"x").unwrap();

        assert!(!remove_dir_if_empty(&sub).unwrap());
        assert!(sub.exists());

        fs::remove_file(sub.join("f.txt")).unwrap();
        assert!(remove_dir_if_empty(&sub).unwrap());
        assert!(!sub.exists());
    }

    #[test]
    fn ensure_dir_all_creates_nested_path() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        ensure_dir_all(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn measure_tree_counts_files_and_bytes_without_copying() {
        let source = tempdir().unwrap();
        fs::create_dir_all(source.path().join("show/season1")).unwrap();
        fs::write(source.path().join("show/season1/e1.mkv"), b"12345").unwrap();
        fs::write(source.path().join("show/nfo.txt"), b"abc").unwrap();

        let (file_count, total_bytes) = measure_tree(source.path()).unwrap();
        assert_eq!(file_count, 2);
        assert_eq!(total_bytes, 8);
    }
}
