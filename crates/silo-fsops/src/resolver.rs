//! Canonical path resolution: symlinks and bind mounts collapsed to a
//! single canonical form, and conversion between absolute paths and
//! device-relative paths (spec §4.1).

use std::path::{Path, PathBuf};

use crate::error::{FsOpsError, FsOpsResult};
use crate::mounts::{self, MountEntry};

/// Canonicalize `path`, then resolve any bind mount covering the result back
/// to its underlying source, repeating until a fixed point is reached. Two
/// paths that name the same inode via any combination of symlinks or bind
/// mounts resolve to the same canonical form.
///
/// # Errors
///
/// Returns an error if `path` cannot be canonicalized (it must exist).
pub fn canonicalize(path: &Path, mounts: &[MountEntry]) -> FsOpsResult<PathBuf> {
    let mut current = path
        .canonicalize()
        .map_err(|source| FsOpsError::Canonicalize {
            path: path.to_path_buf(),
            source,
        })?;

    // Bind-mount resolution can reveal a new symlink chain (the source tree
    // may itself contain symlinks the bind target hid), so alternate
    // canonicalize/resolve-bind-source until neither changes the path.
    loop {
        match mounts::resolve_bind_source(mounts, &current) {
            Some(resolved) if resolved != current => {
                current = resolved
                    .canonicalize()
                    .map_err(|source| FsOpsError::Canonicalize {
                        path: resolved,
                        source,
                    })?;
            }
            _ => break,
        }
    }

    Ok(current)
}

/// Convert a canonical absolute path to a path relative to a device's
/// `relpath_base` (spec §4.1: "relative paths are always computed against
/// the canonical mount point, never a user-facing alias").
///
/// # Errors
///
/// Returns an error if `path` does not lie under `relpath_base`.
pub fn to_relpath(path: &Path, relpath_base: &str) -> FsOpsResult<String> {
    let base = Path::new(relpath_base);
    let relative = path.strip_prefix(base).map_err(|_| FsOpsError::NoMountEntry {
        path: path.to_path_buf(),
    })?;
    Ok(relative.to_string_lossy().replace(std::path::MAIN_SEPARATOR, "/"))
}

/// Convert a device-relative path back to an absolute path under
/// `relpath_base`. The inverse of [`to_relpath`]; round-tripping a path
/// through `to_relpath` then `to_abspath` always yields the original
/// canonical path.
#[must_use]
pub fn to_abspath(relative: &str, relpath_base: &str) -> PathBuf {
    Path::new(relpath_base).join(relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::symlink;
    use tempfile::tempdir;

    #[test]
    fn canonicalize_resolves_symlinks_with_no_bind_mounts() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("real.txt");
        fs::write(&target, b"x").unwrap();
        let link = dir.path().join("alias.txt");
        symlink(&target, &link).unwrap();

        let resolved = canonicalize(&link, &[]).unwrap();
        assert_eq!(resolved, target.canonicalize().unwrap());
    }

    #[test]
    fn to_relpath_strips_base_and_normalizes_separators() {
        let base = "/mnt/warm";
        let path = Path::new("/mnt/warm/seeding/show/episode.mkv");
        let rel = to_relpath(path, base).unwrap();
        assert_eq!(rel, "seeding/show/episode.mkv");
    }

    #[test]
    fn to_relpath_rejects_paths_outside_base() {
        let base = "/mnt/warm";
        let path = Path::new("/mnt/cold/seeding/show/episode.mkv");
        assert!(to_relpath(path, base).is_err());
    }

    #[test]
    fn to_abspath_is_inverse_of_to_relpath() {
        let base = "/mnt/warm";
        let original = Path::new("/mnt/warm/seeding/show/episode.mkv");
        let rel = to_relpath(original, base).unwrap();
        let roundtripped = to_abspath(&rel, base);
        assert_eq!(roundtripped, original);
    }
}
