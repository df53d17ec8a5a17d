//! Scratch directory and file-tree builders.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

/// Create a fresh scratch directory that is removed when dropped.
///
/// # Panics
///
/// Panics if a temporary directory cannot be created.
#[must_use]
pub fn scratch_dir() -> TempDir {
    tempfile::tempdir().expect("failed to create scratch directory")
}

/// Write `contents` to `root.join(relative)`, creating any parent
/// directories first.
///
/// # Panics
///
/// Panics if a parent directory or the file itself cannot be created.
pub fn write_file(root: &Path, relative: &str, contents: &[u8]) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create parent directory");
    }
    fs::write(&path, contents).expect("failed to write fixture file");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_file_creates_nested_parents() {
        let dir = scratch_dir();
        write_file(dir.path(), "show/season1/episode.mkv", b"payload");

        let contents = fs::read(dir.path().join("show/season1/episode.mkv")).unwrap();
        assert_eq!(contents, b"payload");
    }
}
