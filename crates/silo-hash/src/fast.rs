//! Cheap "fast-sample" content fingerprint: a few megabyte-sized windows
//! rather than a full read, used to detect changed files during an
//! incremental scan without paying the cost of a full digest on every pass
//! (spec §4.3, §4.4).

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{HashError, HashResult};
use crate::hex_encode;

/// Size of each sampled window.
pub const SAMPLE_WINDOW: u64 = 1024 * 1024;

/// Compute the fast-sample hash of a file: SHA-256 over the file size
/// followed by up to three ~1MiB windows (head, middle, tail). Files
/// smaller than one window are hashed in full; this degrades gracefully
/// into a full digest for small files, which is the common case in a media
/// library of per-file sizes well above the window size.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn fast_hash(path: &Path, size: u64) -> HashResult<String> {
    let mut file = File::open(path).map_err(|source| HashError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut hasher = Sha256::new();
    hasher.update(size.to_le_bytes());

    let head_len = SAMPLE_WINDOW.min(size);
    hash_window(&mut file, path, 0, head_len, &mut hasher)?;

    if size > SAMPLE_WINDOW * 2 {
        let mid_start = size / 2 - SAMPLE_WINDOW / 2;
        hash_window(&mut file, path, mid_start, SAMPLE_WINDOW, &mut hasher)?;
    }

    if size > SAMPLE_WINDOW {
        let tail_start = size.saturating_sub(SAMPLE_WINDOW);
        let tail_len = size - tail_start;
        hash_window(&mut file, path, tail_start, tail_len, &mut hasher)?;
    }

    Ok(hex_encode(&hasher.finalize()))
}

fn hash_window(
    file: &mut File,
    path: &Path,
    offset: u64,
    len: u64,
    hasher: &mut Sha256,
) -> HashResult<()> {
    file.seek(SeekFrom::Start(offset))
        .map_err(|source| HashError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    let mut remaining = len;
    let mut buf = [0u8; 64 * 1024];
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let read = file
            .read(&mut buf[..want])
            .map_err(|source| HashError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
        remaining -= read as u64;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn fast_hash_is_stable_for_identical_contents() {
        let mut a = NamedTempFile::new().unwrap();
        let mut b = NamedTempFile::new().unwrap();
        let payload = vec![7u8; 4 * 1024 * 1024];
        a.write_all(&payload).unwrap();
        b.write_all(&payload).unwrap();

        let size = payload.len() as u64;
        let hash_a = fast_hash(a.path(), size).unwrap();
        let hash_b = fast_hash(b.path(), size).unwrap();
        assert_eq!(hash_a, hash_b);
    }

    #[test]
    fn fast_hash_differs_when_middle_changes() {
        let mut a = NamedTempFile::new().unwrap();
        let mut b = NamedTempFile::new().unwrap();
        let mut payload = vec![7u8; 4 * 1024 * 1024];
        a.write_all(&payload).unwrap();
        payload[2 * 1024 * 1024] = 9;
        b.write_all(&payload).unwrap();

        let size = payload.len() as u64;
        let hash_a = fast_hash(a.path(), size).unwrap();
        let hash_b = fast_hash(b.path(), size).unwrap();
        assert_ne!(hash_a, hash_b);
    }

    #[test]
    fn fast_hash_handles_small_files_below_window_size() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"tiny file").unwrap();
        let hash = fast_hash(f.path(), 9).unwrap();
        assert_eq!(hash.len(), 64);
    }
}
