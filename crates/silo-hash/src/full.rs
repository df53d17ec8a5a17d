//! Full SHA-256 content digest, used to confirm a fast-sample match and to
//! build payload manifests (spec §4.4, §4.5).

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{HashError, HashResult};
use crate::hex_encode;

/// Compute the SHA-256 digest of an in-memory buffer, used to fingerprint a
/// payload manifest rather than a file on disk (spec §4.5 step 4).
#[must_use]
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex_encode(&hasher.finalize())
}

/// Compute the full SHA-256 digest of a file's contents.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn full_hash(path: &Path) -> HashResult<String> {
    let mut file = File::open(path).map_err(|source| HashError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut hasher = Sha256::new();
    let mut buf = [0u8; 256 * 1024];
    loop {
        let read = file.read(&mut buf).map_err(|source| HashError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    Ok(hex_encode(&hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn full_hash_matches_known_digest_of_empty_file() {
        let file = NamedTempFile::new().unwrap();
        let digest = full_hash(file.path()).unwrap();
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn full_hash_differs_for_different_contents() {
        let mut a = NamedTempFile::new().unwrap();
        let mut b = NamedTempFile::new().unwrap();
        a.write_all(b"alpha").unwrap();
        b.write_all(b"beta").unwrap();
        assert_ne!(full_hash(a.path()).unwrap(), full_hash(b.path()).unwrap());
    }

    #[test]
    fn hash_bytes_matches_known_digest_of_empty_input() {
        assert_eq!(
            hash_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn hash_bytes_differs_for_different_inputs() {
        assert_ne!(hash_bytes(b"alpha"), hash_bytes(b"beta"));
    }
}
