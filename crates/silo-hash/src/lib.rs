//! Content hashing for the file catalog: a cheap fast-sample digest for
//! incremental rescans and a full SHA-256 digest for payload identity
//! (spec §4.3, §4.4, §4.5).
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
pub mod fast;
pub mod full;

use std::path::PathBuf;

pub use error::{HashError, HashResult};
pub use fast::{fast_hash, SAMPLE_WINDOW};
pub use full::{full_hash, hash_bytes};

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Compute the full digest of a file on a blocking thread pool, matching
/// the scanner's bounded-parallelism worker model (spec §4.3 step 5).
///
/// # Errors
///
/// Returns an error if the blocking task panics or hashing fails.
pub async fn full_hash_blocking(path: PathBuf) -> HashResult<String> {
    match tokio::task::spawn_blocking(move || full_hash(&path)).await {
        Ok(result) => result,
        Err(join_error) => {
            tracing::error!(%join_error, "full hash worker panicked");
            Err(HashError::Read {
                path: PathBuf::new(),
                source: std::io::Error::other(join_error),
            })
        }
    }
}

/// Compute the fast-sample digest of a file on a blocking thread pool.
///
/// # Errors
///
/// Returns an error if the blocking task panics or hashing fails.
pub async fn fast_hash_blocking(path: PathBuf, size: u64) -> HashResult<String> {
    match tokio::task::spawn_blocking(move || fast_hash(&path, size)).await {
        Ok(result) => result,
        Err(join_error) => {
            tracing::error!(%join_error, "fast hash worker panicked");
            Err(HashError::Read {
                path: PathBuf::new(),
                source: std::io::Error::other(join_error),
            })
        }
    }
}
