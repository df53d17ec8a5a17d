//! Bounded-parallelism hashing worker pool (spec §4.3 step 6, §5
//! concurrency model).

use std::path::PathBuf;
use std::sync::Arc;

use silo_model::payload::HashMode;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::ScanResult;

/// A single file queued for hashing.
#[derive(Debug, Clone)]
pub struct HashJob {
    /// Catalog-relative path, carried through so results can be matched back
    /// to their row.
    pub relative_path: String,
    /// Absolute path to read.
    pub absolute_path: PathBuf,
    /// File size, passed through to the fast-sample hasher.
    pub size: u64,
}

/// The hashes computed for one file.
#[derive(Debug, Clone)]
pub struct HashOutcome {
    /// Catalog-relative path the hashes belong to.
    pub relative_path: String,
    /// Cheap pre-filter hash, if computed.
    pub fast_hash: Option<String>,
    /// Full content digest, if computed.
    pub full_digest: Option<String>,
    /// Bytes read while computing the full digest (0 if not computed).
    pub bytes_hashed: u64,
}

/// Run every job across a `workers`-wide pool, computing the hashes
/// `mode` calls for. Each result is paired with its job's relative path so a
/// failed job can be logged and its row left unchanged rather than aborting
/// the batch (spec §4.3 "failure modes").
pub async fn run_hash_jobs(
    jobs: Vec<HashJob>,
    mode: HashMode,
    workers: usize,
) -> Vec<(String, ScanResult<HashOutcome>)> {
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let mut tasks = JoinSet::new();

    for job in jobs {
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let relative_path = job.relative_path.clone();
            let permit = semaphore
                .acquire_owned()
                .await
                .expect("hash worker semaphore closed unexpectedly");
            let outcome = hash_one(job, mode).await;
            drop(permit);
            (relative_path, outcome)
        });
    }

    let mut results = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(join_error) => {
                tracing::error!(%join_error, "hash worker task panicked");
            }
        }
    }
    results
}

async fn hash_one(job: HashJob, mode: HashMode) -> ScanResult<HashOutcome> {
    let mut fast_hash = None;
    let mut full_digest = None;
    let mut bytes_hashed = 0u64;

    if matches!(mode, HashMode::Fast | HashMode::Full) {
        fast_hash = Some(silo_hash::fast_hash_blocking(job.absolute_path.clone(), job.size).await?);
    }
    if matches!(mode, HashMode::Full | HashMode::Upgrade) {
        full_digest = Some(silo_hash::full_hash_blocking(job.absolute_path.clone()).await?);
        bytes_hashed = job.size;
    }

    Ok(HashOutcome {
        relative_path: job.relative_path,
        fast_hash,
        full_digest,
        bytes_hashed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn run_hash_jobs_computes_fast_and_full_for_full_mode() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.bin");
        fs::write(&path, b"hello world").unwrap();

        let jobs = vec![HashJob {
            relative_path: "a.bin".to_string(),
            absolute_path: path,
            size: 11,
        }];
        let results = run_hash_jobs(jobs, HashMode::Full, 2).await;
        assert_eq!(results.len(), 1);
        let (relative_path, outcome) = &results[0];
        assert_eq!(relative_path, "a.bin");
        let outcome = outcome.as_ref().unwrap();
        assert!(outcome.fast_hash.is_some());
        assert!(outcome.full_digest.is_some());
        assert_eq!(outcome.bytes_hashed, 11);
    }

    #[tokio::test]
    async fn run_hash_jobs_fast_mode_skips_full_digest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.bin");
        fs::write(&path, b"hello world").unwrap();

        let jobs = vec![HashJob {
            relative_path: "a.bin".to_string(),
            absolute_path: path,
            size: 11,
        }];
        let results = run_hash_jobs(jobs, HashMode::Fast, 2).await;
        let (_, outcome) = &results[0];
        let outcome = outcome.as_ref().unwrap();
        assert!(outcome.fast_hash.is_some());
        assert!(outcome.full_digest.is_none());
    }

    #[tokio::test]
    async fn run_hash_jobs_reports_failure_for_missing_file() {
        let jobs = vec![HashJob {
            relative_path: "missing.bin".to_string(),
            absolute_path: PathBuf::from("/nonexistent/path/missing.bin"),
            size: 0,
        }];
        let results = run_hash_jobs(jobs, HashMode::Full, 1).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].1.is_err());
    }
}
