//! Scan orchestration: the full spec §4.3 algorithm, plus the device
//! identifier renumbering check of spec §4.4.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use silo_events::{Event, EventBus};
use silo_fsops::mounts::MountEntry;
use silo_model::device::DeviceId;
use silo_model::file_entry::{FileEntry, FileStatus, ScanStatus};
use silo_model::payload::HashMode;
use silo_store::{CatalogStore, StoreResult};

use crate::error::{ScanError, ScanResult};
use crate::hashing::{run_hash_jobs, HashJob, HashOutcome};
use crate::walk::walk_root;

const MAX_CATALOG_RETRIES: u32 = 3;

/// Parameters controlling one scan run.
#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    /// Which hashes to (re)compute.
    pub hash_mode: HashMode,
    /// Hashing worker pool width.
    pub workers: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            hash_mode: HashMode::Fast,
            workers: 4,
        }
    }
}

/// Outcome counters for one completed scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Catalog id of the finished scan session.
    pub session_id: i64,
    /// Device scanned.
    pub device_id: DeviceId,
    /// New active rows inserted.
    pub added: i64,
    /// Existing rows whose metadata changed.
    pub updated: i64,
    /// Existing rows observed unchanged.
    pub unchanged: i64,
    /// Rows transitioned to `deleted` or `moved`.
    pub deleted: i64,
    /// Total bytes hashed during this session.
    pub bytes_hashed: i64,
}

/// Scan `root`, updating the catalog in place, and return the session's
/// outcome counters.
///
/// # Errors
///
/// Returns an error if probing the root fails, or if catalog writes
/// continue to fail after retrying (spec §4.3 "failure modes").
pub async fn scan_root(
    store: &CatalogStore,
    events: Option<&EventBus>,
    root: &Path,
    options: &ScanOptions,
) -> ScanResult<ScanOutcome> {
    let now = Utc::now();
    let mounts = silo_fsops::read_mount_table()?;
    let probe = silo_fsops::probe(root, &mounts)?;

    let device_id = resolve_device(store, &probe, now).await?;
    let device = store.get_device(device_id).await.map_err(|source| ScanError::Catalog { source })?;
    let relpath_base = device.relpath_base().to_string();

    let canonical_root = silo_fsops::canonicalize(root, &mounts)?;
    let relative_root = silo_fsops::to_relpath(&canonical_root, &relpath_base)?;

    let scan_root_row = store
        .ensure_scan_root(device_id, &relative_root, now)
        .await
        .map_err(|source| ScanError::Catalog { source })?;
    let session_id = store
        .start_scan_session(device_id, scan_root_row.id, options.workers as i64, now)
        .await
        .map_err(|source| ScanError::Catalog { source })?;

    if let Some(bus) = events {
        bus.publish(Event::ScanStarted {
            device_id: device_id.0,
            relative_root: relative_root.clone(),
        });
    }

    match run_scan_session(
        store,
        events,
        device_id,
        session_id,
        &scan_root_row,
        &canonical_root,
        &relpath_base,
        &mounts,
        options,
        now,
    )
    .await
    {
        Ok(outcome) => Ok(outcome),
        Err(error) => {
            let finish_now = Utc::now();
            let _ = store
                .finish_scan_session(
                    session_id,
                    ScanStatus::Failed,
                    0,
                    0,
                    0,
                    0,
                    0,
                    Some(&error.to_string()),
                    finish_now,
                )
                .await;
            if let Some(bus) = events {
                bus.publish(Event::ScanFailed {
                    device_id: device_id.0,
                    message: error.to_string(),
                });
            }
            Err(error)
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_scan_session(
    store: &CatalogStore,
    events: Option<&EventBus>,
    device_id: DeviceId,
    session_id: i64,
    scan_root_row: &silo_model::file_entry::ScanRoot,
    canonical_root: &Path,
    relpath_base: &str,
    mounts: &[MountEntry],
    options: &ScanOptions,
    now: chrono::DateTime<Utc>,
) -> ScanResult<ScanOutcome> {
    let existing: HashMap<String, FileEntry> = store
        .list_active_files(device_id)
        .await
        .map_err(|source| ScanError::Catalog { source })?
        .into_iter()
        .filter(|entry| scan_root_row.covers(&entry.relative_path))
        .map(|entry| (entry.relative_path.clone(), entry))
        .collect();

    let root_owned = canonical_root.to_path_buf();
    let relpath_base_owned = relpath_base.to_string();
    let mounts_owned = mounts.to_vec();
    let observed = tokio::task::spawn_blocking(move || {
        walk_root(&root_owned, &relpath_base_owned, &mounts_owned)
    })
    .await
    .map_err(|join_error| ScanError::Walk {
        reason: join_error.to_string(),
    })?;

    let mut remaining_existing = existing.clone();
    let mut hash_jobs = Vec::new();
    let mut pending_entries: HashMap<String, FileEntry> = HashMap::new();
    let mut added = 0i64;
    let mut updated = 0i64;
    let mut unchanged = 0i64;
    let mut added_inodes: HashMap<u64, String> = HashMap::new();

    for file in &observed {
        added_inodes.insert(file.inode, file.relative_path.clone());
        match remaining_existing.remove(&file.relative_path) {
            None => {
                added += 1;
                let entry = FileEntry {
                    device_id,
                    relative_path: file.relative_path.clone(),
                    inode: file.inode,
                    size: file.size,
                    mtime: file.mtime,
                    fast_hash: None,
                    full_digest: None,
                    status: FileStatus::Active,
                    first_seen: now,
                    last_seen: now,
                    scan_root_id: scan_root_row.id,
                };
                if needs_rehash(options.hash_mode, &entry) {
                    hash_jobs.push(HashJob {
                        relative_path: file.relative_path.clone(),
                        absolute_path: silo_fsops::to_abspath(&file.relative_path, relpath_base),
                        size: file.size,
                    });
                }
                pending_entries.insert(file.relative_path.clone(), entry);
            }
            Some(mut entry) => {
                let changed = entry.size != file.size || entry.mtime != file.mtime || entry.inode != file.inode;
                entry.inode = file.inode;
                entry.size = file.size;
                entry.mtime = file.mtime;
                entry.last_seen = now;
                if changed {
                    updated += 1;
                    // Upgrade mode never invalidates sample hashes or
                    // already-computed digests, even for rows whose metadata
                    // changed; it only backfills missing full digests.
                    if !matches!(options.hash_mode, HashMode::Upgrade) {
                        entry.fast_hash = None;
                        entry.full_digest = None;
                    }
                } else {
                    unchanged += 1;
                }
                let should_hash = match options.hash_mode {
                    HashMode::Fast | HashMode::Full => changed,
                    HashMode::Upgrade => entry.full_digest.is_none(),
                };
                if should_hash {
                    hash_jobs.push(HashJob {
                        relative_path: file.relative_path.clone(),
                        absolute_path: silo_fsops::to_abspath(&file.relative_path, relpath_base),
                        size: file.size,
                    });
                }
                pending_entries.insert(file.relative_path.clone(), entry);
            }
        }
    }

    let hash_results = run_hash_jobs(hash_jobs, options.hash_mode, options.workers).await;
    let mut bytes_hashed = 0i64;
    for (relative_path, outcome) in hash_results {
        match outcome {
            Ok(HashOutcome {
                fast_hash,
                full_digest,
                bytes_hashed: hashed,
                ..
            }) => {
                bytes_hashed += i64::try_from(hashed).unwrap_or(i64::MAX);
                if let Some(entry) = pending_entries.get_mut(&relative_path) {
                    if fast_hash.is_some() {
                        entry.fast_hash = fast_hash;
                    }
                    if full_digest.is_some() {
                        entry.full_digest = full_digest;
                    }
                }
            }
            Err(error) => {
                tracing::warn!(relative_path, %error, "skipping file after hash failure");
                pending_entries.remove(&relative_path);
            }
        }
    }

    for entry in pending_entries.values() {
        with_catalog_retry("upsert_file_entry", || store.upsert_file_entry(entry)).await?;
    }

    if let Some(bus) = events {
        bus.publish(Event::ScanProgress {
            device_id: device_id.0,
            files_processed: observed.len() as u64,
            bytes_hashed: bytes_hashed.max(0) as u64,
        });
    }

    let mut deleted = 0i64;
    for (relative_path, entry) in &remaining_existing {
        if let Some(new_path) = added_inodes.get(&entry.inode) {
            if new_path != relative_path {
                with_catalog_retry("mark_file_moved", || {
                    store.mark_file_moved(device_id, relative_path, now)
                })
                .await?;
                deleted += 1;
                continue;
            }
        }
        with_catalog_retry("mark_file_deleted", || {
            store.mark_file_deleted(device_id, relative_path, now)
        })
        .await?;
        deleted += 1;
    }

    let finish_now = Utc::now();
    with_catalog_retry("finish_scan_session", || {
        store.finish_scan_session(
            session_id,
            ScanStatus::Completed,
            added,
            updated,
            unchanged,
            deleted,
            bytes_hashed,
            None,
            finish_now,
        )
    })
    .await?;

    let active_after = store
        .list_active_files(device_id)
        .await
        .map_err(|source| ScanError::Catalog { source })?;
    let file_count = active_after.len() as i64;
    let byte_total = active_after.iter().map(|entry| entry.size as i64).sum();
    store
        .record_scan_summary(device_id, file_count, byte_total, finish_now)
        .await
        .map_err(|source| ScanError::Catalog { source })?;

    if let Some(bus) = events {
        bus.publish(Event::ScanCompleted {
            device_id: device_id.0,
            added,
            updated,
            deleted,
        });
    }

    Ok(ScanOutcome {
        session_id,
        device_id,
        added,
        updated,
        unchanged,
        deleted,
        bytes_hashed,
    })
}

fn needs_rehash(mode: HashMode, entry: &FileEntry) -> bool {
    match mode {
        HashMode::Fast | HashMode::Full => true,
        HashMode::Upgrade => entry.full_digest.is_none(),
    }
}

async fn resolve_device(
    store: &CatalogStore,
    probe: &silo_fsops::ProbeResult,
    now: chrono::DateTime<Utc>,
) -> ScanResult<DeviceId> {
    match store
        .find_device_by_fs_uuid(&probe.fs_uuid)
        .await
        .map_err(|source| ScanError::Catalog { source })?
    {
        Some(device) => {
            if device.device_ident != probe.device_ident {
                tracing::info!(
                    old_ident = device.device_ident,
                    new_ident = probe.device_ident,
                    "device identifier changed, renumbering"
                );
                with_catalog_retry("rename_device_identifier", || {
                    store.rename_device_identifier(device.id, &probe.device_ident, now)
                })
                .await?;
            }
            if device.preferred_mount_point.is_none() {
                with_catalog_retry("set_preferred_mount_point", || {
                    store.set_preferred_mount_point(device.id, &probe.mount_point.to_string_lossy())
                })
                .await?;
            }
            Ok(device.id)
        }
        None => {
            let device_id = with_catalog_retry("register_device", || {
                store.register_device(
                    &probe.fs_uuid,
                    &probe.device_ident,
                    &probe.mount_point.to_string_lossy(),
                    &probe.fs_type,
                    now,
                )
            })
            .await?;
            with_catalog_retry("set_preferred_mount_point", || {
                store.set_preferred_mount_point(device_id, &probe.mount_point.to_string_lossy())
            })
            .await?;
            Ok(device_id)
        }
    }
}

async fn with_catalog_retry<T, F, Fut>(operation: &'static str, mut call: F) -> ScanResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = StoreResult<T>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(source) if attempt < MAX_CATALOG_RETRIES => {
                attempt += 1;
                tracing::warn!(operation, attempt, error = %source, "retrying catalog write");
                tokio::time::sleep(Duration::from_millis(100 * u64::from(attempt))).await;
            }
            Err(source) => return Err(ScanError::Catalog { source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    async fn store() -> CatalogStore {
        CatalogStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn scan_root_registers_device_and_catalogs_files() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("show")).unwrap();
        fs::write(dir.path().join("show/episode.mkv"), vec![0u8; 16]).unwrap();

        let store = store().await;
        let options = ScanOptions {
            hash_mode: HashMode::Full,
            workers: 2,
        };
        let outcome = scan_root(&store, None, dir.path(), &options).await.unwrap();

        assert_eq!(outcome.added, 1);
        assert_eq!(outcome.unchanged, 0);
        assert_eq!(outcome.deleted, 0);

        let active = store.list_active_files(outcome.device_id).await.unwrap();
        assert_eq!(active.len(), 1);
        assert!(active[0].full_digest.is_some());
        assert!(active[0].fast_hash.is_some());
    }

    #[tokio::test]
    async fn second_scan_with_no_changes_reports_unchanged() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.bin"), vec![1u8; 8]).unwrap();

        let store = store().await;
        let options = ScanOptions {
            hash_mode: HashMode::Fast,
            workers: 1,
        };
        scan_root(&store, None, dir.path(), &options).await.unwrap();
        let second = scan_root(&store, None, dir.path(), &options).await.unwrap();

        assert_eq!(second.added, 0);
        assert_eq!(second.unchanged, 1);
    }

    #[tokio::test]
    async fn deleting_a_file_marks_its_row_deleted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.bin");
        fs::write(&path, vec![1u8; 8]).unwrap();

        let store = store().await;
        let options = ScanOptions {
            hash_mode: HashMode::Fast,
            workers: 1,
        };
        let first = scan_root(&store, None, dir.path(), &options).await.unwrap();
        fs::remove_file(&path).unwrap();
        let second = scan_root(&store, None, dir.path(), &options).await.unwrap();

        assert_eq!(second.deleted, 1);
        let active = store.list_active_files(first.device_id).await.unwrap();
        assert!(active.is_empty());
    }

    #[tokio::test]
    async fn upgrade_mode_fills_missing_full_digest_without_touching_fast_hash() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.bin"), vec![2u8; 8]).unwrap();

        let store = store().await;
        let fast_only = ScanOptions {
            hash_mode: HashMode::Fast,
            workers: 1,
        };
        let first = scan_root(&store, None, dir.path(), &fast_only).await.unwrap();
        let before = store.list_active_files(first.device_id).await.unwrap();
        assert!(before[0].fast_hash.is_some());
        assert!(before[0].full_digest.is_none());

        let upgrade = ScanOptions {
            hash_mode: HashMode::Upgrade,
            workers: 1,
        };
        scan_root(&store, None, dir.path(), &upgrade).await.unwrap();
        let after = store.list_active_files(first.device_id).await.unwrap();
        assert!(after[0].full_digest.is_some());
        assert_eq!(after[0].fast_hash, before[0].fast_hash);
    }
}
