//! Per-device file table reads and writes, plus scan-root and scan-session
//! bookkeeping (spec §4.3, §5).

use chrono::{DateTime, Utc};
use silo_model::device::DeviceId;
use silo_model::file_entry::{FileEntry, FileStatus, ScanRoot, ScanSession, ScanStatus};
use sqlx::Row;

use crate::error::{query_ctx, StoreError, StoreResult};
use crate::CatalogStore;

impl CatalogStore {
    /// Find or create the scan root row for `relative_root` on `device_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn ensure_scan_root(
        &self,
        device_id: DeviceId,
        relative_root: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<ScanRoot> {
        sqlx::query(
            "INSERT INTO scan_roots (device_id, relative_root, first_scanned_at, last_scanned_at) \
             VALUES (?1, ?2, ?3, ?3) \
             ON CONFLICT(device_id, relative_root) DO UPDATE SET last_scanned_at = excluded.last_scanned_at",
        )
        .bind(device_id.0)
        .bind(relative_root)
        .bind(now.to_rfc3339())
        .execute(self.pool())
        .await
        .map_err(query_ctx("ensure_scan_root"))?;

        let row = sqlx::query(
            "SELECT id, device_id, relative_root, first_scanned_at, last_scanned_at \
             FROM scan_roots WHERE device_id = ?1 AND relative_root = ?2",
        )
        .bind(device_id.0)
        .bind(relative_root)
        .fetch_one(self.pool())
        .await
        .map_err(query_ctx("ensure_scan_root"))?;

        scan_root_from_row(&row)
    }

    /// List every scan root recorded for a device, used by the rehome
    /// planner's scan-coverage freshness check.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_scan_roots(&self, device_id: DeviceId) -> StoreResult<Vec<ScanRoot>> {
        let rows = sqlx::query(
            "SELECT id, device_id, relative_root, first_scanned_at, last_scanned_at \
             FROM scan_roots WHERE device_id = ?1",
        )
        .bind(device_id.0)
        .fetch_all(self.pool())
        .await
        .map_err(query_ctx("list_scan_roots"))?;

        rows.iter().map(scan_root_from_row).collect()
    }

    /// Start a new scan session row, returning its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn start_scan_session(
        &self,
        device_id: DeviceId,
        scan_root_id: i64,
        parallelism: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let row = sqlx::query(
            "INSERT INTO scan_sessions (device_id, scan_root_id, started_at, status, parallelism) \
             VALUES (?1, ?2, ?3, ?4, ?5) RETURNING id",
        )
        .bind(device_id.0)
        .bind(scan_root_id)
        .bind(now.to_rfc3339())
        .bind(status_str(ScanStatus::Running))
        .bind(parallelism)
        .fetch_one(self.pool())
        .await
        .map_err(query_ctx("start_scan_session"))?;

        row.try_get("id").map_err(query_ctx("start_scan_session"))
    }

    /// Finalize a scan session with its outcome counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    #[allow(clippy::too_many_arguments)]
    pub async fn finish_scan_session(
        &self,
        session_id: i64,
        status: ScanStatus,
        added: i64,
        updated: i64,
        unchanged: i64,
        deleted: i64,
        bytes_hashed: i64,
        last_error: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE scan_sessions SET ended_at = ?1, status = ?2, added = ?3, updated = ?4, \
             unchanged = ?5, deleted = ?6, bytes_hashed = ?7, last_error = ?8 WHERE id = ?9",
        )
        .bind(now.to_rfc3339())
        .bind(status_str(status))
        .bind(added)
        .bind(updated)
        .bind(unchanged)
        .bind(deleted)
        .bind(bytes_hashed)
        .bind(last_error)
        .bind(session_id)
        .execute(self.pool())
        .await
        .map_err(query_ctx("finish_scan_session"))?;
        Ok(())
    }

    /// Fetch every active file entry on a device's table, for a full
    /// in-memory diff against a fresh directory walk.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_active_files(&self, device_id: DeviceId) -> StoreResult<Vec<FileEntry>> {
        let table = format!("files_dev_{}", device_id.0);
        let sql = format!(
            "SELECT relative_path, inode, size, mtime, fast_hash, full_digest, status, \
             first_seen, last_seen, scan_root_id FROM {table} WHERE status = 'active'"
        );
        let rows = sqlx::query(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(query_ctx("list_active_files"))?;

        rows.iter()
            .map(|row| file_entry_from_row(device_id, row))
            .collect()
    }

    /// Upsert a single file entry on a device's table, keyed by relative path.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn upsert_file_entry(&self, entry: &FileEntry) -> StoreResult<()> {
        let table = format!("files_dev_{}", entry.device_id.0);
        let sql = format!(
            "INSERT INTO {table} \
             (relative_path, inode, size, mtime, fast_hash, full_digest, status, first_seen, \
              last_seen, scan_root_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
             ON CONFLICT(relative_path) DO UPDATE SET \
                inode = excluded.inode, \
                size = excluded.size, \
                mtime = excluded.mtime, \
                fast_hash = excluded.fast_hash, \
                full_digest = excluded.full_digest, \
                status = excluded.status, \
                last_seen = excluded.last_seen, \
                scan_root_id = excluded.scan_root_id"
        );
        sqlx::query(&sql)
            .bind(&entry.relative_path)
            .bind(i64::try_from(entry.inode).unwrap_or(i64::MAX))
            .bind(i64::try_from(entry.size).unwrap_or(i64::MAX))
            .bind(entry.mtime.to_rfc3339())
            .bind(&entry.fast_hash)
            .bind(&entry.full_digest)
            .bind(status_flag(entry.status))
            .bind(entry.first_seen.to_rfc3339())
            .bind(entry.last_seen.to_rfc3339())
            .bind(entry.scan_root_id)
            .execute(self.pool())
            .await
            .map_err(query_ctx("upsert_file_entry"))?;
        Ok(())
    }

    /// Mark a file entry deleted (it was present in a prior scan but was not
    /// observed in the current walk).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn mark_file_deleted(
        &self,
        device_id: DeviceId,
        relative_path: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let table = format!("files_dev_{}", device_id.0);
        let sql =
            format!("UPDATE {table} SET status = 'deleted', last_seen = ?1 WHERE relative_path = ?2");
        sqlx::query(&sql)
            .bind(now.to_rfc3339())
            .bind(relative_path)
            .execute(self.pool())
            .await
            .map_err(query_ctx("mark_file_deleted"))?;
        Ok(())
    }

    /// Mark a file entry moved: its inode reappeared at a different active
    /// path within the same scan that deleted this row (spec §4.3 step 8).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn mark_file_moved(
        &self,
        device_id: DeviceId,
        relative_path: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let table = format!("files_dev_{}", device_id.0);
        let sql =
            format!("UPDATE {table} SET status = 'moved', last_seen = ?1 WHERE relative_path = ?2");
        sqlx::query(&sql)
            .bind(now.to_rfc3339())
            .bind(relative_path)
            .execute(self.pool())
            .await
            .map_err(query_ctx("mark_file_moved"))?;
        Ok(())
    }
}

fn status_flag(status: FileStatus) -> &'static str {
    match status {
        FileStatus::Active => "active",
        FileStatus::Deleted => "deleted",
        FileStatus::Moved => "moved",
    }
}

fn status_str(status: ScanStatus) -> &'static str {
    match status {
        ScanStatus::Running => "running",
        ScanStatus::Completed => "completed",
        ScanStatus::Interrupted => "interrupted",
        ScanStatus::Failed => "failed",
    }
}

fn scan_root_from_row(row: &sqlx::sqlite::SqliteRow) -> StoreResult<ScanRoot> {
    let err = query_ctx("decode_scan_root");
    Ok(ScanRoot {
        id: row.try_get("id").map_err(err)?,
        device_id: DeviceId(row.try_get("device_id").map_err(query_ctx("decode_scan_root"))?),
        relative_root: row
            .try_get("relative_root")
            .map_err(query_ctx("decode_scan_root"))?,
        first_scanned_at: parse_ts(row, "first_scanned_at", "scan_roots")?,
        last_scanned_at: parse_ts(row, "last_scanned_at", "scan_roots")?,
    })
}

fn file_entry_from_row(device_id: DeviceId, row: &sqlx::sqlite::SqliteRow) -> StoreResult<FileEntry> {
    let status_text: String = row
        .try_get("status")
        .map_err(query_ctx("decode_file_entry"))?;
    let status = match status_text.as_str() {
        "active" => FileStatus::Active,
        "deleted" => FileStatus::Deleted,
        "moved" => FileStatus::Moved,
        other => {
            return Err(StoreError::Decode {
                table: "files_dev_*",
                reason: format!("unknown file status {other}"),
            })
        }
    };

    let inode: i64 = row.try_get("inode").map_err(query_ctx("decode_file_entry"))?;
    let size: i64 = row.try_get("size").map_err(query_ctx("decode_file_entry"))?;

    Ok(FileEntry {
        device_id,
        relative_path: row
            .try_get("relative_path")
            .map_err(query_ctx("decode_file_entry"))?,
        inode: u64::try_from(inode).unwrap_or_default(),
        size: u64::try_from(size).unwrap_or_default(),
        mtime: parse_ts(row, "mtime", "files_dev_*")?,
        fast_hash: row.try_get("fast_hash").map_err(query_ctx("decode_file_entry"))?,
        full_digest: row
            .try_get("full_digest")
            .map_err(query_ctx("decode_file_entry"))?,
        status,
        first_seen: parse_ts(row, "first_seen", "files_dev_*")?,
        last_seen: parse_ts(row, "last_seen", "files_dev_*")?,
        scan_root_id: row
            .try_get("scan_root_id")
            .map_err(query_ctx("decode_file_entry"))?,
    })
}

fn parse_ts(
    row: &sqlx::sqlite::SqliteRow,
    column: &'static str,
    table: &'static str,
) -> StoreResult<DateTime<Utc>> {
    let raw: String = row.try_get(column).map_err(query_ctx("decode_timestamp"))?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| StoreError::Decode {
            table,
            reason: format!("invalid timestamp in {column}: {error}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use silo_model::device::FsUuid;

    async fn store_with_device() -> (CatalogStore, DeviceId) {
        let store = CatalogStore::connect("sqlite::memory:").await.unwrap();
        let id = store
            .register_device(
                &FsUuid("uuid-1".to_string()),
                "/dev/sda1",
                "/mnt/warm",
                "ext4",
                Utc::now(),
            )
            .await
            .unwrap();
        (store, id)
    }

    #[tokio::test]
    async fn upsert_then_list_round_trips_active_files() {
        let (store, device_id) = store_with_device().await;
        let now = Utc::now();
        let root = store.ensure_scan_root(device_id, "", now).await.unwrap();
        let session_id = store
            .start_scan_session(device_id, root.id, 4, now)
            .await
            .unwrap();

        let entry = FileEntry {
            device_id,
            relative_path: "show/episode.mkv".to_string(),
            inode: 42,
            size: 1024,
            mtime: now,
            fast_hash: Some("abc".to_string()),
            full_digest: None,
            status: FileStatus::Active,
            first_seen: now,
            last_seen: now,
            scan_root_id: root.id,
        };
        store.upsert_file_entry(&entry).await.unwrap();

        let active = store.list_active_files(device_id).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].relative_path, "show/episode.mkv");

        store
            .finish_scan_session(session_id, ScanStatus::Completed, 1, 0, 0, 0, 1024, None, now)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn mark_file_deleted_excludes_it_from_active_list() {
        let (store, device_id) = store_with_device().await;
        let now = Utc::now();
        let root = store.ensure_scan_root(device_id, "", now).await.unwrap();
        let entry = FileEntry {
            device_id,
            relative_path: "gone.mkv".to_string(),
            inode: 1,
            size: 1,
            mtime: now,
            fast_hash: None,
            full_digest: None,
            status: FileStatus::Active,
            first_seen: now,
            last_seen: now,
            scan_root_id: root.id,
        };
        store.upsert_file_entry(&entry).await.unwrap();
        store
            .mark_file_deleted(device_id, "gone.mkv", now)
            .await
            .unwrap();

        let active = store.list_active_files(device_id).await.unwrap();
        assert!(active.is_empty());
    }

    #[tokio::test]
    async fn list_scan_roots_returns_every_root_for_a_device() {
        let (store, device_id) = store_with_device().await;
        let now = Utc::now();
        store.ensure_scan_root(device_id, "seeding/show", now).await.unwrap();
        store.ensure_scan_root(device_id, "seeding/movies", now).await.unwrap();

        let roots = store.list_scan_roots(device_id).await.unwrap();
        assert_eq!(roots.len(), 2);
    }

    #[tokio::test]
    async fn mark_file_moved_excludes_it_from_active_list() {
        let (store, device_id) = store_with_device().await;
        let now = Utc::now();
        let root = store.ensure_scan_root(device_id, "", now).await.unwrap();
        let entry = FileEntry {
            device_id,
            relative_path: "old/path.mkv".to_string(),
            inode: 9,
            size: 1,
            mtime: now,
            fast_hash: None,
            full_digest: None,
            status: FileStatus::Active,
            first_seen: now,
            last_seen: now,
            scan_root_id: root.id,
        };
        store.upsert_file_entry(&entry).await.unwrap();
        store
            .mark_file_moved(device_id, "old/path.mkv", now)
            .await
            .unwrap();

        let active = store.list_active_files(device_id).await.unwrap();
        assert!(active.is_empty());
    }
}
