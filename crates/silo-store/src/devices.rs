//! Device registration, lookup, and the per-device file table lifecycle
//! (spec §4.2, §5: "device identifier changes trigger an O(1) table
//! rename rather than a row-by-row migration").

use chrono::{DateTime, Utc};
use silo_model::device::{Device, DeviceId, FsUuid};
use sqlx::Row;

use crate::error::{query_ctx, StoreError, StoreResult};
use crate::CatalogStore;

impl CatalogStore {
    /// Look up a device by its persistent filesystem UUID, the stable key
    /// that survives device renumbering.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_device_by_fs_uuid(&self, fs_uuid: &FsUuid) -> StoreResult<Option<Device>> {
        let row = sqlx::query(
            "SELECT id, fs_uuid, device_ident, alias, mount_point, preferred_mount_point, \
             fs_type, pool_metadata, file_count, byte_total, first_scan_at, last_scan_at, \
             scan_count FROM devices WHERE fs_uuid = ?1",
        )
        .bind(&fs_uuid.0)
        .fetch_optional(self.pool())
        .await
        .map_err(query_ctx("find_device_by_fs_uuid"))?;

        row.map(|row| self.device_from_row(&row)).transpose()
    }

    /// Look up a device by its catalog id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails, or `DeviceNotFound` if no such
    /// device exists.
    pub async fn get_device(&self, device_id: DeviceId) -> StoreResult<Device> {
        let row = sqlx::query(
            "SELECT id, fs_uuid, device_ident, alias, mount_point, preferred_mount_point, \
             fs_type, pool_metadata, file_count, byte_total, first_scan_at, last_scan_at, \
             scan_count FROM devices WHERE id = ?1",
        )
        .bind(device_id.0)
        .fetch_optional(self.pool())
        .await
        .map_err(query_ctx("get_device"))?
        .ok_or_else(|| StoreError::DeviceNotFound {
            identifier: device_id.to_string(),
        })?;

        self.device_from_row(&row)
    }

    /// List every registered device.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_devices(&self) -> StoreResult<Vec<Device>> {
        let rows = sqlx::query(
            "SELECT id, fs_uuid, device_ident, alias, mount_point, preferred_mount_point, \
             fs_type, pool_metadata, file_count, byte_total, first_scan_at, last_scan_at, \
             scan_count FROM devices ORDER BY id",
        )
        .fetch_all(self.pool())
        .await
        .map_err(query_ctx("list_devices"))?;

        rows.iter().map(|row| self.device_from_row(row)).collect()
    }

    /// Register a new device and create its per-device file table. Returns
    /// the assigned device id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert or table creation fails.
    pub async fn register_device(
        &self,
        fs_uuid: &FsUuid,
        device_ident: &str,
        mount_point: &str,
        fs_type: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<DeviceId> {
        let row = sqlx::query(
            "INSERT INTO devices (fs_uuid, device_ident, mount_point, fs_type, first_scan_at, \
             last_scan_at) VALUES (?1, ?2, ?3, ?4, ?5, ?5) RETURNING id",
        )
        .bind(&fs_uuid.0)
        .bind(device_ident)
        .bind(mount_point)
        .bind(fs_type)
        .bind(now.to_rfc3339())
        .fetch_one(self.pool())
        .await
        .map_err(query_ctx("register_device"))?;

        let id = DeviceId(row.try_get::<i64, _>("id").map_err(query_ctx("register_device"))?);
        self.create_file_table(id).await?;
        Ok(id)
    }

    /// Rename a device's identifier (e.g. `/dev/sdb` -> `/dev/sdc` after a
    /// reboot), recording the change in `device_identifier_history`. The
    /// per-device file table itself is keyed by catalog id, not identifier,
    /// so no table rename is needed here — only when the catalog id itself
    /// changes, which never happens for an existing device.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn rename_device_identifier(
        &self,
        device_id: DeviceId,
        new_ident: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let device = self.get_device(device_id).await?;
        if device.device_ident == new_ident {
            return Ok(());
        }

        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(query_ctx("rename_device_identifier"))?;

        sqlx::query("UPDATE devices SET device_ident = ?1 WHERE id = ?2")
            .bind(new_ident)
            .bind(device_id.0)
            .execute(&mut *tx)
            .await
            .map_err(query_ctx("rename_device_identifier"))?;

        sqlx::query(
            "INSERT INTO device_identifier_history (device_id, old_ident, new_ident, changed_at) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(device_id.0)
        .bind(&device.device_ident)
        .bind(new_ident)
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(query_ctx("rename_device_identifier"))?;

        tx.commit().await.map_err(query_ctx("rename_device_identifier"))?;
        Ok(())
    }

    /// Update a device's alias (human-friendly label, independent of mount
    /// point or identifier).
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn set_device_alias(&self, device_id: DeviceId, alias: &str) -> StoreResult<()> {
        sqlx::query("UPDATE devices SET alias = ?1 WHERE id = ?2")
            .bind(alias)
            .bind(device_id.0)
            .execute(self.pool())
            .await
            .map_err(query_ctx("set_device_alias"))?;
        Ok(())
    }

    /// Update a device's preferred (user-facing alias) mount point, used to
    /// compute `relpath_base` in preference to the bare canonical mount
    /// point.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn set_preferred_mount_point(
        &self,
        device_id: DeviceId,
        preferred_mount_point: &str,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE devices SET preferred_mount_point = ?1 WHERE id = ?2")
            .bind(preferred_mount_point)
            .bind(device_id.0)
            .execute(self.pool())
            .await
            .map_err(query_ctx("set_preferred_mount_point"))?;
        Ok(())
    }

    /// Roll scan totals and timestamps into a device's summary columns
    /// after a scan session completes.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn record_scan_summary(
        &self,
        device_id: DeviceId,
        file_count: i64,
        byte_total: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE devices SET file_count = ?1, byte_total = ?2, last_scan_at = ?3, \
             scan_count = scan_count + 1 WHERE id = ?4",
        )
        .bind(file_count)
        .bind(byte_total)
        .bind(now.to_rfc3339())
        .bind(device_id.0)
        .execute(self.pool())
        .await
        .map_err(query_ctx("record_scan_summary"))?;
        Ok(())
    }

    /// Create the per-device file table for a newly registered device.
    pub(crate) async fn create_file_table(&self, device_id: DeviceId) -> StoreResult<()> {
        let table = format!("files_dev_{}", device_id.0);
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                relative_path TEXT PRIMARY KEY,
                inode INTEGER NOT NULL,
                size INTEGER NOT NULL,
                mtime TEXT NOT NULL,
                fast_hash TEXT,
                full_digest TEXT,
                status TEXT NOT NULL,
                first_seen TEXT NOT NULL,
                last_seen TEXT NOT NULL,
                scan_root_id INTEGER NOT NULL
            )"
        );
        sqlx::query(&ddl)
            .execute(self.pool())
            .await
            .map_err(query_ctx("create_file_table"))?;
        Ok(())
    }

    fn device_from_row(&self, row: &sqlx::sqlite::SqliteRow) -> StoreResult<Device> {
        Ok(Device {
            id: DeviceId(row.try_get("id").map_err(query_ctx("decode_device"))?),
            fs_uuid: FsUuid(row.try_get("fs_uuid").map_err(query_ctx("decode_device"))?),
            device_ident: row.try_get("device_ident").map_err(query_ctx("decode_device"))?,
            alias: row.try_get("alias").map_err(query_ctx("decode_device"))?,
            mount_point: row.try_get("mount_point").map_err(query_ctx("decode_device"))?,
            preferred_mount_point: row
                .try_get("preferred_mount_point")
                .map_err(query_ctx("decode_device"))?,
            fs_type: row.try_get("fs_type").map_err(query_ctx("decode_device"))?,
            pool_metadata: decode_pool_metadata(row)?,
            file_count: row.try_get("file_count").map_err(query_ctx("decode_device"))?,
            byte_total: row.try_get("byte_total").map_err(query_ctx("decode_device"))?,
            first_scan_at: parse_ts(row, "first_scan_at")?,
            last_scan_at: parse_ts(row, "last_scan_at")?,
            scan_count: row.try_get("scan_count").map_err(query_ctx("decode_device"))?,
            identifier_history: Vec::new(),
        })
    }
}

fn decode_pool_metadata(row: &sqlx::sqlite::SqliteRow) -> StoreResult<Option<serde_json::Value>> {
    let raw: Option<String> = row
        .try_get("pool_metadata")
        .map_err(query_ctx("decode_device"))?;
    raw.map(|text| {
        serde_json::from_str(&text).map_err(|error| StoreError::Decode {
            table: "devices",
            reason: format!("invalid pool_metadata json: {error}"),
        })
    })
    .transpose()
}

fn parse_ts(row: &sqlx::sqlite::SqliteRow, column: &'static str) -> StoreResult<DateTime<Utc>> {
    let raw: String = row.try_get(column).map_err(query_ctx("decode_device"))?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| StoreError::Decode {
            table: "devices",
            reason: format!("invalid timestamp in {column}: {error}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use silo_model::device::FsUuid;

    #[tokio::test]
    async fn register_device_creates_file_table() {
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

        let table = format!("files_dev_{}", id.0);
        let exists: (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='{table}'"
        ))
        .fetch_one(store.pool())
        .await
        .unwrap();
        assert_eq!(exists.0, 1);
    }

    #[tokio::test]
    async fn rename_device_identifier_records_history() {
        let store = CatalogStore::connect("sqlite::memory:").await.unwrap();
        let id = store
            .register_device(
                &FsUuid("uuid-2".to_string()),
                "/dev/sdb",
                "/mnt/cold",
                "zfs",
                Utc::now(),
            )
            .await
            .unwrap();

        store
            .rename_device_identifier(id, "/dev/sdc", Utc::now())
            .await
            .unwrap();

        let device = store.get_device(id).await.unwrap();
        assert_eq!(device.device_ident, "/dev/sdc");

        let history_count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM device_identifier_history WHERE device_id = ?1")
                .bind(id.0)
                .fetch_one(store.pool())
                .await
                .unwrap();
        assert_eq!(history_count.0, 1);
    }
}
