//! Payload identity and torrent-instance bookkeeping (spec §4.5, §4.4).

use chrono::{DateTime, Utc};
use silo_model::device::DeviceId;
use silo_model::payload::{Payload, TorrentInstance};
use sqlx::Row;
use std::collections::BTreeSet;

use crate::error::{query_ctx, StoreError, StoreResult};
use crate::CatalogStore;

impl CatalogStore {
    /// Upsert a payload's computed identity for a (device, root) pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn upsert_payload(&self, payload: &Payload) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO payloads (payload_hash, device_id, relative_root, file_count, \
             total_bytes, last_built_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(device_id, relative_root) DO UPDATE SET \
                payload_hash = excluded.payload_hash, \
                file_count = excluded.file_count, \
                total_bytes = excluded.total_bytes, \
                last_built_at = excluded.last_built_at",
        )
        .bind(&payload.payload_hash)
        .bind(payload.device_id.0)
        .bind(&payload.relative_root)
        .bind(payload.file_count)
        .bind(payload.total_bytes)
        .bind(payload.last_built_at.to_rfc3339())
        .execute(self.pool())
        .await
        .map_err(query_ctx("upsert_payload"))?;
        Ok(())
    }

    /// Find every payload sharing `payload_hash`, across any device — the
    /// full sibling set used by both the link planner (same-device subset)
    /// and the rehome planner (cross-device reuse check).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_payloads_by_hash(&self, payload_hash: &str) -> StoreResult<Vec<Payload>> {
        let rows = sqlx::query(
            "SELECT payload_hash, device_id, relative_root, file_count, total_bytes, \
             last_built_at FROM payloads WHERE payload_hash = ?1",
        )
        .bind(payload_hash)
        .fetch_all(self.pool())
        .await
        .map_err(query_ctx("find_payloads_by_hash"))?;

        rows.iter().map(payload_from_row).collect()
    }

    /// Look up the payload rooted at a specific (device, relative_root).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_payload(
        &self,
        device_id: DeviceId,
        relative_root: &str,
    ) -> StoreResult<Option<Payload>> {
        let row = sqlx::query(
            "SELECT payload_hash, device_id, relative_root, file_count, total_bytes, \
             last_built_at FROM payloads WHERE device_id = ?1 AND relative_root = ?2",
        )
        .bind(device_id.0)
        .bind(relative_root)
        .fetch_optional(self.pool())
        .await
        .map_err(query_ctx("get_payload"))?;

        row.as_ref().map(payload_from_row).transpose()
    }

    /// Upsert a torrent instance observed from the client's torrent list.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn upsert_torrent_instance(&self, instance: &TorrentInstance) -> StoreResult<()> {
        let tags = instance.tags.iter().cloned().collect::<Vec<_>>().join(",");
        sqlx::query(
            "INSERT INTO torrent_instances \
             (infohash, payload_hash, device_id, save_path, content_root, category, tags, \
              last_seen) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
             ON CONFLICT(infohash) DO UPDATE SET \
                payload_hash = excluded.payload_hash, \
                device_id = excluded.device_id, \
                save_path = excluded.save_path, \
                content_root = excluded.content_root, \
                category = excluded.category, \
                tags = excluded.tags, \
                last_seen = excluded.last_seen",
        )
        .bind(&instance.infohash)
        .bind(&instance.payload_hash)
        .bind(instance.device_id.0)
        .bind(&instance.save_path)
        .bind(&instance.content_root)
        .bind(&instance.category)
        .bind(tags)
        .bind(instance.last_seen.to_rfc3339())
        .execute(self.pool())
        .await
        .map_err(query_ctx("upsert_torrent_instance"))?;
        Ok(())
    }

    /// List every torrent instance referencing `payload_hash` — the
    /// "affected torrents" a rehome plan must relocate.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_torrents_by_payload_hash(
        &self,
        payload_hash: &str,
    ) -> StoreResult<Vec<TorrentInstance>> {
        let rows = sqlx::query(
            "SELECT infohash, payload_hash, device_id, save_path, content_root, category, tags, \
             last_seen FROM torrent_instances WHERE payload_hash = ?1",
        )
        .bind(payload_hash)
        .fetch_all(self.pool())
        .await
        .map_err(query_ctx("find_torrents_by_payload_hash"))?;

        rows.iter().map(torrent_instance_from_row).collect()
    }

    /// Look up a single torrent instance by infohash.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_torrent_instance(
        &self,
        infohash: &str,
    ) -> StoreResult<Option<TorrentInstance>> {
        let row = sqlx::query(
            "SELECT infohash, payload_hash, device_id, save_path, content_root, category, tags, \
             last_seen FROM torrent_instances WHERE infohash = ?1",
        )
        .bind(infohash)
        .fetch_optional(self.pool())
        .await
        .map_err(query_ctx("get_torrent_instance"))?;

        row.as_ref().map(torrent_instance_from_row).transpose()
    }

    /// List every torrent instance the catalog knows about, used by the
    /// rehome planner's tag-selector scope resolution.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_torrent_instances(&self) -> StoreResult<Vec<TorrentInstance>> {
        let rows = sqlx::query(
            "SELECT infohash, payload_hash, device_id, save_path, content_root, category, tags, \
             last_seen FROM torrent_instances",
        )
        .fetch_all(self.pool())
        .await
        .map_err(query_ctx("list_torrent_instances"))?;

        rows.iter().map(torrent_instance_from_row).collect()
    }
}

fn payload_from_row(row: &sqlx::sqlite::SqliteRow) -> StoreResult<Payload> {
    Ok(Payload {
        payload_hash: row
            .try_get("payload_hash")
            .map_err(query_ctx("decode_payload"))?,
        device_id: DeviceId(row.try_get("device_id").map_err(query_ctx("decode_payload"))?),
        relative_root: row
            .try_get("relative_root")
            .map_err(query_ctx("decode_payload"))?,
        file_count: row.try_get("file_count").map_err(query_ctx("decode_payload"))?,
        total_bytes: row.try_get("total_bytes").map_err(query_ctx("decode_payload"))?,
        last_built_at: parse_ts(row, "last_built_at", "payloads")?,
    })
}

fn torrent_instance_from_row(row: &sqlx::sqlite::SqliteRow) -> StoreResult<TorrentInstance> {
    let tags_raw: String = row.try_get("tags").map_err(query_ctx("decode_torrent_instance"))?;
    let tags: BTreeSet<String> = tags_raw
        .split(',')
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect();

    let device_id: i64 = row
        .try_get("device_id")
        .map_err(query_ctx("decode_torrent_instance"))?;

    Ok(TorrentInstance {
        infohash: row.try_get("infohash").map_err(query_ctx("decode_torrent_instance"))?,
        payload_hash: row
            .try_get("payload_hash")
            .map_err(query_ctx("decode_torrent_instance"))?,
        device_id: DeviceId(device_id),
        save_path: row.try_get("save_path").map_err(query_ctx("decode_torrent_instance"))?,
        content_root: row
            .try_get("content_root")
            .map_err(query_ctx("decode_torrent_instance"))?,
        category: row.try_get("category").map_err(query_ctx("decode_torrent_instance"))?,
        tags,
        last_seen: parse_ts(row, "last_seen", "torrent_instances")?,
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

    #[tokio::test]
    async fn upsert_then_find_payload_by_hash() {
        let store = CatalogStore::connect("sqlite::memory:").await.unwrap();
        let device_id = store
            .register_device(&FsUuid("u1".to_string()), "/dev/sda1", "/mnt/warm", "ext4", Utc::now())
            .await
            .unwrap();

        let payload = Payload {
            payload_hash: Some("deadbeef".to_string()),
            device_id,
            relative_root: "seeding/show".to_string(),
            file_count: 3,
            total_bytes: 300,
            last_built_at: Utc::now(),
        };
        store.upsert_payload(&payload).await.unwrap();

        let found = store.find_payloads_by_hash("deadbeef").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].relative_root, "seeding/show");
    }

    #[tokio::test]
    async fn torrent_instance_tags_round_trip() {
        let store = CatalogStore::connect("sqlite::memory:").await.unwrap();
        let device_id = store
            .register_device(&FsUuid("u2".to_string()), "/dev/sdb1", "/mnt/cold", "zfs", Utc::now())
            .await
            .unwrap();

        let mut tags = BTreeSet::new();
        tags.insert("archive".to_string());
        tags.insert("tv".to_string());

        let instance = TorrentInstance {
            infohash: "abc123".to_string(),
            payload_hash: Some("deadbeef".to_string()),
            device_id,
            save_path: "/mnt/cold/seeding".to_string(),
            content_root: "show".to_string(),
            category: Some("tv".to_string()),
            tags,
            last_seen: Utc::now(),
        };
        store.upsert_torrent_instance(&instance).await.unwrap();

        let found = store
            .find_torrents_by_payload_hash("deadbeef")
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].has_tag("archive"));

        let fetched = store.get_torrent_instance("abc123").await.unwrap().unwrap();
        assert_eq!(fetched.content_root, "show");

        let all = store.list_torrent_instances().await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn get_torrent_instance_returns_none_when_unknown() {
        let store = CatalogStore::connect("sqlite::memory:").await.unwrap();
        assert!(store.get_torrent_instance("missing").await.unwrap().is_none());
    }
}
