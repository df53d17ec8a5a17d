//! Resolve each torrent reported by the client to a payload root on a
//! catalogued device and build its manifest fingerprint (spec §4.5).

use std::path::Path;

use chrono::Utc;
use silo_client::{TorrentClient, TorrentSummary};
use silo_events::{Event, EventBus};
use silo_model::device::Device;
use silo_model::payload::{build_manifest, Payload, TorrentInstance};
use silo_model::path_under_root;
use silo_store::CatalogStore;

use crate::error::{PayloadError, PayloadResult};

/// Outcome of indexing one torrent's payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexedPayload {
    /// Every member file had a full digest; the manifest was built and a
    /// payload identity assigned.
    Built {
        /// Resolved payload fingerprint.
        payload_hash: String,
    },
    /// At least one active member file under the content root still lacks a
    /// full digest; `payload_hash` was left `NULL`.
    NeedsFullHash,
}

/// Aggregate counters for a full `sync()` sweep across every torrent the
/// client reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Torrents the client reported and this sweep attempted to index.
    pub torrents_processed: usize,
    /// Torrents whose manifest was fully built this sweep.
    pub payloads_built: usize,
    /// Torrents still missing one or more full digests.
    pub needs_full_hash: usize,
}

/// Index every torrent the client currently reports, upserting a `Payload`
/// and `TorrentInstance` row for each.
///
/// # Errors
///
/// Returns an error if the client request fails, or the mount table cannot
/// be read.
pub async fn sync(
    store: &CatalogStore,
    client: &TorrentClient,
    events: Option<&EventBus>,
) -> PayloadResult<SyncOutcome> {
    let torrents = client.list_torrents().await?;
    let mounts = silo_fsops::read_mount_table()?;

    let mut outcome = SyncOutcome::default();
    for torrent in &torrents {
        match index_one(store, &mounts, torrent, events).await {
            Ok(IndexedPayload::Built { .. }) => outcome.payloads_built += 1,
            Ok(IndexedPayload::NeedsFullHash) => outcome.needs_full_hash += 1,
            Err(error) => {
                tracing::warn!(infohash = torrent.hash, %error, "skipping torrent during payload sync");
                continue;
            }
        }
        outcome.torrents_processed += 1;
    }
    Ok(outcome)
}

/// Index a single torrent by infohash, re-querying the client for its
/// current listing. Supplements the full `sync()` sweep for callers that
/// only need to refresh one torrent (e.g. right after a rehome apply).
///
/// # Errors
///
/// Returns an error if the client request fails, the torrent is unknown to
/// the client, or indexing it fails.
pub async fn refresh_one(
    store: &CatalogStore,
    client: &TorrentClient,
    events: Option<&EventBus>,
    infohash: &str,
) -> PayloadResult<IndexedPayload> {
    let torrents = client.list_torrents().await?;
    let torrent = torrents
        .iter()
        .find(|t| t.hash == infohash)
        .ok_or_else(|| PayloadError::TorrentNotFound {
            infohash: infohash.to_string(),
        })?;
    let mounts = silo_fsops::read_mount_table()?;
    index_one(store, &mounts, torrent, events).await
}

/// Look up every torrent instance sharing `payload_hash` — the sibling set a
/// rehome plan must relocate together.
///
/// # Errors
///
/// Returns an error if the catalog query fails.
pub async fn siblings(
    store: &CatalogStore,
    payload_hash: &str,
) -> PayloadResult<Vec<TorrentInstance>> {
    Ok(store.find_torrents_by_payload_hash(payload_hash).await?)
}

async fn index_one(
    store: &CatalogStore,
    mounts: &[silo_fsops::MountEntry],
    torrent: &TorrentSummary,
    events: Option<&EventBus>,
) -> PayloadResult<IndexedPayload> {
    let content_root = torrent.content_root();
    let canonical_root = silo_fsops::canonicalize(Path::new(&content_root), mounts)?;
    let probe = silo_fsops::probe(&canonical_root, mounts)?;

    let device = device_for(store, &probe.fs_uuid, &content_root).await?;
    let relpath_base = device.relpath_base().to_string();
    let relative_root = silo_fsops::to_relpath(&canonical_root, &relpath_base)?;

    let active = store.list_active_files(device.id).await?;
    let members: Vec<_> = active
        .into_iter()
        .filter(|entry| path_under_root(&entry.relative_path, &relative_root))
        .collect();

    let file_count = i64::try_from(members.len()).unwrap_or(i64::MAX);
    let total_bytes = members
        .iter()
        .map(|entry| i64::try_from(entry.size).unwrap_or(i64::MAX))
        .sum();

    let needs_full_hash = members.iter().any(|entry| !entry.has_full_digest());
    let payload_hash = if needs_full_hash {
        None
    } else {
        let relative_within_root: Vec<_> = members
            .iter()
            .map(|entry| {
                let rel = strip_root_prefix(&entry.relative_path, &relative_root);
                (rel, entry.size, entry.full_digest.clone())
            })
            .collect();
        let manifest = build_manifest(relative_within_root);
        Some(silo_hash::hash_bytes(manifest.as_bytes()))
    };

    let now = Utc::now();
    let payload = Payload {
        payload_hash: payload_hash.clone(),
        device_id: device.id,
        relative_root: relative_root.clone(),
        file_count,
        total_bytes,
        last_built_at: now,
    };
    store.upsert_payload(&payload).await?;

    let instance = TorrentInstance {
        infohash: torrent.hash.clone(),
        payload_hash: payload_hash.clone(),
        device_id: device.id,
        save_path: torrent.save_path.clone(),
        content_root,
        category: torrent.category.clone(),
        tags: torrent.tag_list().into_iter().collect(),
        last_seen: now,
    };
    store.upsert_torrent_instance(&instance).await?;

    if let Some(bus) = events {
        bus.publish(Event::PayloadIndexed {
            device_id: device.id.0,
            relative_root,
            payload_hash: payload_hash.clone(),
        });
    }

    Ok(match payload_hash {
        Some(payload_hash) => IndexedPayload::Built { payload_hash },
        None => IndexedPayload::NeedsFullHash,
    })
}

async fn device_for(
    store: &CatalogStore,
    fs_uuid: &silo_model::device::FsUuid,
    content_root: &str,
) -> PayloadResult<Device> {
    store
        .find_device_by_fs_uuid(fs_uuid)
        .await?
        .ok_or_else(|| PayloadError::DeviceNotRegistered {
            path: content_root.to_string(),
        })
}

/// Strip `relative_root` (plus its separator) from a catalog-relative path,
/// producing the path relative-within-root the manifest expects.
fn strip_root_prefix(relative_path: &str, relative_root: &str) -> String {
    if relative_root.is_empty() {
        return relative_path.to_string();
    }
    relative_path
        .strip_prefix(relative_root)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(relative_path)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use silo_model::device::FsUuid;
    use silo_model::file_entry::{FileEntry, FileStatus};

    async fn store_with_device(mount_point: &str) -> (CatalogStore, silo_model::device::DeviceId) {
        let store = CatalogStore::connect("sqlite::memory:").await.unwrap();
        let id = store
            .register_device(
                &FsUuid("warm-uuid".to_string()),
                "/dev/sda1",
                mount_point,
                "ext4",
                Utc::now(),
            )
            .await
            .unwrap();
        (store, id)
    }

    #[tokio::test]
    async fn index_one_builds_manifest_when_every_member_has_a_digest() {
        let dir = tempfile::tempdir().unwrap();
        let mount_point = dir.path().to_str().unwrap().to_string();
        let (store, device_id) = store_with_device(&mount_point).await;

        let now = Utc::now();
        let root = store.ensure_scan_root(device_id, "seeding/show", now).await.unwrap();
        for (path, digest) in [("seeding/show/a.mkv", "d1"), ("seeding/show/b.mkv", "d2")] {
            store
                .upsert_file_entry(&FileEntry {
                    device_id,
                    relative_path: path.to_string(),
                    inode: 1,
                    size: 10,
                    mtime: now,
                    fast_hash: Some("f".to_string()),
                    full_digest: Some(digest.to_string()),
                    status: FileStatus::Active,
                    first_seen: now,
                    last_seen: now,
                    scan_root_id: root.id,
                })
                .await
                .unwrap();
        }

        let content_root = format!("{mount_point}/seeding/show");
        let mounts = [];
        let torrent = TorrentSummary {
            hash: "abc".to_string(),
            name: "show".to_string(),
            save_path: mount_point.clone(),
            content_path: Some(content_root),
            category: None,
            tags: String::new(),
        };

        let outcome = index_one(&store, &mounts, &torrent, None).await.unwrap();
        assert!(matches!(outcome, IndexedPayload::Built { .. }));

        let payload = store
            .get_payload(device_id, "seeding/show")
            .await
            .unwrap()
            .unwrap();
        assert!(payload.has_identity());
        assert_eq!(payload.file_count, 2);
    }

    #[tokio::test]
    async fn index_one_flags_needs_full_hash_when_a_member_lacks_a_digest() {
        let dir = tempfile::tempdir().unwrap();
        let mount_point = dir.path().to_str().unwrap().to_string();
        let (store, device_id) = store_with_device(&mount_point).await;

        let now = Utc::now();
        let root = store.ensure_scan_root(device_id, "seeding/show", now).await.unwrap();
        store
            .upsert_file_entry(&FileEntry {
                device_id,
                relative_path: "seeding/show/a.mkv".to_string(),
                inode: 1,
                size: 10,
                mtime: now,
                fast_hash: Some("f".to_string()),
                full_digest: None,
                status: FileStatus::Active,
                first_seen: now,
                last_seen: now,
                scan_root_id: root.id,
            })
            .await
            .unwrap();

        let content_root = format!("{mount_point}/seeding/show");
        let mounts = [];
        let torrent = TorrentSummary {
            hash: "abc".to_string(),
            name: "show".to_string(),
            save_path: mount_point,
            content_path: Some(content_root),
            category: None,
            tags: String::new(),
        };

        let outcome = index_one(&store, &mounts, &torrent, None).await.unwrap();
        assert_eq!(outcome, IndexedPayload::NeedsFullHash);

        let payload = store
            .get_payload(device_id, "seeding/show")
            .await
            .unwrap()
            .unwrap();
        assert!(!payload.has_identity());
    }

    #[test]
    fn strip_root_prefix_removes_root_and_separator() {
        assert_eq!(strip_root_prefix("seeding/show/a.mkv", "seeding/show"), "a.mkv");
        assert_eq!(strip_root_prefix("a.mkv", ""), "a.mkv");
    }
}
