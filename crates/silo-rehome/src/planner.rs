//! Rehome plan computation: scope resolution, policy checks (missing hash,
//! external consumer, scan-coverage freshness), and REUSE/MOVE/BLOCK
//! decision (spec §4.7).

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use silo_config::SiloConfig;
use silo_events::{Event, EventBus};
use silo_fsops::to_abspath;
use silo_model::device::{Device, DeviceId};
use silo_model::file_entry::path_under_root;
use silo_model::payload::{Payload, TorrentInstance};
use silo_model::rehome::{RehomeDecision, RehomeDirection, RehomePlan};
use silo_store::CatalogStore;

use crate::error::RehomeResult;

/// How a set of torrent instances to rehome together is selected.
#[derive(Debug, Clone)]
pub enum RehomeScope {
    /// A single torrent, expanded to its full payload sibling set.
    Torrent(String),
    /// Every torrent instance sharing a payload hash.
    PayloadHash(String),
    /// Every torrent instance carrying a tag, grouped by payload hash.
    Tag(String),
}

struct ScopeGroup {
    payload_hash: Option<String>,
    affected: Vec<TorrentInstance>,
}

/// Compute, persist, and publish a rehome plan for every payload group
/// resolved from `scope`, moving from `source_device_id` to
/// `target_device_id`.
///
/// # Errors
///
/// Returns an error if the scope cannot be resolved or a catalog read/write
/// fails.
pub async fn plan(
    store: &CatalogStore,
    config: &SiloConfig,
    direction: RehomeDirection,
    scope: &RehomeScope,
    source_device_id: DeviceId,
    target_device_id: DeviceId,
    events: Option<&EventBus>,
) -> RehomeResult<Vec<RehomePlan>> {
    let groups = resolve_scope(store, scope).await?;
    let now = Utc::now();

    let mut plans = Vec::with_capacity(groups.len());
    for group in groups {
        let plan = plan_one(
            store,
            config,
            direction,
            &group,
            source_device_id,
            target_device_id,
            now,
        )
        .await?;

        store.record_rehome_plan(&plan).await?;
        if let Some(bus) = events {
            bus.publish(Event::RehomePlanned {
                decision: decision_label(plan.decision).to_string(),
                payload_hash: plan.payload_hash.clone(),
                source_device_id: plan.source_device_id.0,
            });
        }
        plans.push(plan);
    }

    Ok(plans)
}

async fn resolve_scope(store: &CatalogStore, scope: &RehomeScope) -> RehomeResult<Vec<ScopeGroup>> {
    match scope {
        RehomeScope::Torrent(infohash) => {
            let instance = store
                .get_torrent_instance(infohash)
                .await?
                .ok_or_else(|| crate::error::RehomeError::TorrentNotFound {
                    infohash: infohash.clone(),
                })?;
            Ok(vec![group_for(store, instance).await?])
        }
        RehomeScope::PayloadHash(payload_hash) => {
            let affected = store.find_torrents_by_payload_hash(payload_hash).await?;
            Ok(vec![ScopeGroup {
                payload_hash: Some(payload_hash.clone()),
                affected,
            }])
        }
        RehomeScope::Tag(tag) => {
            let all = store.list_torrent_instances().await?;
            let mut seen_hashes = HashSet::new();
            let mut groups = Vec::new();

            for instance in all.iter().filter(|instance| instance.has_tag(tag)) {
                match &instance.payload_hash {
                    Some(hash) if seen_hashes.insert(hash.clone()) => {
                        let affected = store.find_torrents_by_payload_hash(hash).await?;
                        groups.push(ScopeGroup {
                            payload_hash: Some(hash.clone()),
                            affected,
                        });
                    }
                    Some(_) => {}
                    None => groups.push(ScopeGroup {
                        payload_hash: None,
                        affected: vec![instance.clone()],
                    }),
                }
            }
            Ok(groups)
        }
    }
}

async fn group_for(store: &CatalogStore, instance: TorrentInstance) -> RehomeResult<ScopeGroup> {
    match &instance.payload_hash {
        Some(hash) => {
            let affected = store.find_torrents_by_payload_hash(hash).await?;
            Ok(ScopeGroup {
                payload_hash: Some(hash.clone()),
                affected,
            })
        }
        None => Ok(ScopeGroup {
            payload_hash: None,
            affected: vec![instance],
        }),
    }
}

#[allow(clippy::too_many_arguments)]
async fn plan_one(
    store: &CatalogStore,
    config: &SiloConfig,
    direction: RehomeDirection,
    group: &ScopeGroup,
    source_device_id: DeviceId,
    target_device_id: DeviceId,
    now: DateTime<Utc>,
) -> RehomeResult<RehomePlan> {
    let affected_torrents: Vec<String> =
        group.affected.iter().map(|instance| instance.infohash.clone()).collect();

    let Some(payload_hash) = group.payload_hash.clone() else {
        let source_device = store.get_device(source_device_id).await?;
        return Ok(block(
            direction,
            None,
            source_device_id,
            source_device.relpath_base().to_string(),
            vec!["payload hash missing; torrent has not been indexed".to_string()],
            now,
        ));
    };

    let candidates = store.find_payloads_by_hash(&payload_hash).await?;
    let Some(source_payload) = candidates
        .iter()
        .find(|payload| payload.device_id == source_device_id)
    else {
        let source_device = store.get_device(source_device_id).await?;
        return Ok(block(
            direction,
            Some(payload_hash),
            source_device_id,
            source_device.relpath_base().to_string(),
            vec!["payload not present on source device".to_string()],
            now,
        ));
    };

    let source_device = store.get_device(source_device_id).await?;
    let source_path = to_abspath(&source_payload.relative_root, source_device.relpath_base());

    let mut reasons = Vec::new();
    reasons.extend(external_consumers(store, config, &source_device, source_payload).await?);
    reasons.extend(check_scan_freshness(store, config, &source_device, now).await?);
    if !reasons.is_empty() {
        return Ok(RehomePlan::block(
            direction,
            Some(payload_hash),
            source_device_id,
            source_path.to_string_lossy().into_owned(),
            reasons,
            now,
        ));
    }

    let target_candidate = candidates
        .iter()
        .find(|payload| payload.device_id == target_device_id);

    if let Some(target_payload) = target_candidate {
        let target_device = store.get_device(target_device_id).await?;
        let target_path = to_abspath(&target_payload.relative_root, target_device.relpath_base());
        return Ok(RehomePlan {
            version: 1,
            direction,
            decision: RehomeDecision::Reuse,
            payload_hash: Some(payload_hash),
            affected_torrents,
            source_device_id,
            source_path: source_path.to_string_lossy().into_owned(),
            target_device_id: Some(target_device_id),
            target_path: Some(target_path.to_string_lossy().into_owned()),
            file_count: source_payload.file_count,
            total_bytes: source_payload.total_bytes,
            reasons: Vec::new(),
            no_blind_copy: matches!(direction, RehomeDirection::Promote),
            created_at: now,
        });
    }

    if matches!(direction, RehomeDirection::Promote) {
        return Ok(block(
            direction,
            Some(payload_hash),
            source_device_id,
            source_path.to_string_lossy().into_owned(),
            vec!["no matching payload on target device (no blind copy)".to_string()],
            now,
        ));
    }

    let target_path = config.pool_payload_root(&payload_hash);
    Ok(RehomePlan {
        version: 1,
        direction,
        decision: RehomeDecision::Move,
        payload_hash: Some(payload_hash),
        affected_torrents,
        source_device_id,
        source_path: source_path.to_string_lossy().into_owned(),
        target_device_id: Some(target_device_id),
        target_path: Some(target_path.to_string_lossy().into_owned()),
        file_count: source_payload.file_count,
        total_bytes: source_payload.total_bytes,
        reasons: Vec::new(),
        no_blind_copy: false,
        created_at: now,
    })
}

fn block(
    direction: RehomeDirection,
    payload_hash: Option<String>,
    source_device_id: DeviceId,
    source_path: String,
    reasons: Vec<String>,
    now: DateTime<Utc>,
) -> RehomePlan {
    RehomePlan::block(direction, payload_hash, source_device_id, source_path, reasons, now)
}

/// Find files on `device` sharing an inode with a payload member but lying
/// outside the configured seeding domain, i.e. an external hardlink
/// consumer that a relocation or deletion would silently corrupt.
async fn external_consumers(
    store: &CatalogStore,
    config: &SiloConfig,
    device: &Device,
    payload: &Payload,
) -> RehomeResult<Vec<String>> {
    let active = store.list_active_files(device.id).await?;
    let payload_inodes: HashSet<u64> = active
        .iter()
        .filter(|entry| path_under_root(&entry.relative_path, &payload.relative_root))
        .map(|entry| entry.inode)
        .collect();

    let mut reasons = Vec::new();
    for entry in &active {
        if !payload_inodes.contains(&entry.inode) {
            continue;
        }
        let abspath = to_abspath(&entry.relative_path, device.relpath_base());
        if !config.is_in_seeding_domain(&abspath) {
            reasons.push(format!(
                "external consumer outside the seeding domain: {}",
                abspath.display()
            ));
        }
    }
    Ok(reasons)
}

async fn check_scan_freshness(
    store: &CatalogStore,
    config: &SiloConfig,
    device: &Device,
    now: DateTime<Utc>,
) -> RehomeResult<Vec<String>> {
    let roots = store.list_scan_roots(device.id).await?;
    let freshness = Duration::from_std(config.freshness).unwrap_or(Duration::MAX);
    let mut reasons = Vec::new();

    for seeding_root in &config.seeding_domain_roots {
        let Ok(relative) = seeding_root.strip_prefix(device.relpath_base()) else {
            continue;
        };
        let relative_root = relative.to_string_lossy().replace(std::path::MAIN_SEPARATOR, "/");

        match roots.iter().find(|root| root.relative_root == relative_root) {
            None => reasons.push(format!(
                "seeding root '{}' has never been scanned",
                seeding_root.display()
            )),
            Some(root) if now - root.last_scanned_at > freshness => reasons.push(format!(
                "seeding root '{}' scan is stale (last scanned {})",
                seeding_root.display(),
                root.last_scanned_at
            )),
            Some(_) => {}
        }
    }

    Ok(reasons)
}

fn decision_label(decision: RehomeDecision) -> &'static str {
    match decision {
        RehomeDecision::Block => "block",
        RehomeDecision::Reuse => "reuse",
        RehomeDecision::Move => "move",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use silo_model::device::FsUuid;
    use silo_model::file_entry::{FileEntry, FileStatus};
    use silo_test_support::catalog::sample_config;
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    fn test_config(seeding_roots: Vec<PathBuf>) -> SiloConfig {
        sample_config(seeding_roots)
    }

    async fn device_with_scan_root(
        store: &CatalogStore,
        mount_point: &str,
        relative_root: &str,
        scanned_at: DateTime<Utc>,
    ) -> DeviceId {
        let id = store
            .register_device(
                &FsUuid(format!("uuid-{mount_point}")),
                "/dev/sda1",
                mount_point,
                "ext4",
                Utc::now(),
            )
            .await
            .unwrap();
        store.ensure_scan_root(id, relative_root, scanned_at).await.unwrap();
        id
    }

    async fn seed_payload(
        store: &CatalogStore,
        device_id: DeviceId,
        relative_root: &str,
        payload_hash: &str,
        file_count: i64,
        total_bytes: i64,
    ) {
        store
            .upsert_payload(&Payload {
                payload_hash: Some(payload_hash.to_string()),
                device_id,
                relative_root: relative_root.to_string(),
                file_count,
                total_bytes,
                last_built_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    async fn seed_torrent(store: &CatalogStore, device_id: DeviceId, infohash: &str, payload_hash: &str) {
        store
            .upsert_torrent_instance(&TorrentInstance {
                infohash: infohash.to_string(),
                payload_hash: Some(payload_hash.to_string()),
                device_id,
                save_path: "/warm/seeding".to_string(),
                content_root: "show".to_string(),
                category: None,
                tags: BTreeSet::new(),
                last_seen: Utc::now(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn missing_payload_hash_blocks() {
        let store = CatalogStore::connect("sqlite::memory:").await.unwrap();
        let source_id = device_with_scan_root(&store, "/warm", "seeding", Utc::now()).await;
        let target_id = device_with_scan_root(&store, "/cold", "seeding", Utc::now()).await;
        store
            .upsert_torrent_instance(&TorrentInstance {
                infohash: "nohash".to_string(),
                payload_hash: None,
                device_id: source_id,
                save_path: "/warm/seeding".to_string(),
                content_root: "show".to_string(),
                category: None,
                tags: BTreeSet::new(),
                last_seen: Utc::now(),
            })
            .await
            .unwrap();

        let config = test_config(vec![PathBuf::from("/warm/seeding")]);
        let plans = plan(
            &store,
            &config,
            RehomeDirection::Demote,
            &RehomeScope::Torrent("nohash".to_string()),
            source_id,
            target_id,
            None,
        )
        .await
        .unwrap();

        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].decision, RehomeDecision::Block);
    }

    #[tokio::test]
    async fn stale_scan_blocks() {
        let store = CatalogStore::connect("sqlite::memory:").await.unwrap();
        let stale = Utc::now() - Duration::days(10);
        let source_id = device_with_scan_root(&store, "/warm", "seeding", stale).await;
        let target_id = device_with_scan_root(&store, "/cold", "seeding", Utc::now()).await;
        seed_payload(&store, source_id, "seeding/show", "hash1", 3, 300).await;
        seed_torrent(&store, source_id, "t1", "hash1").await;

        let config = test_config(vec![PathBuf::from("/warm/seeding")]);
        let plans = plan(
            &store,
            &config,
            RehomeDirection::Demote,
            &RehomeScope::Torrent("t1".to_string()),
            source_id,
            target_id,
            None,
        )
        .await
        .unwrap();

        assert_eq!(plans[0].decision, RehomeDecision::Block);
        assert!(plans[0].reasons.iter().any(|r| r.contains("stale")));
    }

    #[tokio::test]
    async fn reuse_when_target_already_has_payload() {
        let store = CatalogStore::connect("sqlite::memory:").await.unwrap();
        let now = Utc::now();
        let source_id = device_with_scan_root(&store, "/warm", "seeding", now).await;
        let target_id = device_with_scan_root(&store, "/cold", "seeding", now).await;
        seed_payload(&store, source_id, "seeding/show", "hash1", 3, 300).await;
        seed_payload(&store, target_id, "seeding/show", "hash1", 3, 300).await;
        seed_torrent(&store, source_id, "t1", "hash1").await;

        let config = test_config(vec![PathBuf::from("/warm/seeding")]);
        let plans = plan(
            &store,
            &config,
            RehomeDirection::Demote,
            &RehomeScope::Torrent("t1".to_string()),
            source_id,
            target_id,
            None,
        )
        .await
        .unwrap();

        assert_eq!(plans[0].decision, RehomeDecision::Reuse);
        assert_eq!(plans[0].target_path.as_deref(), Some("/cold/seeding/show"));
    }

    #[tokio::test]
    async fn move_on_demote_when_no_target_payload() {
        let store = CatalogStore::connect("sqlite::memory:").await.unwrap();
        let now = Utc::now();
        let source_id = device_with_scan_root(&store, "/warm", "seeding", now).await;
        let target_id = device_with_scan_root(&store, "/cold", "seeding", now).await;
        seed_payload(&store, source_id, "seeding/show", "hash1", 3, 300).await;
        seed_torrent(&store, source_id, "t1", "hash1").await;

        let config = test_config(vec![PathBuf::from("/warm/seeding")]);
        let plans = plan(
            &store,
            &config,
            RehomeDirection::Demote,
            &RehomeScope::Torrent("t1".to_string()),
            source_id,
            target_id,
            None,
        )
        .await
        .unwrap();

        assert_eq!(plans[0].decision, RehomeDecision::Move);
        assert_eq!(plans[0].target_path.as_deref(), Some("/cold/pool/hash1"));
    }

    #[tokio::test]
    async fn promote_without_target_payload_blocks_no_blind_copy() {
        let store = CatalogStore::connect("sqlite::memory:").await.unwrap();
        let now = Utc::now();
        let source_id = device_with_scan_root(&store, "/cold", "seeding", now).await;
        let target_id = device_with_scan_root(&store, "/warm", "seeding", now).await;
        seed_payload(&store, source_id, "seeding/show", "hash1", 3, 300).await;
        seed_torrent(&store, source_id, "t1", "hash1").await;

        let config = test_config(vec![PathBuf::from("/cold/seeding")]);
        let plans = plan(
            &store,
            &config,
            RehomeDirection::Promote,
            &RehomeScope::Torrent("t1".to_string()),
            source_id,
            target_id,
            None,
        )
        .await
        .unwrap();

        assert_eq!(plans[0].decision, RehomeDecision::Block);
        assert!(plans[0].no_blind_copy);
        assert!(plans[0]
            .reasons
            .iter()
            .any(|r| r.contains("no blind copy")));
    }

    #[tokio::test]
    async fn external_consumer_outside_seeding_domain_blocks() {
        let store = CatalogStore::connect("sqlite::memory:").await.unwrap();
        let now = Utc::now();
        let source_id = device_with_scan_root(&store, "/warm", "seeding", now).await;
        let target_id = device_with_scan_root(&store, "/cold", "seeding", now).await;
        seed_payload(&store, source_id, "seeding/show", "hash1", 1, 10).await;
        seed_torrent(&store, source_id, "t1", "hash1").await;

        let root = store.ensure_scan_root(source_id, "seeding/show", now).await.unwrap();
        store
            .upsert_file_entry(&FileEntry {
                device_id: source_id,
                relative_path: "seeding/show/e1.mkv".to_string(),
                inode: 7,
                size: 10,
                mtime: now,
                fast_hash: Some("f".to_string()),
                full_digest: Some("d".to_string()),
                status: FileStatus::Active,
                first_seen: now,
                last_seen: now,
                scan_root_id: root.id,
            })
            .await
            .unwrap();
        let other_root = store.ensure_scan_root(source_id, "private", now).await.unwrap();
        store
            .upsert_file_entry(&FileEntry {
                device_id: source_id,
                relative_path: "private/stash/e1.mkv".to_string(),
                inode: 7,
                size: 10,
                mtime: now,
                fast_hash: Some("f".to_string()),
                full_digest: Some("d".to_string()),
                status: FileStatus::Active,
                first_seen: now,
                last_seen: now,
                scan_root_id: other_root.id,
            })
            .await
            .unwrap();

        let config = test_config(vec![PathBuf::from("/warm/seeding")]);
        let plans = plan(
            &store,
            &config,
            RehomeDirection::Demote,
            &RehomeScope::Torrent("t1".to_string()),
            source_id,
            target_id,
            None,
        )
        .await
        .unwrap();

        assert_eq!(plans[0].decision, RehomeDecision::Block);
        assert!(plans[0]
            .reasons
            .iter()
            .any(|r| r.contains("external consumer")));
    }
}
