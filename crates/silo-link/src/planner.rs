//! Same-device hardlink dedup planning (spec §4.6, planner half).

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use silo_events::{Event, EventBus};
use silo_fsops::to_abspath;
use silo_model::device::DeviceId;
use silo_model::file_entry::FileEntry;
use silo_model::link::LinkAction;
use silo_store::CatalogStore;

use crate::error::LinkResult;

/// Summary of a freshly planned hardlink dedup run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlanSummary {
    /// Number of hardlink actions persisted.
    pub action_count: i64,
    /// Sum of `bytes_to_save` across every action.
    pub total_bytes_to_save: i64,
}

/// Group `device_id`'s active, fully-digested files by `(digest, size)`, and
/// persist one pending hardlink action for every non-canonical path in each
/// group whose distinct inode count exceeds one. Whether a given duplicate
/// already shares the canonical inode is decided by the executor (step 2),
/// not the planner.
///
/// # Errors
///
/// Returns an error if the device lookup or catalog writes fail.
pub async fn plan(
    store: &CatalogStore,
    device_id: DeviceId,
    plan_name: &str,
    events: Option<&EventBus>,
) -> LinkResult<PlanSummary> {
    let device = store.get_device(device_id).await?;
    let relpath_base = device.relpath_base().to_string();

    let active = store.list_active_files(device_id).await?;
    let mut groups: HashMap<(String, u64), Vec<&FileEntry>> = HashMap::new();
    for entry in &active {
        let Some(digest) = entry.full_digest.clone() else {
            continue;
        };
        groups.entry((digest, entry.size)).or_default().push(entry);
    }

    let now = Utc::now();
    store.create_link_plan(plan_name, device_id, now).await?;

    let mut summary = PlanSummary::default();

    for ((digest, size), mut members) in groups {
        let distinct_inodes: HashSet<u64> = members.iter().map(|entry| entry.inode).collect();
        if distinct_inodes.len() < 2 {
            continue;
        }

        members.sort_by(|a, b| {
            a.inode
                .cmp(&b.inode)
                .then_with(|| a.relative_path.len().cmp(&b.relative_path.len()))
                .then_with(|| a.relative_path.cmp(&b.relative_path))
        });
        let canonical = members[0];
        let canonical_abs = to_abspath(&canonical.relative_path, &relpath_base);

        for duplicate in &members[1..] {
            let duplicate_abs = to_abspath(&duplicate.relative_path, &relpath_base);
            let action = LinkAction::pending_hardlink(
                plan_name,
                canonical_abs.to_string_lossy(),
                duplicate_abs.to_string_lossy(),
                canonical.inode,
                duplicate.inode,
                size,
                digest.clone(),
            );
            summary.total_bytes_to_save +=
                i64::try_from(action.expected_bytes_saved).unwrap_or(i64::MAX);
            store.add_link_action(&action, now).await?;
            summary.action_count += 1;
        }
    }

    if let Some(bus) = events {
        bus.publish(Event::LinkPlanCreated {
            plan_name: plan_name.to_string(),
            action_count: summary.action_count,
            total_bytes_to_save: summary.total_bytes_to_save,
        });
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use silo_model::device::FsUuid;
    use silo_model::file_entry::FileStatus;

    async fn store_with_device(mount_point: &str) -> (CatalogStore, DeviceId) {
        let store = CatalogStore::connect("sqlite::memory:").await.unwrap();
        let id = store
            .register_device(&FsUuid("u1".to_string()), "/dev/sda1", mount_point, "ext4", Utc::now())
            .await
            .unwrap();
        (store, id)
    }

    async fn seed_entry(
        store: &CatalogStore,
        device_id: DeviceId,
        root_id: i64,
        path: &str,
        inode: u64,
        digest: &str,
    ) {
        let now = Utc::now();
        store
            .upsert_file_entry(&FileEntry {
                device_id,
                relative_path: path.to_string(),
                inode,
                size: 10,
                mtime: now,
                fast_hash: Some("f".to_string()),
                full_digest: Some(digest.to_string()),
                status: FileStatus::Active,
                first_seen: now,
                last_seen: now,
                scan_root_id: root_id,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn plan_emits_one_action_per_duplicate_in_a_group() {
        let (store, device_id) = store_with_device("/mnt/warm").await;
        let root = store.ensure_scan_root(device_id, "", Utc::now()).await.unwrap();
        seed_entry(&store, device_id, root.id, "a/1.bin", 1, "dg").await;
        seed_entry(&store, device_id, root.id, "a/2.bin", 2, "dg").await;
        seed_entry(&store, device_id, root.id, "a/3.bin", 3, "dg").await;

        let summary = plan(&store, device_id, "plan-a", None).await.unwrap();
        assert_eq!(summary.action_count, 2);
        assert_eq!(summary.total_bytes_to_save, 20);

        let actions = store.list_link_actions("plan-a").await.unwrap();
        assert_eq!(actions.len(), 2);
        assert!(actions.iter().all(|a| a.canonical_path.ends_with("1.bin")));
    }

    #[tokio::test]
    async fn plan_skips_groups_with_a_single_inode() {
        let (store, device_id) = store_with_device("/mnt/warm").await;
        let root = store.ensure_scan_root(device_id, "", Utc::now()).await.unwrap();
        seed_entry(&store, device_id, root.id, "a/1.bin", 1, "dg").await;
        seed_entry(&store, device_id, root.id, "a/1-hardlinked.bin", 1, "dg").await;

        let summary = plan(&store, device_id, "plan-b", None).await.unwrap();
        assert_eq!(summary.action_count, 0);
    }
}
