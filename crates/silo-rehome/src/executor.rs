//! Rehome plan execution: pause/relocate/resume with rollback on failure
//! (spec §4.8).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use silo_client::{TorrentClient, TorrentFile};
use silo_events::{Event, EventBus};
use silo_fsops::{copy_tree, ensure_dir_all, hard_link, measure_tree, remove_dir_all, rename};
use silo_model::file_entry::{path_under_root, FileEntry};
use silo_model::rehome::{RehomeDecision, RehomePlan};
use silo_store::{CatalogStore, RehomeRunStatus};

use crate::error::{RehomeError, RehomeResult};

const VIEW_DIR_NAME: &str = ".silo-views";

/// Optional post-apply checks requested by the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Re-hash a sample of target-side files against catalog digests before
    /// declaring the run complete.
    pub spot_check: bool,
    /// Remove source-side per-torrent view directories after a successful
    /// REUSE relocation.
    pub cleanup_source_views: bool,
}

/// Outcome of applying a rehome plan. A failed apply is reported as
/// `RolledBack` rather than propagated as an error: the rollback itself
/// already restored every torrent to a working state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The plan applied and every post-condition check passed.
    Completed,
    /// The apply failed partway through and was rolled back.
    RolledBack,
}

struct RelocatedTorrent {
    infohash: String,
    original_location: String,
}

/// Apply a previously planned, non-BLOCK rehome run: pause every affected
/// torrent, relocate the payload if needed, point each torrent at its new
/// home, and resume. Any failure after the pause step triggers a full
/// rollback (spec §4.8 "Rollback").
///
/// # Errors
///
/// Returns an error if the run cannot be loaded, is not applicable, or a
/// catalog read/write fails. Mid-apply filesystem and client failures do not
/// propagate; they are converted into a rollback and reported via
/// `ApplyOutcome::RolledBack`.
pub async fn apply(
    store: &CatalogStore,
    client: &TorrentClient,
    run_id: i64,
    options: ApplyOptions,
    events: Option<&EventBus>,
    cancel: Option<&AtomicBool>,
) -> RehomeResult<ApplyOutcome> {
    let plan = store
        .get_rehome_plan(run_id)
        .await?
        .ok_or(RehomeError::RunNotFound { run_id })?;
    if !plan.is_applicable() {
        return Err(RehomeError::NotApplicable { run_id });
    }

    store
        .update_rehome_run_status(run_id, RehomeRunStatus::Applying, Utc::now())
        .await?;
    if let Some(bus) = events {
        bus.publish(Event::RehomeApplying { run_id });
    }

    let mut relocated = Vec::new();
    let mut payload_moved = false;
    let outcome = run(
        store,
        client,
        &plan,
        &options,
        cancel,
        &mut relocated,
        &mut payload_moved,
    )
    .await;

    match outcome {
        Ok(()) => {
            store
                .update_rehome_run_status(run_id, RehomeRunStatus::Completed, Utc::now())
                .await?;
            if let Some(bus) = events {
                bus.publish(Event::RehomeCompleted { run_id });
            }
            Ok(ApplyOutcome::Completed)
        }
        Err(error) => {
            rollback(client, &plan, &relocated, payload_moved).await;
            store
                .update_rehome_run_status(run_id, RehomeRunStatus::RolledBack, Utc::now())
                .await?;
            if let Some(bus) = events {
                bus.publish(Event::RehomeRolledBack {
                    run_id,
                    message: error.to_string(),
                });
            }
            Ok(ApplyOutcome::RolledBack)
        }
    }
}

async fn run(
    store: &CatalogStore,
    client: &TorrentClient,
    plan: &RehomePlan,
    options: &ApplyOptions,
    cancel: Option<&AtomicBool>,
    relocated: &mut Vec<RelocatedTorrent>,
    payload_moved: &mut bool,
) -> RehomeResult<()> {
    let source_path = Path::new(&plan.source_path);
    let target_path_str = plan.target_path.as_deref().ok_or_else(|| RehomeError::Verification {
        reason: "applicable plan is missing a target path".to_string(),
    })?;
    let target_path = Path::new(target_path_str);

    match plan.decision {
        RehomeDecision::Reuse => verify_tree_matches(target_path, plan)?,
        RehomeDecision::Move => verify_tree_matches(source_path, plan)?,
        RehomeDecision::Block => unreachable!("apply() rejects BLOCK plans before invoking run()"),
    }

    for infohash in &plan.affected_torrents {
        check_cancel(cancel)?;
        client.pause(infohash).await?;
    }

    let same_device = plan.source_device_id == plan.target_device_id.unwrap_or(plan.source_device_id);
    if plan.decision == RehomeDecision::Move {
        check_cancel(cancel)?;
        move_payload(same_device, source_path, target_path)?;
        *payload_moved = true;
        verify_tree_matches(target_path, plan)?;
    }

    let single_torrent = plan.affected_torrents.len() == 1;
    for infohash in &plan.affected_torrents {
        check_cancel(cancel)?;
        relocate_one(client, target_path, infohash, single_torrent, relocated).await?;
    }

    if options.spot_check {
        spot_check(store, plan, target_path).await?;
    }
    if options.cleanup_source_views && plan.decision == RehomeDecision::Reuse {
        cleanup_source_views(source_path)?;
    }

    Ok(())
}

fn check_cancel(cancel: Option<&AtomicBool>) -> RehomeResult<()> {
    if cancel.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
        return Err(RehomeError::Cancelled);
    }
    Ok(())
}

fn verify_tree_matches(path: &Path, plan: &RehomePlan) -> RehomeResult<()> {
    let (file_count, total_bytes) = measure_tree(path)?;
    let file_count = i64::try_from(file_count).unwrap_or(i64::MAX);
    let total_bytes = i64::try_from(total_bytes).unwrap_or(i64::MAX);
    if file_count != plan.file_count || total_bytes != plan.total_bytes {
        return Err(RehomeError::Verification {
            reason: format!(
                "payload at '{}' no longer matches the plan's recorded file count or byte total",
                path.display()
            ),
        });
    }
    Ok(())
}

fn move_payload(same_device: bool, from: &Path, to: &Path) -> RehomeResult<()> {
    if same_device {
        if let Some(parent) = to.parent() {
            ensure_dir_all(parent)?;
        }
        rename(from, to)?;
    } else {
        if let Some(parent) = to.parent() {
            ensure_dir_all(parent)?;
        }
        copy_tree(from, to)?;
        remove_dir_all(from)?;
    }
    Ok(())
}

/// Relocate a single torrent to its payload's new home, building a
/// per-torrent hardlink view when more than one torrent shares the payload
/// (so each torrent keeps its own content root instead of colliding on the
/// canonical one), then point the client at it and resume.
async fn relocate_one(
    client: &TorrentClient,
    target_payload_root: &Path,
    infohash: &str,
    single_torrent: bool,
    relocated: &mut Vec<RelocatedTorrent>,
) -> RehomeResult<()> {
    let summaries = client.list_torrents().await?;
    let summary = summaries
        .into_iter()
        .find(|summary| summary.hash == infohash)
        .ok_or_else(|| RehomeError::TorrentNotFound {
            infohash: infohash.to_string(),
        })?;
    let original_location = summary.save_path.clone();

    let new_location = if single_torrent {
        target_payload_root.to_path_buf()
    } else {
        let files = client.torrent_files(infohash).await?;
        let view_root = target_payload_root
            .join(VIEW_DIR_NAME)
            .join(infohash);
        build_view(target_payload_root, &view_root, &files)?;
        view_root
    };

    client
        .set_location(infohash, &new_location.to_string_lossy())
        .await?;
    client.resume(infohash).await?;

    let reported = client
        .list_torrents()
        .await?
        .into_iter()
        .find(|summary| summary.hash == infohash)
        .ok_or_else(|| RehomeError::TorrentNotFound {
            infohash: infohash.to_string(),
        })?;
    if reported.save_path != new_location.to_string_lossy() {
        return Err(RehomeError::Verification {
            reason: format!("torrent '{infohash}' did not report the expected new location"),
        });
    }

    relocated.push(RelocatedTorrent {
        infohash: infohash.to_string(),
        original_location,
    });
    Ok(())
}

/// Hardlink every file a torrent reports into its own view root under the
/// canonical payload, so several torrents can share one payload on disk
/// while each still has a distinct, client-visible content root.
fn build_view(canonical_root: &Path, view_root: &Path, files: &[TorrentFile]) -> RehomeResult<()> {
    for file in files {
        let source = canonical_root.join(&file.name);
        let destination = view_root.join(&file.name);
        if destination.exists() {
            continue;
        }
        if let Some(parent) = destination.parent() {
            ensure_dir_all(parent)?;
        }
        hard_link(&source, &destination)?;
    }
    Ok(())
}

fn cleanup_source_views(source_path: &Path) -> RehomeResult<()> {
    let views_dir = source_path.join(VIEW_DIR_NAME);
    if views_dir.is_dir() {
        remove_dir_all(&views_dir)?;
    }
    Ok(())
}

/// Re-hash a deterministic sample of the source payload's fully-digested
/// files under their new location and compare against the catalog's
/// recorded digests (spec §4.8 "Spot-check, opt-in").
async fn spot_check(store: &CatalogStore, plan: &RehomePlan, target_path: &Path) -> RehomeResult<()> {
    let Some(payload_hash) = plan.payload_hash.as_ref() else {
        return Ok(());
    };
    let payloads = store.find_payloads_by_hash(payload_hash).await?;
    let Some(source_payload) = payloads
        .iter()
        .find(|payload| payload.device_id == plan.source_device_id)
    else {
        return Ok(());
    };

    let active = store.list_active_files(plan.source_device_id).await?;
    let mut members: Vec<&FileEntry> = active
        .iter()
        .filter(|entry| entry.has_full_digest())
        .filter(|entry| path_under_root(&entry.relative_path, &source_payload.relative_root))
        .collect();
    members.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    const STRIDE: usize = 7;
    for entry in members.iter().step_by(STRIDE) {
        let relative_in_root = strip_root(&entry.relative_path, &source_payload.relative_root);
        let target_file: PathBuf = target_path.join(&relative_in_root);
        let digest = silo_hash::full_hash_blocking(target_file).await?;
        if entry.full_digest.as_deref() != Some(digest.as_str()) {
            return Err(RehomeError::Verification {
                reason: format!("spot-check digest mismatch for '{relative_in_root}'"),
            });
        }
    }
    Ok(())
}

fn strip_root(relative_path: &str, relative_root: &str) -> String {
    if relative_root.is_empty() {
        return relative_path.to_string();
    }
    relative_path
        .strip_prefix(relative_root)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(relative_path)
        .to_string()
}

/// Best-effort rollback: relocate every already-relocated torrent back to
/// its original location and resume it, then (for a MOVE decision) move the
/// payload root back to the source. Cleanup is never attempted on rollback.
async fn rollback(
    client: &TorrentClient,
    plan: &RehomePlan,
    relocated: &[RelocatedTorrent],
    payload_moved: bool,
) {
    let original_locations: std::collections::HashMap<&str, &str> = relocated
        .iter()
        .map(|entry| (entry.infohash.as_str(), entry.original_location.as_str()))
        .collect();

    for infohash in plan.affected_torrents.iter().rev() {
        if let Some(&original) = original_locations.get(infohash.as_str()) {
            if let Err(error) = client.set_location(infohash, original).await {
                tracing::warn!(infohash, %error, "rollback: failed to restore original location");
            }
        }
        if let Err(error) = client.resume(infohash).await {
            tracing::warn!(infohash, %error, "rollback: failed to resume torrent during rollback");
        }
    }

    if payload_moved {
        if let Some(target_path) = plan.target_path.as_deref() {
            let same_device =
                plan.source_device_id == plan.target_device_id.unwrap_or(plan.source_device_id);
            if let Err(error) = move_payload(same_device, Path::new(target_path), Path::new(&plan.source_path)) {
                tracing::warn!(%error, "rollback: failed to move payload back to source");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use silo_model::device::{DeviceId, FsUuid};
    use silo_model::rehome::RehomeDirection;
    use std::fs;
    use tempfile::tempdir;

    async fn store_with_device(mount_point: &str) -> (CatalogStore, DeviceId) {
        let store = CatalogStore::connect("sqlite::memory:").await.unwrap();
        let id = store
            .register_device(&FsUuid("u1".to_string()), "/dev/sda1", mount_point, "ext4", Utc::now())
            .await
            .unwrap();
        (store, id)
    }

    async fn test_client(server: &MockServer) -> TorrentClient {
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v2/auth/login");
                then.status(200).body("Ok.");
            })
            .await;
        TorrentClient::connect(&server.base_url(), "admin", "adminadmin")
            .await
            .unwrap()
    }

    fn reuse_plan(source_path: &Path, target_path: &Path, infohash: &str) -> RehomePlan {
        RehomePlan {
            version: 1,
            direction: RehomeDirection::Demote,
            decision: RehomeDecision::Reuse,
            payload_hash: Some("hash1".to_string()),
            affected_torrents: vec![infohash.to_string()],
            source_device_id: DeviceId(1),
            source_path: source_path.to_string_lossy().into_owned(),
            target_device_id: Some(DeviceId(2)),
            target_path: Some(target_path.to_string_lossy().into_owned()),
            file_count: 1,
            total_bytes: 5,
            reasons: Vec::new(),
            no_blind_copy: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn apply_reuse_relocates_single_torrent_and_resumes() {
        let source_dir = tempdir().unwrap();
        let target_dir = tempdir().unwrap();
        fs::write(target_dir.path().join("e1.mkv"), b"12345").unwrap();

        let (store, _device_id) = store_with_device(source_dir.path().to_str().unwrap()).await;
        let plan = reuse_plan(source_dir.path(), target_dir.path(), "abc123");
        let run_id = store.record_rehome_plan(&plan).await.unwrap();

        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v2/torrents/pause");
                then.status(200);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v2/torrents/setLocation");
                then.status(200);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v2/torrents/resume");
                then.status(200);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/torrents/info");
                then.status(200).json_body(serde_json::json!([
                    {
                        "hash": "abc123",
                        "name": "show",
                        "save_path": target_dir.path().to_string_lossy(),
                        "content_path": null,
                        "category": null,
                        "tags": ""
                    }
                ]));
            })
            .await;

        let client = test_client(&server).await;
        let outcome = apply(&store, &client, run_id, ApplyOptions::default(), None, None)
            .await
            .unwrap();

        assert_eq!(outcome, ApplyOutcome::Completed);
    }

    #[tokio::test]
    async fn apply_rolls_back_when_relocation_verification_fails() {
        let source_dir = tempdir().unwrap();
        let target_dir = tempdir().unwrap();
        fs::write(target_dir.path().join("e1.mkv"), b"12345").unwrap();

        let (store, _device_id) = store_with_device(source_dir.path().to_str().unwrap()).await;
        let plan = reuse_plan(source_dir.path(), target_dir.path(), "abc123");
        let run_id = store.record_rehome_plan(&plan).await.unwrap();

        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v2/torrents/pause");
                then.status(200);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v2/torrents/setLocation");
                then.status(200);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/v2/torrents/resume");
                then.status(200);
            })
            .await;
        // The client never actually reports the new save_path, so
        // relocate_one's post-condition check fails and apply must roll back.
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v2/torrents/info");
                then.status(200).json_body(serde_json::json!([
                    {
                        "hash": "abc123",
                        "name": "show",
                        "save_path": source_dir.path().to_string_lossy(),
                        "content_path": null,
                        "category": null,
                        "tags": ""
                    }
                ]));
            })
            .await;

        let client = test_client(&server).await;
        let outcome = apply(&store, &client, run_id, ApplyOptions::default(), None, None)
            .await
            .unwrap();

        assert_eq!(outcome, ApplyOutcome::RolledBack);
    }

    #[tokio::test]
    async fn apply_rejects_block_plans() {
        let dir = tempdir().unwrap();
        let (store, device_id) = store_with_device(dir.path().to_str().unwrap()).await;
        let plan = RehomePlan::block(
            RehomeDirection::Promote,
            None,
            device_id,
            "warm/seeding/show",
            vec!["payload not present on target".to_string()],
            Utc::now(),
        );
        let run_id = store.record_rehome_plan(&plan).await.unwrap();

        let server = MockServer::start_async().await;
        let client = test_client(&server).await;
        let error = apply(&store, &client, run_id, ApplyOptions::default(), None, None)
            .await
            .unwrap_err();
        assert!(matches!(error, RehomeError::NotApplicable { .. }));
    }

    #[test]
    fn verify_tree_matches_detects_mismatched_byte_total() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.bin"), b"12345").unwrap();

        let mut plan = reuse_plan(dir.path(), dir.path(), "x");
        plan.total_bytes = 999;
        assert!(verify_tree_matches(dir.path(), &plan).is_err());
    }

    #[tokio::test]
    async fn spot_check_skips_plans_without_a_payload_hash() {
        let store = CatalogStore::connect("sqlite::memory:").await.unwrap();
        let mut plan = reuse_plan(Path::new("/a"), Path::new("/b"), "x");
        plan.payload_hash = None;
        assert!(spot_check(&store, &plan, Path::new("/b")).await.is_ok());
    }
}
