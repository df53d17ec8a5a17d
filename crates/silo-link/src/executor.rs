//! Sequential hardlink dedup execution with backup + verify + rollback
//! (spec §4.6, executor half).

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use silo_events::{Event, EventBus};
use silo_fsops::{hard_link, remove_file, rename, stat_path};
use silo_model::link::{LinkAction, LinkActionStatus, LinkPlanStatus};
use silo_store::CatalogStore;

use crate::error::{LinkError, LinkResult};

const BACKUP_SUFFIX: &str = ".silo-link-backup";

/// Execute every unresolved action in `plan_name`, in planner-assigned
/// order. Already-completed or skipped actions are left untouched
/// (idempotent re-execution). Individual action failures do not abort the
/// run; only a tripped `cancel` flag does, between actions.
///
/// # Errors
///
/// Returns an error if the plan does not exist or a catalog query/update
/// fails; individual filesystem failures are recorded on the action instead
/// of propagated.
pub async fn execute_plan(
    store: &CatalogStore,
    plan_name: &str,
    events: Option<&EventBus>,
    cancel: Option<&AtomicBool>,
) -> LinkResult<LinkPlanStatus> {
    store
        .get_link_plan(plan_name)
        .await?
        .ok_or_else(|| LinkError::PlanNotFound {
            name: plan_name.to_string(),
        })?;

    let actions = store.list_link_actions(plan_name).await?;
    let mut plan_status = LinkPlanStatus::InProgress;

    for action in &actions {
        if action.is_resolved() {
            continue;
        }
        if cancel.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
            tracing::info!(plan_name, "link execution cancelled before next action");
            plan_status = LinkPlanStatus::Cancelled;
            break;
        }

        let now = Utc::now();
        let outcome = execute_action(store, action, now).await?;

        if let Some(bus) = events {
            bus.publish(Event::LinkActionResolved {
                plan_name: plan_name.to_string(),
                duplicate_path: action.duplicate_path.clone(),
                status: format!("{outcome:?}"),
            });
        }
        plan_status = outcome;
    }

    if plan_status == LinkPlanStatus::Cancelled {
        return Ok(plan_status);
    }

    let plan = store
        .get_link_plan(plan_name)
        .await?
        .ok_or_else(|| LinkError::PlanNotFound {
            name: plan_name.to_string(),
        })?;
    Ok(plan.status)
}

/// Run the seven-step sequence for a single pending action (spec §4.6 steps
/// 1-7), recording its outcome on the catalog row. Returns the owning plan's
/// status after this action resolved.
async fn execute_action(
    store: &CatalogStore,
    action: &LinkAction,
    now: chrono::DateTime<Utc>,
) -> LinkResult<LinkPlanStatus> {
    let canonical_path = Path::new(&action.canonical_path);
    let duplicate_path = Path::new(&action.duplicate_path);

    let canonical_stat = match stat_path(canonical_path) {
        Ok(stat) => stat,
        Err(error) => {
            return fail(store, action, format!("canonical path stat failed: {error}"), None, now)
                .await
        }
    };
    let duplicate_stat = match stat_path(duplicate_path) {
        Ok(stat) => stat,
        Err(error) => {
            return fail(store, action, format!("duplicate path stat failed: {error}"), None, now)
                .await
        }
    };

    if canonical_stat.dev != duplicate_stat.dev {
        return fail(
            store,
            action,
            "canonical and duplicate paths reside on different devices".to_string(),
            None,
            now,
        )
        .await;
    }

    if duplicate_stat.inode == canonical_stat.inode {
        return complete(store, action, action.size, None, now).await;
    }

    let backup_path = format!("{}{BACKUP_SUFFIX}", action.duplicate_path);
    if let Err(error) = rename(duplicate_path, Path::new(&backup_path)) {
        return fail(store, action, format!("backup rename failed: {error}"), None, now).await;
    }

    if let Err(error) = hard_link(canonical_path, duplicate_path) {
        let _ = rename(Path::new(&backup_path), duplicate_path);
        return fail(
            store,
            action,
            format!("hardlink creation failed, backup restored: {error}"),
            None,
            now,
        )
        .await;
    }

    match stat_path(duplicate_path) {
        Ok(verify_stat) if verify_stat.inode == canonical_stat.inode => {}
        Ok(_) => {
            let _ = remove_file(duplicate_path);
            let _ = rename(Path::new(&backup_path), duplicate_path);
            return fail(
                store,
                action,
                "post-link inode verification failed, backup restored".to_string(),
                Some(&backup_path),
                now,
            )
            .await;
        }
        Err(error) => {
            let _ = rename(Path::new(&backup_path), duplicate_path);
            return fail(
                store,
                action,
                format!("post-link stat failed, backup restored: {error}"),
                None,
                now,
            )
            .await;
        }
    }

    if let Err(error) = remove_file(Path::new(&backup_path)) {
        tracing::warn!(backup_path, %error, "failed to remove hardlink backup after successful link");
    }

    complete(store, action, action.size, None, now).await
}

async fn complete(
    store: &CatalogStore,
    action: &LinkAction,
    bytes_saved: u64,
    backup_path: Option<&str>,
    now: chrono::DateTime<Utc>,
) -> LinkResult<LinkPlanStatus> {
    let status = store
        .record_link_action_outcome(
            &action.plan_name,
            &action.duplicate_path,
            LinkActionStatus::Completed,
            Some(bytes_saved),
            None,
            backup_path,
            now,
        )
        .await?;
    Ok(status)
}

async fn fail(
    store: &CatalogStore,
    action: &LinkAction,
    reason: String,
    backup_path: Option<&str>,
    now: chrono::DateTime<Utc>,
) -> LinkResult<LinkPlanStatus> {
    tracing::warn!(plan_name = action.plan_name, duplicate_path = action.duplicate_path, reason, "link action failed");
    let status = store
        .record_link_action_outcome(
            &action.plan_name,
            &action.duplicate_path,
            LinkActionStatus::Failed,
            None,
            Some(&reason),
            backup_path,
            now,
        )
        .await?;
    Ok(status)
}
