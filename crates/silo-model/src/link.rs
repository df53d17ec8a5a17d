//! Same-device hardlink dedup plans and actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::device::DeviceId;

/// Lifecycle status of a [`LinkPlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkPlanStatus {
    /// The plan has been computed and persisted but not yet executed.
    Pending,
    /// The executor is currently stepping through this plan's actions.
    InProgress,
    /// Every action completed, was a noop, or was skipped.
    Completed,
    /// At least one action is in a `failed` state.
    Failed,
    /// The plan was cancelled before every action resolved.
    Cancelled,
}

/// A planned (and, once executed, audited) same-device hardlink dedup run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkPlan {
    /// Human-assigned or generated plan name.
    pub name: String,
    /// Device this plan applies to (hardlinks cannot cross devices).
    pub device_id: DeviceId,
    /// Current status.
    pub status: LinkPlanStatus,
    /// Number of actions in this plan.
    pub action_count: i64,
    /// Sum of `bytes_to_save` across all actions.
    pub total_bytes_to_save: i64,
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// When the plan was last updated (status/action changes).
    pub updated_at: DateTime<Utc>,
}

/// What a [`LinkAction`] will do, or did, to a duplicate path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkActionKind {
    /// Replace the duplicate path with a hardlink to the canonical path.
    Hardlink,
    /// The duplicate path could not be safely linked (e.g. cross-device);
    /// recorded but not attempted.
    Skip,
    /// The duplicate path already shares the canonical path's inode.
    Noop,
}

/// Lifecycle status of a [`LinkAction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkActionStatus {
    /// Not yet attempted.
    Pending,
    /// Currently being executed.
    InProgress,
    /// Finished successfully (including noops).
    Completed,
    /// Failed; `error` carries the reason.
    Failed,
    /// Explicitly not attempted (e.g. same-device check failed upfront).
    Skipped,
}

/// A single planned hardlink dedup step within a [`LinkPlan`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkAction {
    /// Name of the owning plan.
    pub plan_name: String,
    /// What this action will do.
    pub kind: LinkActionKind,
    /// Current status.
    pub status: LinkActionStatus,
    /// The canonical path other paths will be linked against.
    pub canonical_path: String,
    /// The duplicate path to be replaced with a hardlink.
    pub duplicate_path: String,
    /// Inode of the canonical path at plan time.
    pub canonical_inode: u64,
    /// Inode of the duplicate path at plan time.
    pub duplicate_inode: u64,
    /// Shared file size.
    pub size: u64,
    /// Shared content digest.
    pub digest: String,
    /// Bytes expected to be saved if this action completes (equals `size`).
    pub expected_bytes_saved: u64,
    /// Bytes actually saved once the action completes.
    pub actual_bytes_saved: Option<u64>,
    /// When this action was executed.
    pub executed_at: Option<DateTime<Utc>>,
    /// Error text if the action failed.
    pub error: Option<String>,
    /// Path the duplicate was renamed to before linking, so it can be
    /// restored on verification failure.
    pub backup_path: Option<String>,
}

impl LinkAction {
    /// Construct a pending hardlink action for a duplicate path.
    #[must_use]
    pub fn pending_hardlink(
        plan_name: impl Into<String>,
        canonical_path: impl Into<String>,
        duplicate_path: impl Into<String>,
        canonical_inode: u64,
        duplicate_inode: u64,
        size: u64,
        digest: impl Into<String>,
    ) -> Self {
        Self {
            plan_name: plan_name.into(),
            kind: LinkActionKind::Hardlink,
            status: LinkActionStatus::Pending,
            canonical_path: canonical_path.into(),
            duplicate_path: duplicate_path.into(),
            canonical_inode,
            duplicate_inode,
            size,
            digest: digest.into(),
            expected_bytes_saved: size,
            actual_bytes_saved: None,
            executed_at: None,
            error: None,
            backup_path: None,
        }
    }

    /// Whether this action's plan should be considered resolved (completed,
    /// noop-via-completed, or skipped) for the purposes of plan-status
    /// aggregation.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(
            self.status,
            LinkActionStatus::Completed | LinkActionStatus::Skipped
        )
    }
}

/// Aggregate a plan's final status from its actions' statuses, per spec §4.6:
/// "completed" if all actions are completed/noop/skipped, "failed" if any
/// remain failed.
#[must_use]
pub fn aggregate_plan_status(actions: &[LinkAction]) -> LinkPlanStatus {
    if actions
        .iter()
        .any(|action| action.status == LinkActionStatus::Failed)
    {
        return LinkPlanStatus::Failed;
    }
    if actions.iter().all(LinkAction::is_resolved) {
        return LinkPlanStatus::Completed;
    }
    LinkPlanStatus::InProgress
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action_with_status(status: LinkActionStatus) -> LinkAction {
        let mut action = LinkAction::pending_hardlink("p", "a", "b", 1, 2, 10, "d");
        action.status = status;
        action
    }

    #[test]
    fn aggregate_completed_when_all_resolved() {
        let actions = vec![
            action_with_status(LinkActionStatus::Completed),
            action_with_status(LinkActionStatus::Skipped),
        ];
        assert_eq!(aggregate_plan_status(&actions), LinkPlanStatus::Completed);
    }

    #[test]
    fn aggregate_failed_when_any_failed() {
        let actions = vec![
            action_with_status(LinkActionStatus::Completed),
            action_with_status(LinkActionStatus::Failed),
        ];
        assert_eq!(aggregate_plan_status(&actions), LinkPlanStatus::Failed);
    }

    #[test]
    fn aggregate_in_progress_when_pending_remain() {
        let actions = vec![
            action_with_status(LinkActionStatus::Completed),
            action_with_status(LinkActionStatus::Pending),
        ];
        assert_eq!(aggregate_plan_status(&actions), LinkPlanStatus::InProgress);
    }
}
