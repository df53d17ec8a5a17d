//! Hardlink dedup plan and action persistence (spec §4.6).

use chrono::{DateTime, Utc};
use silo_model::device::DeviceId;
use silo_model::link::{
    aggregate_plan_status, LinkAction, LinkActionKind, LinkActionStatus, LinkPlan, LinkPlanStatus,
};
use sqlx::Row;

use crate::error::{query_ctx, StoreError, StoreResult};
use crate::CatalogStore;

impl CatalogStore {
    /// Create a new link plan header row.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn create_link_plan(
        &self,
        name: &str,
        device_id: DeviceId,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO link_plans (name, device_id, status, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?4)",
        )
        .bind(name)
        .bind(device_id.0)
        .bind(status_str(LinkPlanStatus::Pending))
        .bind(now.to_rfc3339())
        .execute(self.pool())
        .await
        .map_err(query_ctx("create_link_plan"))?;
        Ok(())
    }

    /// Append an action to a plan, updating the plan's action count and
    /// projected savings.
    ///
    /// # Errors
    ///
    /// Returns an error if either query fails.
    pub async fn add_link_action(&self, action: &LinkAction, now: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO link_actions \
             (plan_name, kind, status, canonical_path, duplicate_path, canonical_inode, \
              duplicate_inode, size, digest, expected_bytes_saved, actual_bytes_saved, \
              executed_at, error, backup_path) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        )
        .bind(&action.plan_name)
        .bind(action_kind_str(action.kind))
        .bind(action_status_str(action.status))
        .bind(&action.canonical_path)
        .bind(&action.duplicate_path)
        .bind(i64::try_from(action.canonical_inode).unwrap_or(i64::MAX))
        .bind(i64::try_from(action.duplicate_inode).unwrap_or(i64::MAX))
        .bind(i64::try_from(action.size).unwrap_or(i64::MAX))
        .bind(&action.digest)
        .bind(i64::try_from(action.expected_bytes_saved).unwrap_or(i64::MAX))
        .bind(action.actual_bytes_saved.map(|n| i64::try_from(n).unwrap_or(i64::MAX)))
        .bind(action.executed_at.map(|ts| ts.to_rfc3339()))
        .bind(&action.error)
        .bind(&action.backup_path)
        .execute(self.pool())
        .await
        .map_err(query_ctx("add_link_action"))?;

        sqlx::query(
            "UPDATE link_plans SET action_count = action_count + 1, \
             total_bytes_to_save = total_bytes_to_save + ?1, updated_at = ?2 WHERE name = ?3",
        )
        .bind(i64::try_from(action.expected_bytes_saved).unwrap_or(i64::MAX))
        .bind(now.to_rfc3339())
        .bind(&action.plan_name)
        .execute(self.pool())
        .await
        .map_err(query_ctx("add_link_action"))?;
        Ok(())
    }

    /// List every action belonging to a plan, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_link_actions(&self, plan_name: &str) -> StoreResult<Vec<LinkAction>> {
        let rows = sqlx::query(
            "SELECT plan_name, kind, status, canonical_path, duplicate_path, canonical_inode, \
             duplicate_inode, size, digest, expected_bytes_saved, actual_bytes_saved, \
             executed_at, error, backup_path FROM link_actions WHERE plan_name = ?1 ORDER BY id",
        )
        .bind(plan_name)
        .fetch_all(self.pool())
        .await
        .map_err(query_ctx("list_link_actions"))?;

        rows.iter().map(link_action_from_row).collect()
    }

    /// Update a single action's outcome after execution, then recompute and
    /// persist the owning plan's aggregate status.
    ///
    /// # Errors
    ///
    /// Returns an error if any query fails.
    pub async fn record_link_action_outcome(
        &self,
        plan_name: &str,
        duplicate_path: &str,
        status: LinkActionStatus,
        actual_bytes_saved: Option<u64>,
        error: Option<&str>,
        backup_path: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<LinkPlanStatus> {
        sqlx::query(
            "UPDATE link_actions SET status = ?1, actual_bytes_saved = ?2, executed_at = ?3, \
             error = ?4, backup_path = ?5 WHERE plan_name = ?6 AND duplicate_path = ?7",
        )
        .bind(action_status_str(status))
        .bind(actual_bytes_saved.map(|n| i64::try_from(n).unwrap_or(i64::MAX)))
        .bind(now.to_rfc3339())
        .bind(error)
        .bind(backup_path)
        .bind(plan_name)
        .bind(duplicate_path)
        .execute(self.pool())
        .await
        .map_err(query_ctx("record_link_action_outcome"))?;

        let actions = self.list_link_actions(plan_name).await?;
        let plan_status = aggregate_plan_status(&actions);
        sqlx::query("UPDATE link_plans SET status = ?1, updated_at = ?2 WHERE name = ?3")
            .bind(status_str(plan_status))
            .bind(now.to_rfc3339())
            .bind(plan_name)
            .execute(self.pool())
            .await
            .map_err(query_ctx("record_link_action_outcome"))?;

        Ok(plan_status)
    }

    /// Look up a plan header by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_link_plan(&self, name: &str) -> StoreResult<Option<LinkPlan>> {
        let row = sqlx::query(
            "SELECT name, device_id, status, action_count, total_bytes_to_save, created_at, \
             updated_at FROM link_plans WHERE name = ?1",
        )
        .bind(name)
        .fetch_optional(self.pool())
        .await
        .map_err(query_ctx("get_link_plan"))?;

        row.as_ref().map(link_plan_from_row).transpose()
    }
}

fn status_str(status: LinkPlanStatus) -> &'static str {
    match status {
        LinkPlanStatus::Pending => "pending",
        LinkPlanStatus::InProgress => "in_progress",
        LinkPlanStatus::Completed => "completed",
        LinkPlanStatus::Failed => "failed",
        LinkPlanStatus::Cancelled => "cancelled",
    }
}

fn action_kind_str(kind: LinkActionKind) -> &'static str {
    match kind {
        LinkActionKind::Hardlink => "hardlink",
        LinkActionKind::Skip => "skip",
        LinkActionKind::Noop => "noop",
    }
}

fn action_status_str(status: LinkActionStatus) -> &'static str {
    match status {
        LinkActionStatus::Pending => "pending",
        LinkActionStatus::InProgress => "in_progress",
        LinkActionStatus::Completed => "completed",
        LinkActionStatus::Failed => "failed",
        LinkActionStatus::Skipped => "skipped",
    }
}

fn link_action_from_row(row: &sqlx::sqlite::SqliteRow) -> StoreResult<LinkAction> {
    let err = query_ctx("decode_link_action");
    let kind_text: String = row.try_get("kind").map_err(err)?;
    let kind = match kind_text.as_str() {
        "hardlink" => LinkActionKind::Hardlink,
        "skip" => LinkActionKind::Skip,
        "noop" => LinkActionKind::Noop,
        other => {
            return Err(StoreError::Decode {
                table: "link_actions",
                reason: format!("unknown action kind {other}"),
            })
        }
    };

    let status_text: String = row.try_get("status").map_err(query_ctx("decode_link_action"))?;
    let status = match status_text.as_str() {
        "pending" => LinkActionStatus::Pending,
        "in_progress" => LinkActionStatus::InProgress,
        "completed" => LinkActionStatus::Completed,
        "failed" => LinkActionStatus::Failed,
        "skipped" => LinkActionStatus::Skipped,
        other => {
            return Err(StoreError::Decode {
                table: "link_actions",
                reason: format!("unknown action status {other}"),
            })
        }
    };

    let canonical_inode: i64 = row
        .try_get("canonical_inode")
        .map_err(query_ctx("decode_link_action"))?;
    let duplicate_inode: i64 = row
        .try_get("duplicate_inode")
        .map_err(query_ctx("decode_link_action"))?;
    let size: i64 = row.try_get("size").map_err(query_ctx("decode_link_action"))?;
    let actual_bytes_saved: Option<i64> = row
        .try_get("actual_bytes_saved")
        .map_err(query_ctx("decode_link_action"))?;
    let expected_bytes_saved: i64 = row
        .try_get("expected_bytes_saved")
        .map_err(query_ctx("decode_link_action"))?;
    let executed_at: Option<String> = row
        .try_get("executed_at")
        .map_err(query_ctx("decode_link_action"))?;

    Ok(LinkAction {
        plan_name: row.try_get("plan_name").map_err(query_ctx("decode_link_action"))?,
        kind,
        status,
        canonical_path: row
            .try_get("canonical_path")
            .map_err(query_ctx("decode_link_action"))?,
        duplicate_path: row
            .try_get("duplicate_path")
            .map_err(query_ctx("decode_link_action"))?,
        canonical_inode: u64::try_from(canonical_inode).unwrap_or_default(),
        duplicate_inode: u64::try_from(duplicate_inode).unwrap_or_default(),
        size: u64::try_from(size).unwrap_or_default(),
        digest: row.try_get("digest").map_err(query_ctx("decode_link_action"))?,
        expected_bytes_saved: u64::try_from(expected_bytes_saved).unwrap_or_default(),
        actual_bytes_saved: actual_bytes_saved.map(|n| u64::try_from(n).unwrap_or_default()),
        executed_at: executed_at
            .map(|raw| parse_rfc3339(&raw, "link_actions"))
            .transpose()?,
        error: row.try_get("error").map_err(query_ctx("decode_link_action"))?,
        backup_path: row.try_get("backup_path").map_err(query_ctx("decode_link_action"))?,
    })
}

fn link_plan_from_row(row: &sqlx::sqlite::SqliteRow) -> StoreResult<LinkPlan> {
    let status_text: String = row.try_get("status").map_err(query_ctx("decode_link_plan"))?;
    let status = match status_text.as_str() {
        "pending" => LinkPlanStatus::Pending,
        "in_progress" => LinkPlanStatus::InProgress,
        "completed" => LinkPlanStatus::Completed,
        "failed" => LinkPlanStatus::Failed,
        "cancelled" => LinkPlanStatus::Cancelled,
        other => {
            return Err(StoreError::Decode {
                table: "link_plans",
                reason: format!("unknown plan status {other}"),
            })
        }
    };

    Ok(LinkPlan {
        name: row.try_get("name").map_err(query_ctx("decode_link_plan"))?,
        device_id: DeviceId(row.try_get("device_id").map_err(query_ctx("decode_link_plan"))?),
        status,
        action_count: row.try_get("action_count").map_err(query_ctx("decode_link_plan"))?,
        total_bytes_to_save: row
            .try_get("total_bytes_to_save")
            .map_err(query_ctx("decode_link_plan"))?,
        created_at: parse_ts(row, "created_at", "link_plans")?,
        updated_at: parse_ts(row, "updated_at", "link_plans")?,
    })
}

fn parse_ts(
    row: &sqlx::sqlite::SqliteRow,
    column: &'static str,
    table: &'static str,
) -> StoreResult<DateTime<Utc>> {
    let raw: String = row.try_get(column).map_err(query_ctx("decode_timestamp"))?;
    parse_rfc3339(&raw, table)
}

fn parse_rfc3339(raw: &str, table: &'static str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| StoreError::Decode {
            table,
            reason: format!("invalid timestamp: {error}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use silo_model::device::FsUuid;
    use silo_model::link::LinkAction;

    #[tokio::test]
    async fn plan_status_aggregates_to_completed_once_all_actions_resolve() {
        let store = CatalogStore::connect("sqlite::memory:").await.unwrap();
        let device_id = store
            .register_device(&FsUuid("u1".to_string()), "/dev/sda1", "/mnt/warm", "ext4", Utc::now())
            .await
            .unwrap();

        let now = Utc::now();
        store.create_link_plan("plan-a", device_id, now).await.unwrap();
        let action = LinkAction::pending_hardlink("plan-a", "a/1", "a/2", 1, 2, 100, "digest");
        store.add_link_action(&action, now).await.unwrap();

        let status = store
            .record_link_action_outcome("plan-a", "a/2", LinkActionStatus::Completed, Some(100), None, None, now)
            .await
            .unwrap();
        assert_eq!(status, LinkPlanStatus::Completed);

        let plan = store.get_link_plan("plan-a").await.unwrap().unwrap();
        assert_eq!(plan.status, LinkPlanStatus::Completed);
        assert_eq!(plan.action_count, 1);
    }
}
