//! Rehome run audit persistence (spec §4.7, §4.8).
//!
//! Each applied (non-BLOCK) rehome plan is recorded as a full JSON document
//! plus a handful of indexed columns, so an operator can audit or replay a
//! past rehome without re-deriving it from current catalog state.

use chrono::{DateTime, Utc};
use silo_model::device::DeviceId;
use silo_model::rehome::{RehomeDecision, RehomeDirection, RehomePlan};
use sqlx::Row;

use crate::error::{query_ctx, StoreError, StoreResult};
use crate::CatalogStore;

/// Lifecycle status of a persisted rehome run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RehomeRunStatus {
    /// Plan recorded, not yet applied.
    Planned,
    /// The pause/relocate/resume protocol is in progress.
    Applying,
    /// Completed and spot-checked successfully.
    Completed,
    /// Failed and rolled back.
    RolledBack,
}

impl RehomeRunStatus {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::Applying => "applying",
            Self::Completed => "completed",
            Self::RolledBack => "rolled_back",
        }
    }
}

impl CatalogStore {
    /// Persist a rehome plan as a new audit row, returning its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert or JSON serialization fails.
    pub async fn record_rehome_plan(&self, plan: &RehomePlan) -> StoreResult<i64> {
        let plan_json = serde_json::to_string(plan).map_err(|error| StoreError::Decode {
            table: "rehome_runs",
            reason: format!("failed to serialize plan: {error}"),
        })?;

        let row = sqlx::query(
            "INSERT INTO rehome_runs \
             (direction, decision, payload_hash, source_device_id, source_path, \
              target_device_id, target_path, file_count, total_bytes, reasons, status, \
              plan_json, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13) RETURNING id",
        )
        .bind(direction_str(plan.direction))
        .bind(decision_str(plan.decision))
        .bind(&plan.payload_hash)
        .bind(plan.source_device_id.0)
        .bind(&plan.source_path)
        .bind(plan.target_device_id.map(|id| id.0))
        .bind(&plan.target_path)
        .bind(plan.file_count)
        .bind(plan.total_bytes)
        .bind(plan.reasons.join("; "))
        .bind(initial_status(plan).as_str())
        .bind(plan_json)
        .bind(plan.created_at.to_rfc3339())
        .fetch_one(self.pool())
        .await
        .map_err(query_ctx("record_rehome_plan"))?;

        row.try_get("id").map_err(query_ctx("record_rehome_plan"))
    }

    /// Transition a rehome run to a new status, marking `completed_at` when
    /// it reaches a terminal state.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn update_rehome_run_status(
        &self,
        run_id: i64,
        status: RehomeRunStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let completed_at = matches!(status, RehomeRunStatus::Completed | RehomeRunStatus::RolledBack)
            .then(|| now.to_rfc3339());

        sqlx::query("UPDATE rehome_runs SET status = ?1, completed_at = ?2 WHERE id = ?3")
            .bind(status.as_str())
            .bind(completed_at)
            .bind(run_id)
            .execute(self.pool())
            .await
            .map_err(query_ctx("update_rehome_run_status"))?;
        Ok(())
    }

    /// Load a rehome run's original plan document back out, for replay or
    /// audit display.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored JSON is corrupt.
    pub async fn get_rehome_plan(&self, run_id: i64) -> StoreResult<Option<RehomePlan>> {
        let row = sqlx::query("SELECT plan_json FROM rehome_runs WHERE id = ?1")
            .bind(run_id)
            .fetch_optional(self.pool())
            .await
            .map_err(query_ctx("get_rehome_plan"))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let plan_json: String = row.try_get("plan_json").map_err(query_ctx("get_rehome_plan"))?;
        let plan = serde_json::from_str(&plan_json).map_err(|error| StoreError::Decode {
            table: "rehome_runs",
            reason: format!("corrupt plan_json: {error}"),
        })?;
        Ok(Some(plan))
    }

    /// List the most recently persisted rehome runs, newest first, paired
    /// with their run id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or any stored plan JSON is
    /// corrupt.
    pub async fn list_rehome_runs(&self, limit: i64) -> StoreResult<Vec<(i64, RehomePlan)>> {
        let rows = sqlx::query("SELECT id, plan_json FROM rehome_runs ORDER BY id DESC LIMIT ?1")
            .bind(limit)
            .fetch_all(self.pool())
            .await
            .map_err(query_ctx("list_rehome_runs"))?;

        let mut runs = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id").map_err(query_ctx("list_rehome_runs"))?;
            let plan_json: String = row.try_get("plan_json").map_err(query_ctx("list_rehome_runs"))?;
            let plan = serde_json::from_str(&plan_json).map_err(|error| StoreError::Decode {
                table: "rehome_runs",
                reason: format!("corrupt plan_json: {error}"),
            })?;
            runs.push((id, plan));
        }
        Ok(runs)
    }
}

fn initial_status(plan: &RehomePlan) -> RehomeRunStatus {
    if plan.is_applicable() {
        RehomeRunStatus::Planned
    } else {
        RehomeRunStatus::Completed
    }
}

fn direction_str(direction: RehomeDirection) -> &'static str {
    match direction {
        RehomeDirection::Demote => "demote",
        RehomeDirection::Promote => "promote",
    }
}

fn decision_str(decision: RehomeDecision) -> &'static str {
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

    #[tokio::test]
    async fn record_and_reload_block_plan() {
        let store = CatalogStore::connect("sqlite::memory:").await.unwrap();
        let device_id = store
            .register_device(&FsUuid("u1".to_string()), "/dev/sda1", "/mnt/warm", "ext4", Utc::now())
            .await
            .unwrap();

        let plan = RehomePlan::block(
            RehomeDirection::Promote,
            None,
            device_id,
            "cold/seeding/show",
            vec!["payload not present on target".to_string()],
            Utc::now(),
        );

        let run_id = store.record_rehome_plan(&plan).await.unwrap();
        let reloaded = store.get_rehome_plan(run_id).await.unwrap().unwrap();
        assert_eq!(reloaded.decision, RehomeDecision::Block);
        assert_eq!(reloaded.reasons, plan.reasons);
    }

    #[tokio::test]
    async fn update_status_sets_completed_at_on_terminal_states() {
        let store = CatalogStore::connect("sqlite::memory:").await.unwrap();
        let device_id = store
            .register_device(&FsUuid("u2".to_string()), "/dev/sdb1", "/mnt/cold", "zfs", Utc::now())
            .await
            .unwrap();
        let plan = RehomePlan::block(
            RehomeDirection::Demote,
            None,
            device_id,
            "warm/seeding/show",
            vec!["external consumer detected".to_string()],
            Utc::now(),
        );
        let run_id = store.record_rehome_plan(&plan).await.unwrap();

        store
            .update_rehome_run_status(run_id, RehomeRunStatus::Completed, Utc::now())
            .await
            .unwrap();

        let completed_at: Option<String> =
            sqlx::query_as::<_, (Option<String>,)>("SELECT completed_at FROM rehome_runs WHERE id = ?1")
                .bind(run_id)
                .fetch_one(store.pool())
                .await
                .unwrap()
                .0;
        assert!(completed_at.is_some());
    }

    #[tokio::test]
    async fn list_rehome_runs_returns_newest_first() {
        let store = CatalogStore::connect("sqlite::memory:").await.unwrap();
        let device_id = store
            .register_device(&FsUuid("u3".to_string()), "/dev/sdc1", "/mnt/warm", "ext4", Utc::now())
            .await
            .unwrap();

        let first = store
            .record_rehome_plan(&RehomePlan::block(
                RehomeDirection::Demote,
                None,
                device_id,
                "warm/seeding/a",
                vec!["payload hash missing".to_string()],
                Utc::now(),
            ))
            .await
            .unwrap();
        let second = store
            .record_rehome_plan(&RehomePlan::block(
                RehomeDirection::Demote,
                None,
                device_id,
                "warm/seeding/b",
                vec!["payload hash missing".to_string()],
                Utc::now(),
            ))
            .await
            .unwrap();

        let runs = store.list_rehome_runs(2).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].0, second);
        assert_eq!(runs[1].0, first);
    }
}
