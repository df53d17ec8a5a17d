//! `silo-rehome plan`: compute and persist a rehome plan for a payload scope.

use silo_model::rehome::{RehomeDecision, RehomeDirection};
use silo_rehome::RehomeScope;

use crate::context::AppContext;
use crate::error::{AppError, AppResult};

/// Resolve `scope`, compute a rehome plan per affected payload group, and
/// print each group's run id and decision.
pub(crate) async fn plan(
    ctx: &AppContext,
    direction: RehomeDirection,
    scope: RehomeScope,
    source: &str,
    target: &str,
) -> AppResult<()> {
    let source_device = ctx.resolve_device(source).await?;
    let target_device = ctx.resolve_device(target).await?;

    let plans = silo_rehome::plan(
        &ctx.store,
        &ctx.config,
        direction,
        &scope,
        source_device.id,
        target_device.id,
        Some(&ctx.events),
    )
    .await?;

    if plans.is_empty() {
        return Err(AppError::argument("scope resolved to no payload groups"));
    }

    let mut runs = ctx.store.list_rehome_runs(plans.len() as i64).await?;
    runs.reverse();

    let mut blocked = false;
    for (plan, (run_id, _)) in plans.iter().zip(runs.iter()) {
        println!(
            "run {run_id}: decision={:?} payload_hash={} torrents={}",
            plan.decision,
            plan.payload_hash.as_deref().unwrap_or("-"),
            plan.affected_torrents.len()
        );
        if matches!(plan.decision, RehomeDecision::Block) {
            blocked = true;
            for reason in &plan.reasons {
                println!("  blocked: {reason}");
            }
        }
    }

    if blocked {
        return Err(AppError::PlanBlocked(
            "one or more payload groups were blocked; see reasons above".to_string(),
        ));
    }
    Ok(())
}
