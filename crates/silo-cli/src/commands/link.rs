//! `silo link {analyze|plan|show-plan|execute}`.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;

use crate::context::AppContext;
use crate::error::{CliError, CliResult};
use crate::output;

/// Read-only duplicate-group summary, computed without persisting a plan.
pub(crate) async fn analyze(ctx: &AppContext, selector: &str) -> CliResult<()> {
    let device = ctx.resolve_device(selector).await?;
    let active = ctx.store.list_active_files(device.id).await?;

    let mut groups: HashMap<(String, u64), Vec<u64>> = HashMap::new();
    for entry in &active {
        let Some(digest) = entry.full_digest.clone() else {
            continue;
        };
        groups.entry((digest, entry.size)).or_default().push(entry.inode);
    }

    let mut duplicate_groups = 0usize;
    let mut projected_savings = 0u64;
    for ((_, size), inodes) in &groups {
        let distinct: std::collections::HashSet<_> = inodes.iter().collect();
        if distinct.len() < 2 {
            continue;
        }
        duplicate_groups += 1;
        projected_savings += size * u64::try_from(inodes.len() - 1).unwrap_or(0);
    }

    println!("device: {}", device.id.0);
    println!("active_files: {}", active.len());
    println!("duplicate_groups: {duplicate_groups}");
    println!("projected_bytes_to_save: {projected_savings}");
    Ok(())
}

pub(crate) async fn plan(ctx: &AppContext, selector: &str, plan_name: &str) -> CliResult<()> {
    let device = ctx.resolve_device(selector).await?;
    let summary = silo_link::plan(&ctx.store, device.id, plan_name, Some(&ctx.events)).await?;
    println!("plan: {plan_name}");
    println!("action_count: {}", summary.action_count);
    println!("total_bytes_to_save: {}", summary.total_bytes_to_save);
    Ok(())
}

pub(crate) async fn show_plan(ctx: &AppContext, plan_name: &str) -> CliResult<()> {
    let plan = ctx
        .store
        .get_link_plan(plan_name)
        .await?
        .ok_or_else(|| CliError::argument(format!("link plan '{plan_name}' not found")))?;
    output::link_plan_summary(&plan);

    let actions = ctx.store.list_link_actions(plan_name).await?;
    output::link_action_table(&actions);
    Ok(())
}

pub(crate) async fn execute(ctx: &AppContext, plan_name: &str) -> CliResult<()> {
    let cancel = AtomicBool::new(false);
    let status = silo_link::execute_plan(&ctx.store, plan_name, Some(&ctx.events), Some(&cancel)).await?;
    println!("plan: {plan_name}");
    println!("status: {status:?}");
    Ok(())
}
