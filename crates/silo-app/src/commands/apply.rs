//! `silo-rehome apply`: apply a previously planned rehome run.

use std::sync::atomic::AtomicBool;

use silo_rehome::{ApplyOptions, ApplyOutcome};

use crate::context::AppContext;
use crate::error::{AppError, AppResult};

/// Apply a persisted, non-BLOCK rehome run and report its outcome.
pub(crate) async fn apply(ctx: &AppContext, run_id: i64, options: ApplyOptions) -> AppResult<()> {
    let client = ctx.client().await?;
    let cancel = AtomicBool::new(false);

    let outcome = silo_rehome::apply(&ctx.store, &client, run_id, options, Some(&ctx.events), Some(&cancel)).await?;

    println!("run: {run_id}");
    println!("outcome: {outcome:?}");

    if matches!(outcome, ApplyOutcome::RolledBack) {
        return Err(AppError::Execution(anyhow::anyhow!(
            "rehome run {run_id} failed and was rolled back"
        )));
    }
    Ok(())
}
