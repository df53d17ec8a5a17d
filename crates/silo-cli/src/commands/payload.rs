//! `silo payload {sync|show|siblings}`.

use crate::context::AppContext;
use crate::error::{CliError, CliResult};
use crate::output;

pub(crate) async fn sync(ctx: &AppContext) -> CliResult<()> {
    let client = ctx.client().await?;
    let outcome = silo_payload::sync(&ctx.store, &client, Some(&ctx.events)).await?;
    println!("torrents_processed: {}", outcome.torrents_processed);
    println!("payloads_built: {}", outcome.payloads_built);
    println!("needs_full_hash: {}", outcome.needs_full_hash);
    Ok(())
}

pub(crate) async fn show(ctx: &AppContext, selector: &str, relative_root: &str) -> CliResult<()> {
    let device = ctx.resolve_device(selector).await?;
    let payload = ctx
        .store
        .get_payload(device.id, relative_root)
        .await?
        .ok_or_else(|| {
            CliError::argument(format!(
                "no payload recorded for device {} at '{relative_root}'",
                device.id.0
            ))
        })?;

    println!("payload_hash: {}", payload.payload_hash.as_deref().unwrap_or("-"));
    println!("device_id: {}", payload.device_id.0);
    println!("relative_root: {}", payload.relative_root);
    println!("file_count: {}", payload.file_count);
    println!("total_bytes: {}", payload.total_bytes);
    println!("last_built_at: {}", payload.last_built_at);
    Ok(())
}

pub(crate) async fn siblings(ctx: &AppContext, payload_hash: &str) -> CliResult<()> {
    let instances = silo_payload::siblings(&ctx.store, payload_hash).await?;
    output::torrent_instance_table(&instances);
    Ok(())
}
