//! `silo devices {list|show|alias}`.

use crate::context::AppContext;
use crate::error::CliResult;
use crate::output;

pub(crate) async fn list(ctx: &AppContext) -> CliResult<()> {
    let devices = ctx.store.list_devices().await?;
    output::device_table(&devices);
    Ok(())
}

pub(crate) async fn show(ctx: &AppContext, selector: &str) -> CliResult<()> {
    let device = ctx.resolve_device(selector).await?;
    output::device_detail(&device);
    Ok(())
}

pub(crate) async fn alias(ctx: &AppContext, selector: &str, new_alias: &str) -> CliResult<()> {
    let device = ctx.resolve_device(selector).await?;
    ctx.store.set_device_alias(device.id, new_alias).await?;
    println!("device {} aliased to '{new_alias}'", device.id.0);
    Ok(())
}
