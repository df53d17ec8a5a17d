//! `silo scan` and `silo stats`.

use std::path::PathBuf;

use silo_model::payload::HashMode;
use silo_scan::ScanOptions;

use crate::context::AppContext;
use crate::error::CliResult;

/// Hashing mode accepted on the command line.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum HashModeArg {
    /// Sample-hash only.
    Fast,
    /// Sample and full content hash.
    Full,
    /// Full digest for rows that still lack one.
    Upgrade,
}

impl From<HashModeArg> for HashMode {
    fn from(value: HashModeArg) -> Self {
        match value {
            HashModeArg::Fast => Self::Fast,
            HashModeArg::Full => Self::Full,
            HashModeArg::Upgrade => Self::Upgrade,
        }
    }
}

pub(crate) async fn scan(
    ctx: &AppContext,
    root: PathBuf,
    hash_mode: HashModeArg,
    workers: usize,
) -> CliResult<()> {
    let options = ScanOptions {
        hash_mode: hash_mode.into(),
        workers,
    };
    let outcome = silo_scan::scan_root(&ctx.store, Some(&ctx.events), &root, &options).await?;
    println!("session_id: {}", outcome.session_id);
    println!("device_id: {}", outcome.device_id);
    println!("added: {}", outcome.added);
    println!("updated: {}", outcome.updated);
    println!("unchanged: {}", outcome.unchanged);
    println!("deleted: {}", outcome.deleted);
    println!("bytes_hashed: {}", outcome.bytes_hashed);
    Ok(())
}

pub(crate) async fn stats(ctx: &AppContext) -> CliResult<()> {
    let devices = ctx.store.list_devices().await?;
    let device_count = devices.len();
    let file_total: i64 = devices.iter().map(|device| device.file_count).sum();
    let byte_total: i64 = devices.iter().map(|device| device.byte_total).sum();
    let scan_total: i64 = devices.iter().map(|device| device.scan_count).sum();

    println!("devices: {device_count}");
    println!("files: {file_total}");
    println!("bytes: {byte_total}");
    println!("scans: {scan_total}");
    crate::output::device_table(&devices);
    Ok(())
}
