//! Argument parsing and command dispatch for the `silo` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use silo_telemetry::{LogFormat, LoggingConfig};

use crate::commands::scan::HashModeArg;
use crate::commands::{devices, link, payload, scan};
use crate::context::AppContext;
use crate::error::CliResult;

/// Catalog and torrent-payload toolkit.
#[derive(Parser)]
#[command(name = "silo", about = "Multi-device file catalog and torrent rehome toolkit")]
struct Cli {
    /// Path to a `silo.toml` configuration file; defaults to `./silo.toml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the `RUST_LOG`-style log level.
    #[arg(long, global = true, env = "SILO_LOG_LEVEL")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a filesystem root and reconcile it against the catalog.
    Scan(ScanArgs),
    /// Print aggregate device and catalog statistics.
    Stats,
    /// Device registry operations.
    #[command(subcommand)]
    Devices(DevicesCommand),
    /// Payload identity operations.
    #[command(subcommand)]
    Payload(PayloadCommand),
    /// Same-device hardlink dedup operations.
    #[command(subcommand)]
    Link(LinkCommand),
}

#[derive(Args)]
struct ScanArgs {
    /// Filesystem path to scan.
    root: PathBuf,
    /// Which hashes to (re)compute.
    #[arg(long, value_enum, default_value = "fast")]
    hash_mode: HashModeArg,
    /// Hashing worker pool width.
    #[arg(long, default_value_t = 4)]
    workers: usize,
}

#[derive(Subcommand)]
enum DevicesCommand {
    /// List every registered device.
    List,
    /// Show one device's full detail.
    Show(DeviceSelectorArgs),
    /// Set a device's human-readable alias.
    Alias(DeviceAliasArgs),
}

#[derive(Args)]
struct DeviceSelectorArgs {
    /// Device id, alias, or filesystem UUID.
    device: String,
}

#[derive(Args)]
struct DeviceAliasArgs {
    /// Device id, alias, or filesystem UUID.
    device: String,
    /// New alias to assign.
    alias: String,
}

#[derive(Subcommand)]
enum PayloadCommand {
    /// Re-index every torrent the configured client reports.
    Sync,
    /// Show the payload recorded at a device's relative root.
    Show(PayloadShowArgs),
    /// List every torrent instance sharing a payload hash.
    Siblings(PayloadSiblingsArgs),
}

#[derive(Args)]
struct PayloadShowArgs {
    /// Device id, alias, or filesystem UUID.
    device: String,
    /// Path relative to the device's preferred mount point.
    relative_root: String,
}

#[derive(Args)]
struct PayloadSiblingsArgs {
    /// Payload fingerprint to search for.
    payload_hash: String,
}

#[derive(Subcommand)]
enum LinkCommand {
    /// Preview duplicate groups on a device without persisting a plan.
    Analyze(DeviceSelectorArgs),
    /// Compute and persist a hardlink dedup plan for a device.
    Plan(LinkPlanArgs),
    /// Show a persisted plan's actions and status.
    ShowPlan(LinkPlanNameArgs),
    /// Execute a persisted plan's unresolved actions.
    Execute(LinkPlanNameArgs),
}

#[derive(Args)]
struct LinkPlanArgs {
    /// Device id, alias, or filesystem UUID.
    device: String,
    /// Name to assign the new plan.
    plan_name: String,
}

#[derive(Args)]
struct LinkPlanNameArgs {
    /// Name of an existing plan.
    plan_name: String,
}

/// Parse arguments, dispatch the requested command, and return the process
/// exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();

    let logging = LoggingConfig {
        level: cli.log_level.as_deref().unwrap_or(silo_telemetry::DEFAULT_LOG_LEVEL),
        format: LogFormat::infer(),
        build_version: env!("CARGO_PKG_VERSION"),
    };
    if let Err(error) = silo_telemetry::init_logging(&logging) {
        eprintln!("warning: failed to initialize logging: {error:#}");
    }

    match dispatch(cli).await {
        Ok(()) => 0,
        Err(error) => {
            eprintln!("error: {}", error.display_message());
            error.exit_code()
        }
    }
}

async fn dispatch(cli: Cli) -> CliResult<()> {
    let config = silo_config::load(cli.config.as_deref())?;
    let ctx = AppContext::connect(config).await?;

    match cli.command {
        Command::Scan(args) => scan::scan(&ctx, args.root, args.hash_mode, args.workers).await,
        Command::Stats => scan::stats(&ctx).await,
        Command::Devices(command) => match command {
            DevicesCommand::List => devices::list(&ctx).await,
            DevicesCommand::Show(args) => devices::show(&ctx, &args.device).await,
            DevicesCommand::Alias(args) => devices::alias(&ctx, &args.device, &args.alias).await,
        },
        Command::Payload(command) => match command {
            PayloadCommand::Sync => payload::sync(&ctx).await,
            PayloadCommand::Show(args) => payload::show(&ctx, &args.device, &args.relative_root).await,
            PayloadCommand::Siblings(args) => payload::siblings(&ctx, &args.payload_hash).await,
        },
        Command::Link(command) => match command {
            LinkCommand::Analyze(args) => link::analyze(&ctx, &args.device).await,
            LinkCommand::Plan(args) => link::plan(&ctx, &args.device, &args.plan_name).await,
            LinkCommand::ShowPlan(args) => link::show_plan(&ctx, &args.plan_name).await,
            LinkCommand::Execute(args) => link::execute(&ctx, &args.plan_name).await,
        },
    }
}
