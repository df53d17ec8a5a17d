//! Argument parsing and command dispatch for the `silo-rehome` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use silo_model::rehome::RehomeDirection;
use silo_rehome::{ApplyOptions, RehomeScope};
use silo_telemetry::{LogFormat, LoggingConfig};

use crate::commands::{apply, plan};
use crate::context::AppContext;
use crate::error::AppResult;

/// Rehome orchestrator: move or reuse a payload between the warm and cold
/// tiers without a blind copy.
#[derive(Parser)]
#[command(name = "silo-rehome", about = "Payload rehome plan and apply orchestrator")]
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
    /// Compute and persist a rehome plan for a payload scope.
    Plan(PlanArgs),
    /// Apply a previously planned, non-BLOCK rehome run.
    Apply(ApplyArgs),
}

/// Direction of a rehome, as a CLI-facing value.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum DirectionArg {
    /// Moving from the warm tier to the cold tier.
    Demote,
    /// Moving from the cold tier back to the warm tier.
    Promote,
}

impl From<DirectionArg> for RehomeDirection {
    fn from(value: DirectionArg) -> Self {
        match value {
            DirectionArg::Demote => Self::Demote,
            DirectionArg::Promote => Self::Promote,
        }
    }
}

/// Which kind of selector names the payload scope to rehome.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum ScopeKindArg {
    /// A single torrent infohash, expanded to its full sibling set.
    Torrent,
    /// Every torrent instance sharing a payload hash.
    PayloadHash,
    /// Every torrent instance carrying a tag, grouped by payload hash.
    Tag,
}

#[derive(Args)]
struct PlanArgs {
    /// Direction of the rehome.
    #[arg(long, value_enum)]
    direction: DirectionArg,
    /// Which kind of value `scope` names.
    #[arg(long = "scope-kind", value_enum)]
    scope_kind: ScopeKindArg,
    /// Infohash, payload hash, or tag, per `--scope-kind`.
    #[arg(long = "scope")]
    scope: String,
    /// Source device id, alias, or filesystem UUID.
    #[arg(long)]
    source: String,
    /// Target device id, alias, or filesystem UUID.
    #[arg(long)]
    target: String,
}

impl PlanArgs {
    fn scope(&self) -> RehomeScope {
        match self.scope_kind {
            ScopeKindArg::Torrent => RehomeScope::Torrent(self.scope.clone()),
            ScopeKindArg::PayloadHash => RehomeScope::PayloadHash(self.scope.clone()),
            ScopeKindArg::Tag => RehomeScope::Tag(self.scope.clone()),
        }
    }
}

#[derive(Args)]
struct ApplyArgs {
    /// Run id returned by a prior `plan` invocation.
    run_id: i64,
    /// Re-hash a sample of target-side files against catalog digests before
    /// declaring the run complete.
    #[arg(long)]
    spot_check: bool,
    /// Remove source-side per-torrent view directories after a successful
    /// REUSE relocation.
    #[arg(long)]
    cleanup_source_views: bool,
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

async fn dispatch(cli: Cli) -> AppResult<()> {
    let config = silo_config::load(cli.config.as_deref())?;
    let ctx = AppContext::connect(config).await?;

    match cli.command {
        Command::Plan(args) => {
            let scope = args.scope();
            plan::plan(&ctx, args.direction.into(), scope, &args.source, &args.target).await
        }
        Command::Apply(args) => {
            let options = ApplyOptions {
                spot_check: args.spot_check,
                cleanup_source_views: args.cleanup_source_views,
            };
            apply::apply(&ctx, args.run_id, options).await
        }
    }
}
