#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Command-line shell for the silo catalog: scan, stats, devices, payload,
//! and link plan/execute, dispatching to the core library crates.
//!
//! Layout: `cli.rs` (argument parsing, command dispatch) with a thin
//! `main.rs` that delegates to [`run`].

mod commands;
mod context;
mod error;
mod output;

/// Argument parsing and command dispatch.
pub mod cli;

pub use cli::run;
pub use error::{CliError, CliResult};
