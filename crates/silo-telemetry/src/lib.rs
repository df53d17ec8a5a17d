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

//! Structured logging and Prometheus metrics shared across the silo
//! toolkit's binaries and library crates.

pub mod init;
pub mod metrics;

pub use init::{build_version, init_logging, LogFormat, LoggingConfig, DEFAULT_LOG_LEVEL};
pub use metrics::{Metrics, MetricsSnapshot};
