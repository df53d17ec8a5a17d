//! Incremental filesystem scanner.
//!
//! Walks a scan root, diffs it against the per-device catalog, computes
//! fast-sample and full-content hashes under a bounded worker pool, and
//! reconciles added/updated/deleted/moved rows in a single catalog writer
//! per device (spec §4.3). Also detects and records kernel device
//! identifier renumbering across scans (spec §4.4).

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

mod error;
mod hashing;
mod scanner;
mod walk;

pub use error::{ScanError, ScanResult};
pub use hashing::{run_hash_jobs, HashJob, HashOutcome};
pub use scanner::{scan_root, ScanOptions, ScanOutcome};
pub use walk::{walk_root, ObservedFile};
