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

//! Shared test fixtures used across the silo crates' integration suites:
//! a throwaway in-memory catalog, a sample resolved configuration, and
//! small file-tree builders for scan/link/rehome tests.

/// Throwaway catalog construction and device seeding.
pub mod catalog;
/// Scratch directory and file-tree builders.
pub mod fixtures;
