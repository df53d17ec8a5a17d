//! Rehome plan computation and execution: move or reuse a payload between
//! the warm and cold tiers without a blind copy (spec §4.7, §4.8).

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
mod executor;
mod planner;

pub use error::{RehomeError, RehomeResult};
pub use executor::{apply, ApplyOptions, ApplyOutcome};
pub use planner::{plan, RehomeScope};
