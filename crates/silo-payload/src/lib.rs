//! Payload identity indexer.
//!
//! Resolves each torrent reported by the client to a content root on a
//! catalogued device, scopes the catalog's active rows to that root, and
//! builds a deterministic manifest fingerprint once every member file has a
//! full digest (spec §4.5).

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
mod indexer;

pub use error::{PayloadError, PayloadResult};
pub use indexer::{refresh_one, siblings, sync, IndexedPayload, SyncOutcome};
