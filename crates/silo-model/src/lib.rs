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

//! Shared domain model and error taxonomy for the silo catalog/rehome toolkit.
//!
//! Layout: `device.rs` (device registry rows), `file_entry.rs` (catalog file
//! rows, scan roots/sessions), `payload.rs` (payload fingerprints and torrent
//! instances), `link.rs` (hardlink dedup plans), `rehome.rs` (rehome plans),
//! `error.rs` (the cross-cutting error kind taxonomy).

pub mod device;
pub mod error;
pub mod file_entry;
pub mod link;
pub mod payload;
pub mod rehome;

pub use device::{Device, DeviceId, DeviceIdentifierChange, FsUuid};
pub use error::ErrorKind;
pub use file_entry::{
    path_under_root, FileEntry, FileStatus, HardlinkGroup, ScanRoot, ScanSession, ScanStatus,
};
pub use link::{LinkAction, LinkActionKind, LinkActionStatus, LinkPlan, LinkPlanStatus};
pub use payload::{HashMode, Payload, TorrentInstance};
pub use rehome::{RehomeDecision, RehomeDirection, RehomePlan};
