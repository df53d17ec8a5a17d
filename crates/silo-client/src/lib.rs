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

//! HTTP client for a qBittorrent-WebUI-shaped torrent client API: session
//! cookie login, torrent listing, per-file listings, pause, resume, and
//! set-location.

mod client;
mod error;
mod model;

pub use client::{backoff_delay, TorrentClient};
pub use error::{ClientError, ClientResult};
pub use model::{TorrentFile, TorrentSummary};
