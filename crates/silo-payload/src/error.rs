//! Errors produced by the payload indexer.

use silo_model::error::{Classify, ErrorKind};
use thiserror::Error;

/// Result type for payload indexing operations.
pub type PayloadResult<T> = Result<T, PayloadError>;

/// Errors produced while resolving a torrent's content root to catalog rows
/// and building its manifest fingerprint.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// A call to the external torrent client failed.
    #[error("torrent client request failed")]
    Client {
        /// Underlying client error.
        #[source]
        source: silo_client::ClientError,
    },
    /// A catalog read or write failed.
    #[error("catalog operation failed during payload indexing")]
    Catalog {
        /// Underlying store error.
        #[source]
        source: silo_store::StoreError,
    },
    /// Resolving the torrent's content root failed.
    #[error("content root resolution failed")]
    Probe {
        /// Underlying probe/resolution error.
        #[source]
        source: silo_fsops::FsOpsError,
    },
    /// `refresh_one` was asked for an infohash the client does not report.
    #[error("torrent '{infohash}' not found on the client")]
    TorrentNotFound {
        /// Infohash requested.
        infohash: String,
    },
    /// The torrent's content root does not lie under any device the catalog
    /// has ever scanned.
    #[error("content root '{path}' does not belong to a registered device")]
    DeviceNotRegistered {
        /// Resolved content root that has no owning device.
        path: String,
    },
}

impl From<silo_client::ClientError> for PayloadError {
    fn from(source: silo_client::ClientError) -> Self {
        Self::Client { source }
    }
}

impl From<silo_store::StoreError> for PayloadError {
    fn from(source: silo_store::StoreError) -> Self {
        Self::Catalog { source }
    }
}

impl From<silo_fsops::FsOpsError> for PayloadError {
    fn from(source: silo_fsops::FsOpsError) -> Self {
        Self::Probe { source }
    }
}

impl Classify for PayloadError {
    fn classify(&self) -> ErrorKind {
        match self {
            Self::Client { .. } | Self::TorrentNotFound { .. } => ErrorKind::ClientApi,
            Self::Catalog { .. } => ErrorKind::Catalog,
            Self::Probe { .. } | Self::DeviceNotRegistered { .. } => ErrorKind::PathResolution,
        }
    }
}
