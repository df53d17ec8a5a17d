//! Errors produced by the rehome planner and executor.

use silo_model::error::{Classify, ErrorKind};
use thiserror::Error;

/// Result type for rehome planning and execution operations.
pub type RehomeResult<T> = Result<T, RehomeError>;

/// Errors produced while planning or applying a rehome.
#[derive(Debug, Error)]
pub enum RehomeError {
    /// A catalog read or write failed.
    #[error("catalog operation failed during rehome planning or execution")]
    Catalog {
        /// Underlying store error.
        #[source]
        source: silo_store::StoreError,
    },
    /// A filesystem mutation or probe failed.
    #[error("filesystem operation failed during rehome execution")]
    FsOps {
        /// Underlying filesystem error.
        #[source]
        source: silo_fsops::FsOpsError,
    },
    /// A torrent client request failed.
    #[error("torrent client operation failed during rehome execution")]
    Client {
        /// Underlying client error.
        #[source]
        source: silo_client::ClientError,
    },
    /// A scoped torrent infohash is unknown to the catalog.
    #[error("torrent '{infohash}' not found in the catalog")]
    TorrentNotFound {
        /// Infohash that was not found.
        infohash: String,
    },
    /// A rehome run id does not exist.
    #[error("rehome run {run_id} not found")]
    RunNotFound {
        /// Requested run id.
        run_id: i64,
    },
    /// Apply was requested against a plan that never resolved to REUSE or
    /// MOVE.
    #[error("rehome run {run_id} is not applicable (decision was BLOCK)")]
    NotApplicable {
        /// Requested run id.
        run_id: i64,
    },
    /// A post-condition check (checksum, file count, reported location)
    /// failed; the caller should treat this as grounds for rollback.
    #[error("rehome verification failed: {reason}")]
    Verification {
        /// Human-readable description of what failed to verify.
        reason: String,
    },
    /// Re-hashing a file during an opt-in spot-check failed.
    #[error("spot-check hashing failed during rehome execution")]
    Hash {
        /// Underlying hash error.
        #[source]
        source: silo_hash::HashError,
    },
    /// The apply was cancelled via the cooperative cancellation flag between
    /// steps.
    #[error("rehome apply cancelled")]
    Cancelled,
}

impl From<silo_store::StoreError> for RehomeError {
    fn from(source: silo_store::StoreError) -> Self {
        Self::Catalog { source }
    }
}

impl From<silo_fsops::FsOpsError> for RehomeError {
    fn from(source: silo_fsops::FsOpsError) -> Self {
        Self::FsOps { source }
    }
}

impl From<silo_client::ClientError> for RehomeError {
    fn from(source: silo_client::ClientError) -> Self {
        Self::Client { source }
    }
}

impl From<silo_hash::HashError> for RehomeError {
    fn from(source: silo_hash::HashError) -> Self {
        Self::Hash { source }
    }
}

impl Classify for RehomeError {
    fn classify(&self) -> ErrorKind {
        match self {
            Self::Catalog { .. } | Self::TorrentNotFound { .. } | Self::RunNotFound { .. } => {
                ErrorKind::Catalog
            }
            Self::FsOps { .. } => ErrorKind::Filesystem,
            Self::Client { .. } => ErrorKind::ClientApi,
            Self::NotApplicable { .. } => ErrorKind::Policy,
            Self::Verification { .. } => ErrorKind::Verification,
            Self::Hash { .. } => ErrorKind::Hash,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}
