//! Errors produced by the scanner.

use silo_model::error::{Classify, ErrorKind};
use thiserror::Error;

/// Result type for scan operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// Errors produced while scanning a root and updating the catalog.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Probing the scan root's filesystem identity failed; the scan aborts
    /// without touching the catalog.
    #[error("scan root probe failed")]
    Probe {
        /// Underlying probe/resolution error.
        #[source]
        source: silo_fsops::FsOpsError,
    },
    /// A catalog read or write failed.
    #[error("catalog operation failed during scan")]
    Catalog {
        /// Underlying store error.
        #[source]
        source: silo_store::StoreError,
    },
    /// Hashing a file failed outside the per-file skip path (e.g. a worker
    /// task itself panicked rather than the hash call returning an error).
    #[error("hash worker failed")]
    Hash {
        /// Underlying hash error.
        #[source]
        source: silo_hash::HashError,
    },
    /// The scan root does not lie under any known mount.
    #[error("scan root '{root}' does not lie under a known mount")]
    RootNotMounted {
        /// Root that could not be resolved to a mount.
        root: String,
    },
    /// The blocking directory-walk task panicked.
    #[error("directory walk task panicked: {reason}")]
    Walk {
        /// Panic payload, stringified.
        reason: String,
    },
}

impl From<silo_fsops::FsOpsError> for ScanError {
    fn from(source: silo_fsops::FsOpsError) -> Self {
        Self::Probe { source }
    }
}

impl From<silo_store::StoreError> for ScanError {
    fn from(source: silo_store::StoreError) -> Self {
        Self::Catalog { source }
    }
}

impl From<silo_hash::HashError> for ScanError {
    fn from(source: silo_hash::HashError) -> Self {
        Self::Hash { source }
    }
}

impl Classify for ScanError {
    fn classify(&self) -> ErrorKind {
        match self {
            Self::Probe { .. } | Self::RootNotMounted { .. } => ErrorKind::PathResolution,
            Self::Catalog { .. } => ErrorKind::Catalog,
            Self::Hash { .. } => ErrorKind::Hash,
            Self::Walk { .. } => ErrorKind::Filesystem,
        }
    }
}
